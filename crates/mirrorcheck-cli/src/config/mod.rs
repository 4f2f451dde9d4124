//! Configuration file location.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use mirrorcheck::CheckerConfig;
use std::path::{Path, PathBuf};

/// Default config file in the platform config directory.
pub fn default_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "mirrorcheck", "mirrorcheck")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(dirs.config_dir().join("config.toml"))
}

/// The explicit path if given, otherwise the default one.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit.map_or_else(default_path, |p| Ok(p.to_path_buf()))
}

/// Load configuration, falling back to defaults when the file is missing.
pub fn load(path: &Path) -> Result<CheckerConfig> {
    CheckerConfig::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}
