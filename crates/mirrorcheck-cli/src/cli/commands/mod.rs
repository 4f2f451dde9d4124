//! Command implementations.

pub mod changes;
pub mod config;
pub mod fingerprint;
pub mod mirrors;
pub mod run;
pub mod vantage;

use crate::output::OutputFormat;
use colored::{ColoredString, Colorize};
use mirrorcheck::{CheckerConfig, MirrorChecker, MirrorClient};
use std::path::PathBuf;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: CheckerConfig,

    /// Where the configuration lives
    pub config_path: PathBuf,

    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,
}

impl Context {
    /// Build a checker from the loaded configuration.
    pub fn checker(&self) -> anyhow::Result<MirrorChecker> {
        Ok(MirrorChecker::new(self.config.clone())?)
    }

    /// HTTP client configured like a run's.
    pub fn client(&self) -> anyhow::Result<MirrorClient> {
        Ok(self.checker()?.client().clone())
    }
}

/// Completion percentage colored by how far behind it is.
pub(crate) fn percent_cell(percent: f64) -> ColoredString {
    let text = format!("{percent:.3}%");
    if percent >= 100.0 {
        text.green()
    } else if percent >= 90.0 {
        text.yellow()
    } else {
        text.red()
    }
}
