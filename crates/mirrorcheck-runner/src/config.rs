//! Checker configuration.

use crate::error::{RunError, RunResult};
use mirrorcheck_client::{ChangeFilter, ChangeSource, Profile, RetryConfig, VantageConfig};
use mirrorcheck_core::sample::DEFAULT_MAX_PACKAGES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a checker run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Deployment profile (HTTP tuning and default retry budget).
    #[serde(default)]
    pub profile: Profile,

    /// Directory for per-target text reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,

    /// JSON-lines file receiving operation status records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_log: Option<PathBuf>,

    /// Directory caching standard fingerprints between runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_cache_dir: Option<PathBuf>,

    /// Source repository and change-set selection.
    #[serde(default)]
    pub source: SourceConfig,

    /// Target list.
    #[serde(default)]
    pub targets: TargetsConfig,

    /// Retry tuning.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Pool sizes.
    #[serde(default)]
    pub pools: PoolConfig,

    /// CDN edge-node discovery.
    #[serde(default)]
    pub vantage: VantageConfig,

    /// InfluxDB sink; results are only logged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<InfluxConfig>,
}

/// Source repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL prefix of the source repository.
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Change index location relative to `url`.
    #[serde(default = "default_changelist_path")]
    pub changelist_path: String,

    /// Changes newer than this many days (relative to the newest manifest) are checked.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Expected number of sampled package files.
    #[serde(default = "default_max_packages")]
    pub max_packages: usize,

    /// Path filter.
    #[serde(default)]
    pub filter: ChangeFilter,
}

/// Target list settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Target list API.
    #[serde(default = "default_targets_url")]
    pub url: String,

    /// Skip mirrors with a negative weight.
    #[serde(default)]
    pub exclude_hidden: bool,

    /// Mirror ids served through a CDN.
    #[serde(default = "default_cdn_mirrors")]
    pub cdn_mirrors: Vec<String>,
}

/// Retry settings; `max_retries` overrides the profile default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Connect timeouts tolerated per host.
    #[serde(default = "default_host_timeout_cap")]
    pub host_timeout_cap: u32,

    /// Lower jitter bound in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper jitter bound in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Verify TLS certificates of mirrors.
    #[serde(default)]
    pub verify_tls: bool,
}

/// Pool sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Mirrors checked concurrently.
    #[serde(default = "default_mirror_pool")]
    pub mirrors: usize,

    /// Files probed concurrently per target.
    #[serde(default = "default_file_pool")]
    pub files: usize,

    /// Files fingerprinted concurrently on the source.
    #[serde(default = "default_source_pool")]
    pub source: usize,
}

/// InfluxDB v1 connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`.
    pub addr: String,

    /// Database name.
    pub db: String,

    /// Basic-auth user.
    #[serde(default)]
    pub username: String,

    /// Basic-auth password.
    #[serde(default)]
    pub password: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            changelist_path: default_changelist_path(),
            window_days: default_window_days(),
            max_packages: default_max_packages(),
            filter: ChangeFilter::default(),
        }
    }
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            url: default_targets_url(),
            exclude_hidden: false,
            cdn_mirrors: default_cdn_mirrors(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: None,
            host_timeout_cap: default_host_timeout_cap(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            verify_tls: false,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirror_pool(),
            files: default_file_pool(),
            source: default_source_pool(),
        }
    }
}

impl CheckerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> RunResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML text.
    pub fn from_toml(content: &str) -> RunResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RunError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write config as TOML.
    pub fn save(&self, path: &Path) -> RunResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Render config as TOML.
    pub fn to_toml(&self) -> RunResult<String> {
        toml::to_string_pretty(self).map_err(|e| RunError::Config(e.to_string()))
    }

    /// Reject settings no run could work with.
    pub fn validate(&self) -> RunResult<()> {
        url::Url::parse(&self.source.url)
            .map_err(|e| RunError::Config(format!("source.url {:?}: {e}", self.source.url)))?;
        if self.retry.max_delay_ms < self.retry.min_delay_ms {
            return Err(RunError::Config(
                "retry.max_delay_ms must not be below retry.min_delay_ms".into(),
            ));
        }
        if self.source.window_days == 0 {
            return Err(RunError::Config("source.window_days must be positive".into()));
        }
        Ok(())
    }

    /// Change source for the client.
    #[must_use]
    pub fn change_source(&self) -> ChangeSource {
        ChangeSource {
            url: self.source.url.clone(),
            changelist_path: self.source.changelist_path.clone(),
            filter: self.source.filter.clone(),
        }
    }

    /// Scan window.
    #[must_use]
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.source.window_days))
    }

    /// Retry configuration for the client (the retry budget is set separately).
    #[must_use]
    pub const fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .delay(
                Duration::from_millis(self.retry.min_delay_ms),
                Duration::from_millis(self.retry.max_delay_ms),
            )
            .host_timeout_cap(self.retry.host_timeout_cap)
    }
}

// Default value functions for serde.
fn default_source_url() -> String {
    String::from("https://packages.deepin.com/deepin/")
}

fn default_changelist_path() -> String {
    String::from("changelist/")
}

const fn default_window_days() -> u32 {
    10
}

const fn default_max_packages() -> usize {
    DEFAULT_MAX_PACKAGES
}

fn default_targets_url() -> String {
    String::from("https://www.deepin.org/mirrors/packages.json")
}

fn default_cdn_mirrors() -> Vec<String> {
    vec![String::from("default")]
}

const fn default_host_timeout_cap() -> u32 {
    25
}

const fn default_min_delay_ms() -> u64 {
    100
}

const fn default_max_delay_ms() -> u64 {
    3100
}

const fn default_mirror_pool() -> usize {
    50
}

const fn default_file_pool() -> usize {
    6
}

const fn default_source_pool() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CheckerConfig::default();
        assert_eq!(config.profile, Profile::Production);
        assert_eq!(config.source.window_days, 10);
        assert_eq!(config.source.max_packages, 300);
        assert_eq!(config.pools.mirrors, 50);
        assert_eq!(config.pools.files, 6);
        assert_eq!(config.pools.source, 3);
        assert_eq!(config.targets.cdn_mirrors, vec!["default"]);
        assert!(config.metrics.is_none());
        assert_eq!(config.window(), chrono::Duration::days(10));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CheckerConfig::from_toml(
            r#"
            profile = "development"

            [source]
            url = "https://source.example.org/repo/"
            window_days = 3

            [pools]
            files = 2

            [metrics]
            addr = "http://localhost:8086"
            db = "mirrors"
            "#,
        )
        .unwrap();

        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.source.window_days, 3);
        assert_eq!(config.source.changelist_path, "changelist/");
        assert_eq!(config.pools.files, 2);
        assert_eq!(config.pools.mirrors, 50);
        assert_eq!(config.metrics.as_ref().unwrap().db, "mirrors");
        assert_eq!(config.change_source().index_url(), "https://source.example.org/repo/changelist/");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = CheckerConfig::from_toml("[retry]\nmin_delay_ms = 10\nmax_delay_ms = 5\n").unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
        assert!(CheckerConfig::from_toml("[source]\nurl = \"not a url\"\n").is_err());
        assert!(CheckerConfig::from_toml("profile = 3").is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CheckerConfig::default();
        config.targets.exclude_hidden = true;
        config.report_dir = Some(dir.path().join("result"));
        config.save(&path).unwrap();

        assert_eq!(CheckerConfig::load(&path).unwrap(), config);
        assert_eq!(
            CheckerConfig::load(&dir.path().join("missing.toml")).unwrap(),
            CheckerConfig::default()
        );
    }

    #[test]
    fn test_retry_config_mapping() {
        let mut config = CheckerConfig::default();
        config.retry.min_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config.retry.host_timeout_cap = 3;
        let retry = config.retry_config();
        assert_eq!(retry.min_delay, Duration::from_millis(1));
        assert_eq!(retry.max_delay, Duration::from_millis(2));
        assert_eq!(retry.host_timeout_cap, 3);
    }
}
