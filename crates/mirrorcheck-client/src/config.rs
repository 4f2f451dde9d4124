//! Client configuration types.

use mirrorcheck_core::TrustLevel;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deployment profile, selecting HTTP tuning and the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Short timeouts, small retry budget, one client for every target
    Development,
    /// Long timeouts for published mirrors, short ones for hidden mirrors
    #[default]
    Production,
}

impl Profile {
    /// Retry budget used when none is configured
    #[must_use]
    pub const fn default_max_retries(self) -> u32 {
        match self {
            Self::Development => 2,
            Self::Production => 4,
        }
    }

    /// HTTP tuning for targets of the given trust level
    #[must_use]
    pub const fn tuning(self, trust: TrustLevel) -> HttpTuning {
        match (self, trust) {
            (Self::Production, TrustLevel::Normal) => HttpTuning {
                timeout: Duration::from_secs(180),
                connect_timeout: Duration::from_secs(60),
                keepalive: Duration::from_secs(60),
                idle_timeout: Duration::from_secs(120),
            },
            _ => HttpTuning {
                timeout: Duration::from_secs(60),
                connect_timeout: Duration::from_secs(30),
                keepalive: Duration::from_secs(30),
                idle_timeout: Duration::from_secs(90),
            },
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Timeout and keep-alive tuning for one HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTuning {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// TCP keep-alive interval
    pub keepalive: Duration,
    /// How long idle pooled connections are kept
    pub idle_timeout: Duration,
}

/// Retry configuration for failed file checks
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first one
    pub max_retries: u32,

    /// Lower bound of the jittered delay between attempts
    pub min_delay: Duration,

    /// Upper bound (exclusive) of the jittered delay
    pub max_delay: Duration,

    /// Connect timeouts tolerated per host before retries stop for that host
    pub host_timeout_cap: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: 4,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(3100),
            host_timeout_cap: 25,
        }
    }

    /// Set maximum retries
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the jitter bounds
    #[must_use]
    pub const fn delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    /// Set the per-host connect timeout cap
    #[must_use]
    pub const fn host_timeout_cap(mut self, cap: u32) -> Self {
        self.host_timeout_cap = cap;
        self
    }

    /// Total attempts for one file
    #[must_use]
    pub const fn attempts(&self, allow_retry: bool) -> u32 {
        if allow_retry {
            1 + self.max_retries
        } else {
            1
        }
    }

    /// Pick a delay uniformly in `[min_delay, max_delay)`
    #[must_use]
    pub fn jitter(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        rand::thread_rng().gen_range(self.min_delay..self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_budgets() {
        assert_eq!(Profile::Development.default_max_retries(), 2);
        assert_eq!(Profile::Production.default_max_retries(), 4);
    }

    #[test]
    fn production_separates_hidden_tuning() {
        let normal = Profile::Production.tuning(TrustLevel::Normal);
        let hidden = Profile::Production.tuning(TrustLevel::Hidden);
        assert!(normal.timeout > hidden.timeout);
        assert_eq!(
            Profile::Development.tuning(TrustLevel::Normal),
            Profile::Development.tuning(TrustLevel::Hidden)
        );
    }

    #[test]
    fn attempts_follow_allow_retry() {
        let config = RetryConfig::new().max_retries(3);
        assert_eq!(config.attempts(true), 4);
        assert_eq!(config.attempts(false), 1);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let config = RetryConfig::new();
        for _ in 0..100 {
            let d = config.jitter();
            assert!(d >= Duration::from_millis(100) && d < Duration::from_millis(3100));
        }
        let fixed = RetryConfig::new().delay(Duration::from_millis(5), Duration::from_millis(5));
        assert_eq!(fixed.jitter(), Duration::from_millis(5));
    }
}
