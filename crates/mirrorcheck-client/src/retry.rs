//! Failure classification and the bounded retry loop.

use crate::config::RetryConfig;
use mirrorcheck_core::{CheckError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Message fragments (lowercase) that mark a failure as transient
pub const RETRYABLE_PHRASES: &[&str] = &[
    "connection reset by peer",
    "timeout exceeded while reading body",
    "operation timed out",
    "network is unreachable",
    "tls handshake timeout",
    "connection refused",
    "connection timed out",
    "service unavailable",
    "service temporarily unavailable",
    "internal server error",
    "bad gateway",
];

/// Connect timeout against a named host; capture group 1 is `host:port`
pub const HOST_TIMEOUT_PATTERN: &str = r"connect to (\S+) timed out";

/// Name lookup that ran out of time
pub const LOOKUP_TIMEOUT_PATTERN: &str = r"(dns error|lookup)\b.*\b(timed out|timeout)";

/// What to do after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Try again after a delay
    Retryable,
    /// Try again unless the host has timed out too often
    HostTimeout(String),
    /// Give up
    Fatal,
}

/// Maps failures to a [`Classification`] using fixed message patterns
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    host_timeout: Regex,
    lookup_timeout: Regex,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Compile the pattern table
    #[must_use]
    pub fn new() -> Self {
        Self {
            host_timeout: Regex::new(HOST_TIMEOUT_PATTERN).expect("constant pattern"),
            lookup_timeout: Regex::new(LOOKUP_TIMEOUT_PATTERN).expect("constant pattern"),
        }
    }

    /// Classify one failure
    #[must_use]
    pub fn classify(&self, err: &CheckError) -> Classification {
        if err.is_protocol_violation() {
            return Classification::Fatal;
        }

        let message = err.to_string().to_lowercase();
        if RETRYABLE_PHRASES.iter().any(|p| message.contains(p)) {
            return Classification::Retryable;
        }
        if let Some(caps) = self.host_timeout.captures(&message) {
            return Classification::HostTimeout(caps[1].to_string());
        }
        if self.lookup_timeout.is_match(&message) {
            return Classification::Retryable;
        }
        Classification::Fatal
    }
}

/// Per-host connect-timeout counter shared by every check in a run
#[derive(Debug)]
pub struct HostTimeoutTracker {
    cap: u32,
    counts: Mutex<HashMap<String, u32>>,
}

impl HostTimeoutTracker {
    /// Create a tracker that stops admitting a host once its count exceeds `cap`
    #[must_use]
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Record a timeout for `host`; returns false when retries should stop
    pub fn admit(&self, host: &str) -> bool {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(host.to_string()).or_insert(0);
        if *count > self.cap {
            return false;
        }
        *count += 1;
        true
    }

    /// Timeouts recorded so far for `host`
    #[must_use]
    pub fn count(&self, host: &str) -> u32 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .copied()
            .unwrap_or(0)
    }
}

/// Retry configuration bundled with the classifier and the shared tracker
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: ErrorClassifier,
    host_timeouts: Arc<HostTimeoutTracker>,
}

impl RetryPolicy {
    /// Build a policy with a fresh host tracker
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let host_timeouts = Arc::new(HostTimeoutTracker::new(config.host_timeout_cap));
        Self::with_tracker(config, host_timeouts)
    }

    /// Build a policy sharing an existing host tracker
    #[must_use]
    pub fn with_tracker(config: RetryConfig, host_timeouts: Arc<HostTimeoutTracker>) -> Self {
        Self {
            config,
            classifier: ErrorClassifier::new(),
            host_timeouts,
        }
    }

    /// The retry configuration
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// The shared host tracker
    #[must_use]
    pub const fn host_timeouts(&self) -> &Arc<HostTimeoutTracker> {
        &self.host_timeouts
    }

    /// Run `op` until it succeeds, fails fatally, or the attempt budget runs out
    pub async fn run<T, F, Fut>(&self, label: &str, allow_retry: bool, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.attempts(allow_retry);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                info!(target_url = label, attempt, "retrying check");
            }

            let err = match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(target_url = label, attempt, "retry succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            warn!(target_url = label, error = %err, "check failed");
            attempt += 1;

            // Every connect timeout counts against its host, the last attempt included.
            match self.classifier.classify(&err) {
                Classification::Retryable => {}
                Classification::HostTimeout(host) => {
                    if !self.host_timeouts.admit(&host) {
                        debug!(host = %host, "host timeout cap reached, not retrying");
                        return Err(err);
                    }
                }
                Classification::Fatal => return Err(err),
            }

            if attempt >= attempts {
                if allow_retry {
                    info!(target_url = label, attempts, "retries exhausted");
                }
                return Err(err);
            }

            tokio::time::sleep(self.config.jitter()).await;
        }
    }
}
