use serde::{Deserialize, Serialize};

use super::Fingerprint;
use crate::CheckError;

/// Outcome of probing one file on one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Fingerprint taken from the source
    pub standard: Fingerprint,

    /// Fingerprint taken from the target, if the probe succeeded
    #[serde(default)]
    pub observed: Option<Fingerprint>,

    /// Whether the target serves the same file
    pub matches: bool,

    /// Error message when the probe failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ComparisonRecord {
    /// Build a record by comparing a probe outcome against the standard
    #[must_use]
    pub fn compare(standard: Fingerprint, outcome: Result<Fingerprint, CheckError>) -> Self {
        match outcome {
            Ok(observed) => Self {
                matches: observed == standard,
                standard,
                observed: Some(observed),
                failure: None,
            },
            Err(err) => Self {
                standard,
                observed: None,
                matches: false,
                failure: Some(err.to_string()),
            },
        }
    }

    /// Returns true if the probe failed
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    /// Returns true if the target answered but with different content
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        self.observed.is_some() && !self.matches
    }
}

/// All records gathered for one mirror prefix or one CDN node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResult {
    /// Mirror identifier
    pub target_id: String,

    /// URL prefix of the mirror
    pub url_prefix: String,

    /// CDN edge node the records were taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_node_address: Option<String>,

    /// Per-file records
    pub records: Vec<ComparisonRecord>,

    /// Percentage of probed files that match the source
    pub completion_percent: f64,

    /// Number of probes that failed
    pub error_count: usize,
}

impl TargetResult {
    /// Derive completion and error counts from records
    #[must_use]
    pub fn from_records(
        target_id: impl Into<String>,
        url_prefix: impl Into<String>,
        cdn_node_address: Option<String>,
        records: Vec<ComparisonRecord>,
    ) -> Self {
        let matching = records.iter().filter(|r| r.matches).count();
        let error_count = records.iter().filter(|r| r.is_error()).count();
        let completion_percent = if records.is_empty() {
            0.0
        } else {
            matching as f64 / records.len() as f64 * 100.0
        };

        Self {
            target_id: target_id.into(),
            url_prefix: url_prefix.into(),
            cdn_node_address,
            records,
            completion_percent,
            error_count,
        }
    }

    /// Returns true if every probed file matches
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.matches)
    }

    /// Number of matching records
    #[must_use]
    pub fn matching(&self) -> usize {
        self.records.iter().filter(|r| r.matches).count()
    }
}
