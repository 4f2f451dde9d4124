use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mirror-level progress point (`mirrors` series)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorPoint {
    /// URL prefix of the mirror
    pub name: String,

    /// Fraction of probed files in sync, `0.0..=1.0`
    pub progress: f64,
}

/// CDN-node progress point (`mirrors_cdn` series)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdnPoint {
    /// Mirror identifier
    pub mirror_id: String,

    /// Edge node address
    pub node_ip: String,

    /// Fraction of probed files in sync, `0.0..=1.0`
    pub progress: f64,
}

/// Points produced by one run, ready for the metrics sink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// One point per mirror prefix
    pub mirror_points: Vec<MirrorPoint>,

    /// One point per CDN node
    pub cdn_points: Vec<CdnPoint>,
}

/// Status of a logical checker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Created, not started
    Waiting,
    /// Probing in progress
    Running,
    /// Completed
    Finished,
    /// Aborted before completion
    Failure,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Kind of invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Check a single mirror
    Sync,
    /// Check every mirror
    SyncAll,
}

/// Status transition of one invocation, written to the operation store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Unique operation index
    pub index: String,

    /// When the operation was created
    pub created: DateTime<Utc>,

    /// Kind of operation
    pub kind: OperationKind,

    /// Mirror id, or `ALL`
    pub mirror_id: String,

    /// Current status
    pub status: OperationStatus,

    /// Failure message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl OperationRecord {
    /// Create a waiting operation
    #[must_use]
    pub fn new(kind: OperationKind, mirror_id: impl Into<String>) -> Self {
        let created = Utc::now();
        Self {
            index: created.format("%Y%m%d%H%M%S%6f").to_string(),
            created,
            kind,
            mirror_id: mirror_id.into(),
            status: OperationStatus::Waiting,
            message: String::new(),
        }
    }

    /// Move to a new status
    #[must_use]
    pub fn with_status(mut self, status: OperationStatus, message: impl Into<String>) -> Self {
        self.status = status;
        self.message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_transitions_keep_index() {
        let op = OperationRecord::new(OperationKind::SyncAll, "ALL");
        assert_eq!(op.status, OperationStatus::Waiting);
        let failed = op.clone().with_status(OperationStatus::Failure, "no such mirror");
        assert_eq!(failed.index, op.index);
        assert_eq!(failed.message, "no such mirror");

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "sync_all");
    }
}
