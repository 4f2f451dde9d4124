//! Operation status stores.

use async_trait::async_trait;
use mirrorcheck_core::{OperationRecord, OperationStatus, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Receives every status transition of a checker invocation
#[async_trait]
pub trait OperationLog: Send + Sync {
    /// Persist one transition
    async fn record(&self, operation: &OperationRecord) -> Result<()>;
}

/// Logs transitions through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOperationLog;

#[async_trait]
impl OperationLog for TracingOperationLog {
    async fn record(&self, operation: &OperationRecord) -> Result<()> {
        if operation.status == OperationStatus::Failure {
            error!(
                index = %operation.index,
                mirror = %operation.mirror_id,
                message = %operation.message,
                "operation failed"
            );
        } else {
            info!(
                index = %operation.index,
                mirror = %operation.mirror_id,
                status = %operation.status,
                "operation status"
            );
        }
        Ok(())
    }
}

/// Appends transitions to a JSON-lines file
#[derive(Debug)]
pub struct JsonLinesOperationLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesOperationLog {
    /// Log to `path`, created on first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// File receiving the records
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OperationLog for JsonLinesOperationLog {
    async fn record(&self, operation: &OperationRecord) -> Result<()> {
        let mut line = serde_json::to_vec(operation)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
