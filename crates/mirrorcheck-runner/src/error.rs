use mirrorcheck_core::CheckError;
use thiserror::Error;

/// Result type alias for run operations
pub type RunResult<T> = std::result::Result<T, RunError>;

/// Errors that abort a run before any target is probed
#[derive(Error, Debug)]
pub enum RunError {
    /// Target list could not be fetched
    #[error("failed to fetch target list: {0}")]
    TargetList(#[source] CheckError),

    /// Change index could not be resolved
    #[error("failed to resolve recent changes: {0}")]
    ChangeIndex(#[source] CheckError),

    /// Files changed but none could be fingerprinted on the source
    #[error("no standard fingerprints for {files} changed files")]
    NoStandards {
        /// Number of sampled files
        files: usize,
    },

    /// Selected mirror does not exist in the target list
    #[error("unknown mirror: {0}")]
    UnknownMirror(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other checker error
    #[error(transparent)]
    Check(#[from] CheckError),
}

impl From<RunError> for CheckError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::TargetList(e) | RunError::ChangeIndex(e) | RunError::Check(e) => e,
            RunError::NoStandards { files } => {
                Self::Resolution(format!("no standard fingerprints for {files} changed files"))
            }
            RunError::UnknownMirror(id) => Self::NotFound(format!("mirror {id}")),
            RunError::Config(msg) => Self::Config(msg),
            RunError::Io(e) => Self::Io(e),
        }
    }
}
