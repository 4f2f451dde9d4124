use thiserror::Error;

/// Result type alias for checker operations
pub type Result<T> = std::result::Result<T, CheckError>;

/// Errors that can occur while checking mirrors
#[derive(Error, Debug)]
pub enum CheckError {
    /// HTTP transport failed (message carries the full source chain)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Server answered with a non-2xx status
    #[error("response status is {code} {reason}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Canonical reason phrase
        reason: String,
    },

    /// TCP connect to a host did not complete in time
    #[error("connect to {host} timed out")]
    ConnectTimeout {
        /// `host:port` that could not be reached
        host: String,
    },

    /// Server response violates the byte-range protocol
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Vantage-point or change-index resolution failed
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Streaming socket failed
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Metrics sink rejected a write
    #[error("metrics write failed: {0}")]
    Metrics(String),

    /// Requested item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckError {
    /// Shorthand for a protocol violation
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Returns true if the server misbehaved in a way retrying cannot fix
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns the HTTP status code if this is a status error
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_carries_code_and_reason() {
        let err = CheckError::Status {
            code: 503,
            reason: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "response status is 503 Service Unavailable");
        assert_eq!(err.status_code(), Some(503));
    }

    #[test]
    fn connect_timeout_names_host() {
        let err = CheckError::ConnectTimeout {
            host: "mirror.example.org:443".into(),
        };
        assert_eq!(err.to_string(), "connect to mirror.example.org:443 timed out");
        assert!(!err.is_protocol_violation());
    }
}
