//! Error types for Tandem operations

use std::time::Duration;

/// Result type for Tandem operations
pub type Result<T> = std::result::Result<T, TandemError>;

/// Error types for the Tandem controller
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// A service never became available within the allowed wait
    #[error("Service {service} unavailable after waiting {waited:?}")]
    ServiceUnavailable { service: String, waited: Duration },

    /// A request was issued but the call itself failed
    #[error("Request to {service} failed: {reason}")]
    RequestFailed { service: String, reason: String },

    /// Transport (bus) error
    #[error("Bus error: {0}")]
    Bus(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A wait or loop was cancelled by shutdown
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl TandemError {
    /// Whether this error came from a shutdown rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TandemError::Cancelled)
    }
}

impl From<String> for TandemError {
    fn from(s: String) -> Self {
        TandemError::Other(s)
    }
}

impl From<&str> for TandemError {
    fn from(s: &str) -> Self {
        TandemError::Other(s.to_string())
    }
}
