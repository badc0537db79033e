//! Error types for bus operations

use crate::error::TandemError;
use thiserror::Error;

/// Bus specific errors
#[derive(Debug, Error)]
pub enum BusError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid topic or service name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// No server is offering the service
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// A server is already offering the service
    #[error("Service already advertised: {0}")]
    DuplicateService(String),

    /// The service handler itself returned an error
    #[error("Service {service} failed: {reason}")]
    Handler { service: String, reason: String },
}

impl From<BusError> for TandemError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Serialization(e) => TandemError::Serialization(e),
            BusError::InvalidName(name) => {
                TandemError::Configuration(format!("Invalid topic or service name: {}", name))
            }
            BusError::Handler { service, reason } => TandemError::RequestFailed { service, reason },
            other => TandemError::Bus(other.to_string()),
        }
    }
}

/// Topic and service names are absolute, slash-separated paths
pub(crate) fn validate_name(name: &str) -> Result<(), BusError> {
    if name.is_empty() {
        return Err(BusError::InvalidName("name cannot be empty".to_string()));
    }
    if !name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return Err(BusError::InvalidName(name.to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(BusError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("/turtle1/pose").is_ok());
        assert!(validate_name("/spawn").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("turtle1/pose").is_err());
        assert!(validate_name("/turtle1/").is_err());
        assert!(validate_name("/turtle1//pose").is_err());
        assert!(validate_name("/turtle 1/pose").is_err());
    }

    #[test]
    fn test_handler_error_maps_to_request_failed() {
        let err: TandemError = BusError::Handler {
            service: "/spawn".into(),
            reason: "name taken".into(),
        }
        .into();
        assert!(matches!(err, TandemError::RequestFailed { .. }));
    }
}
