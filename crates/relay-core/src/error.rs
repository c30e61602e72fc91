//! Error types for relay-core.

use thiserror::Error;

use crate::config::ConfigValidationError;
use crate::dependency::DependencyError;

/// Result type alias using relay-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for relay operations
#[derive(Error, Debug)]
pub enum Error {
    // Dependency errors
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    // Session errors
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    // Runtime errors
    #[error("No tokio runtime available. Build the relay inside a runtime or pass a handle.")]
    NoRuntime,

    #[error("Relay lock poisoned")]
    LockPoisoned,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),
}

impl Error {
    /// Check if this error is a session lookup failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_))
    }

    /// Check if this error originated in the dependency
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err: Error = DependencyError::new("backend unavailable").into();
        assert!(err.is_dependency());
        assert!(err.to_string().contains("backend unavailable"));

        let err = Error::SessionNotFound("session-1".into());
        assert!(err.is_not_found());
        assert!(err.to_string().contains("session-1"));

        let err = Error::SessionExists("session-1".into());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = ConfigValidationError::InvalidValue {
            field: "default_timeout_ms".into(),
            message: "must be greater than 0".into(),
        }
        .into();
        assert!(err.to_string().contains("default_timeout_ms"));
    }
}
