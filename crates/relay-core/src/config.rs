//! Relay Configuration
//!
//! Defines tunables for a [`Relay`](crate::Relay).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relay configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Default wait timeout for completion handles in milliseconds (default: 10000)
    pub default_timeout_ms: u64,

    /// Maximum number of async operations allowed in flight at once (default: unlimited)
    pub max_in_flight: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000, // 10 seconds
            max_in_flight: None,
        }
    }
}

impl RelayConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default wait timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Limit the number of concurrently pending async operations
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Default wait timeout as a [`Duration`]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "default_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.max_in_flight == Some(0) {
            return Err(ConfigValidationError::InvalidValue {
                field: "max_in_flight".into(),
                message: "must be greater than 0 when set".into(),
            });
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.default_timeout(), Duration::from_secs(10));
        assert!(config.max_in_flight.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RelayConfig::new()
            .with_timeout(Duration::from_millis(250))
            .with_max_in_flight(4);

        assert_eq!(config.default_timeout_ms, 250);
        assert_eq!(config.max_in_flight, Some(4));
    }

    #[test]
    fn test_config_validation() {
        let mut config = RelayConfig::default();
        config.default_timeout_ms = 0;
        assert!(config.validate().is_err());

        let config = RelayConfig::default().with_max_in_flight(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RelayConfig = serde_json::from_str(r#"{"max_in_flight": 2}"#).unwrap();
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.max_in_flight, Some(2));
    }
}
