//! Error types for the relay CLI.

use thiserror::Error;

/// Errors raised by CLI commands before or after talking to the relay.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid session assignment '{0}', expected ID=VALUE")]
    InvalidSessionPair(String),

    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("No outcome within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Relay error: {0}")]
    Relay(#[from] relay_core::Error),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
