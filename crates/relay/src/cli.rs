//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relay CLI
///
/// Forwards input to an external command through a stateful relay.
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Invoke the dependency synchronously
    Invoke {
        /// Input forwarded to the dependency (omitted = no input)
        input: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Invoke the dependency asynchronously and wait for the outcome
    InvokeAsync {
        /// Parameter forwarded to the dependency
        param: Option<String>,

        /// How long to wait for the outcome (defaults to the configured timeout)
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Receive the outcome through a callback instead of a completion handle
        #[arg(long)]
        callback: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Register sessions and set their values
    Session {
        /// Session assignment as ID=VALUE (repeatable)
        #[arg(short, long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Run diagnostics
    Doctor,

    /// Print the effective configuration
    Config,

    /// Show version
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_invoke_async() {
        let cli = Cli::parse_from(["relay", "invoke-async", "hello", "--timeout-ms", "250", "--callback"]);
        match cli.command {
            Commands::InvokeAsync {
                param,
                timeout_ms,
                callback,
                json,
            } => {
                assert_eq!(param.as_deref(), Some("hello"));
                assert_eq!(timeout_ms, Some(250));
                assert!(callback);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_session_pairs() {
        let cli = Cli::parse_from(["relay", "session", "--set", "a=1", "-s", "b=2"]);
        match cli.command {
            Commands::Session { set, .. } => assert_eq!(set, vec!["a=1", "b=2"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_without_input() {
        let cli = Cli::parse_from(["relay", "invoke"]);
        assert!(matches!(cli.command, Commands::Invoke { input: None, .. }));
    }
}
