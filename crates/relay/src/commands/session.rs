//! `session` command: register sessions and set their values.

use anyhow::Result;
use colored::Colorize;
use relay_core::{Relay, SessionEntry};

use super::build_relay;
use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Split an `ID=VALUE` assignment. The value may be empty or contain `=`.
pub fn parse_pair(pair: &str) -> CliResult<(&str, &str)> {
    match pair.split_once('=') {
        Some((id, value)) if !id.is_empty() => Ok((id, value)),
        _ => Err(CliError::InvalidSessionPair(pair.to_string())),
    }
}

/// Apply every assignment in order and return the resulting sessions sorted by id.
///
/// Unknown ids are registered first; later assignments to the same id win.
pub fn apply(relay: &Relay, pairs: &[String]) -> CliResult<Vec<SessionEntry>> {
    for pair in pairs {
        let (id, value) = parse_pair(pair)?;

        match relay.add_session(id) {
            Ok(()) | Err(relay_core::Error::SessionExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
        relay.update_session(id, value)?;
    }

    relay
        .session_ids()?
        .iter()
        .map(|id| relay.session(id).map_err(CliError::from))
        .collect()
}

pub async fn execute(pairs: &[String], json: bool, config: &Config) -> Result<()> {
    let relay = build_relay(config)?;
    let sessions = apply(&relay, pairs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions".yellow());
        return Ok(());
    }

    println!("{}", "Sessions".cyan().bold());
    println!("{}", "─".repeat(50));
    for session in &sessions {
        println!("  {} = {}", session.id.bold(), session.value);
    }

    Ok(())
}
