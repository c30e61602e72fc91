//! Command implementations for the relay CLI.
//!
//! Each submodule implements the logic for one subcommand.

pub mod config;
pub mod doctor;
pub mod invoke;
pub mod session;

use anyhow::Result;
use relay_core::{Relay, Spawned};
use std::sync::Arc;

use crate::config::Config;
use crate::process::CommandDependency;

/// Build a relay around the configured program.
pub fn build_relay(config: &Config) -> Result<Relay> {
    let dependency = Arc::new(Spawned::current(CommandDependency::from_config(
        &config.dependency,
    ))?);

    let relay = Relay::builder(&dependency)
        .config(config.relay.clone())
        .build()?;

    Ok(relay)
}
