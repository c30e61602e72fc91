//! relay - drive a Relay from the command line
//!
//! Wires an external program in as the relay's dependency and exposes the
//! relay's operations as subcommands.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod error;
mod process;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("relay=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    // Execute command
    match cli.command {
        Commands::Invoke { input, json } => {
            commands::invoke::execute(input.as_deref(), json, &config).await
        }
        Commands::InvokeAsync {
            param,
            timeout_ms,
            callback,
            json,
        } => {
            commands::invoke::execute_async(param.as_deref(), timeout_ms, callback, json, &config)
                .await
        }
        Commands::Session { set, json } => commands::session::execute(&set, json, &config).await,
        Commands::Doctor => commands::doctor::execute(&config, cli.config.as_deref()).await,
        Commands::Config => commands::config::execute(&config, cli.config.as_deref()),
        Commands::Version => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
