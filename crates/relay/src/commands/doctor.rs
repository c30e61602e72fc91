//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::{build_relay, invoke};
use crate::config::Config;
use crate::process;

const PROBE: &str = "relay-doctor";

pub async fn execute(config: &Config, path: Option<&Path>) -> Result<()> {
    println!("{}", "relay Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check relay settings
    print!("  Relay settings: ");
    match config.relay.validate() {
        Ok(()) => println!("{}", "✓ valid".green()),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Invalid [relay] section");
        }
    }

    // Check dependency program
    print!("  Program ({}): ", config.dependency.program);
    let program_found = match process::check_program(&config.dependency.program) {
        Ok(_) => {
            println!("{}", "✓ installed".green());
            true
        }
        Err(_) => {
            println!("{}", "✗ not found".red());
            issues.push("Dependency program is not on PATH");
            false
        }
    };

    // Probe a round trip through the relay
    if program_found {
        print!("  Probe: ");
        match build_relay(config) {
            Ok(relay) => {
                let report = invoke::run(&relay, Some(PROBE));
                if report.success {
                    println!("{}", format!("✓ {} ({})", report.state, report.output).green());
                } else {
                    let message = report.error.unwrap_or_default();
                    println!("{}", format!("✗ {}", message).red());
                    issues.push("Dependency call failed");
                }
                relay.cleanup();
            }
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Could not build relay");
            }
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
