//! Print the effective configuration.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::Config;

pub fn execute(config: &Config, path: Option<&Path>) -> Result<()> {
    let source = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    let origin = if source.exists() { "loaded from" } else { "defaults, no file at" };

    println!("{}", format!("# {} {}", origin, source.display()).dimmed());
    print!("{}", config.to_toml()?);
    Ok(())
}
