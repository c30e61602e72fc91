//! External program used as a relay dependency.
//!
//! Every call runs `program [args...] <input>`. A zero exit status is
//! success and stdout is the result; anything else is a failure carrying
//! stderr (or the exit status when stderr is empty).

use async_trait::async_trait;
use relay_core::{AsyncDependency, DependencyError};
use std::path::PathBuf;
use std::process::{Command, Output};
use tracing::debug;

use crate::config::DependencyConfig;
use crate::error::{CliError, CliResult};

/// Locate `program` on `PATH`.
pub fn check_program(program: &str) -> CliResult<PathBuf> {
    match which::which(program) {
        Ok(path) => {
            debug!("Found {} at: {:?}", program, path);
            Ok(path)
        }
        Err(_) => Err(CliError::ProgramNotFound(program.to_string())),
    }
}

/// Runs a configured program for every relay call.
#[derive(Debug, Clone)]
pub struct CommandDependency {
    program: String,
    args: Vec<String>,
    trim_output: bool,
}

impl CommandDependency {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            trim_output: true,
        }
    }

    pub fn from_config(config: &DependencyConfig) -> Self {
        Self::new(config.program.clone())
            .with_args(config.args.clone())
            .trim_output(config.trim_output)
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn trim_output(mut self, trim: bool) -> Self {
        self.trim_output = trim;
        self
    }

    fn interpret(&self, output: Output) -> Result<String, DependencyError> {
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let result = if self.trim_output {
                stdout.trim().to_string()
            } else {
                stdout.into_owned()
            };
            return Ok(result);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(DependencyError::new(format!(
                "{} exited with {}",
                self.program, output.status
            )))
        } else {
            Err(DependencyError::new(stderr))
        }
    }
}

#[async_trait]
impl AsyncDependency for CommandDependency {
    fn name(&self) -> &str {
        &self.program
    }

    fn call(&self, input: &str) -> Result<String, DependencyError> {
        debug!(program = %self.program, "running command");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .output()?;
        self.interpret(output)
    }

    async fn call_async(&self, param: String) -> Result<String, DependencyError> {
        debug!(program = %self.program, "running command (async)");
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(&param)
            .output()
            .await?;
        self.interpret(output)
    }
}
