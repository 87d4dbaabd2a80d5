//! Command runners

use crate::execution::shell::Invocation;
use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and capture its output
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands through the platform shell
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(line: &str) -> Command {
        if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.args(["/C", line]);
            command
        } else {
            let mut command = Command::new("bash");
            command.args(["-c", line]);
            command
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        debug!("Running [{}]: {}", invocation.step, invocation.command);

        let started = Instant::now();
        let output = Self::command(&invocation.command)
            .env("PATH", invocation.env.search_path(std::env::var_os("PATH")))
            .envs(&invocation.env.vars)
            .current_dir(&invocation.env.working_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RunnerError::Launch {
                command: invocation.command.clone(),
                source,
            })?;

        // Killed by a signal
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!("[{}] exited with code {}", invocation.step, exit_code);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}
