//! External command execution.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};

/// Captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The command line as it was logged.
    pub command: String,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

impl CommandOutput {
    /// Stdout followed by stderr, as a user would see them in a terminal.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !out.ends_with('\n') && !self.stderr.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// Runs commands in a fixed working directory.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    cwd: PathBuf,
}

impl CommandRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Run a command to completion and capture its output.
    ///
    /// A non-zero exit is reported in the returned output, not as an error.
    /// The child is killed if the returned future is dropped.
    pub async fn output<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
    ) -> std::io::Result<CommandOutput> {
        let command = display_command(program, args);
        info!("##[command]{command}");

        let start = Instant::now();
        let output = Command::new(program)
            .args(args.iter().map(AsRef::<str>::as_ref))
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!(command = %command, exit_code, duration_ms, "command finished");

        Ok(CommandOutput {
            command,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }

    /// Run a command and fail unless it exits successfully.
    pub async fn run<S: AsRef<str>>(&self, program: &str, args: &[S]) -> Result<CommandOutput> {
        let output = self.output(program, args).await?;
        if !output.success {
            return Err(TrackerError::CommandFailed {
                command: output.command.clone(),
                status: output.exit_code,
                output: output.combined(),
            });
        }
        Ok(output)
    }
}

fn display_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg.as_ref());
    }
    line
}
