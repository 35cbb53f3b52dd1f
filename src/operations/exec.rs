#![deny(warnings)]

// Run a shell command synchronously and report a structured outcome

use crate::error::{FileIoError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory; inherits the process cwd when unset
    pub cwd: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    pub command: String,
    pub success: bool,
    /// Exit code; absent when the process was killed by a signal or never started
    pub code: Option<i32>,
    /// Terminating signal name (Unix)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    pub stdout: String,
    pub stderr: String,
    /// Why the command could not be started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecResult {
    fn spawn_failure(command: &str, error: String) -> Self {
        Self {
            command: command.to_string(),
            success: false,
            code: None,
            signal: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
        }
    }

    /// Turn an unsuccessful outcome into `CommandFailed`
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let detail = if let Some(error) = &self.error {
            error.clone()
        } else if let Some(signal) = &self.signal {
            format!("terminated by {}", signal)
        } else {
            let stderr = self.stderr.trim();
            match self.code {
                Some(code) if stderr.is_empty() => format!("exit code {}", code),
                Some(code) => format!("exit code {}: {}", code, stderr),
                None => "unknown failure".to_string(),
            }
        };
        Err(FileIoError::CommandFailed(format!("`{}`: {}", self.command, detail)).into())
    }
}

/// The platform shell invocation for a command string
pub(crate) fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(not(unix))]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|raw| {
        nix::sys::signal::Signal::try_from(raw)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| format!("signal {}", raw))
    })
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> Option<String> {
    None
}

/// Run `cmd` to completion, capturing output. Never fails: spawn errors,
/// non-zero exits and signals are all reported through the result.
pub(crate) fn run(mut cmd: Command, label: &str, options: &ExecOptions) -> ExecResult {
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&options.env);

    let output = match cmd.output() {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(command = label, error = %e, "failed to start command");
            return ExecResult::spawn_failure(label, format!("failed to start: {}", e));
        }
    };

    let result = ExecResult {
        command: label.to_string(),
        success: output.status.success(),
        code: output.status.code(),
        signal: signal_name(&output.status),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        error: None,
    };

    if result.success {
        tracing::debug!(command = label, "command succeeded");
    } else {
        tracing::warn!(command = label, code = ?result.code, signal = ?result.signal, "command failed");
    }
    result
}

/// Execute `command` through the system shell and wait for it
pub fn exec(command: &str, options: &ExecOptions) -> ExecResult {
    if command.trim().is_empty() {
        return ExecResult::spawn_failure(command, "empty command".to_string());
    }
    run(shell_command(command), command, options)
}
