#![deny(warnings)]

// Generate shell scripts and run commands through a throwaway script

use crate::config::{env_keys, Config};
use crate::error::{FileIoError, FopsError, Result};
use crate::operations::exec::{run, ExecOptions, ExecResult};
use crate::operations::mkfile::{mkfile, WriteFlag};
use crate::operations::sandbox::Sandbox;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// Mode for generated scripts
pub const SCRIPT_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptShell {
    Posix,
    Cmd,
}

impl ScriptShell {
    /// The shell flavour of the host platform
    pub fn native() -> Self {
        if cfg!(windows) {
            ScriptShell::Cmd
        } else {
            ScriptShell::Posix
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ScriptShell::Posix => "sh",
            ScriptShell::Cmd => "cmd",
        }
    }

    /// Full script text for `command`
    pub fn render(self, command: &str) -> String {
        let body = command.trim_end();
        match self {
            ScriptShell::Posix => format!("#!/bin/sh\n{}\n", body),
            ScriptShell::Cmd => format!("@echo off\r\n{}\r\n", body.replace('\n', "\r\n")),
        }
    }

    fn interpreter(self, script: &std::path::Path) -> Command {
        match self {
            ScriptShell::Posix => {
                let mut cmd = Command::new("sh");
                cmd.arg(script);
                cmd
            }
            ScriptShell::Cmd => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(script);
                cmd
            }
        }
    }
}

fn ensure_enabled(config: &Config) -> Result<()> {
    if config.allow_scripts {
        return Ok(());
    }
    tracing::warn!("script generation requested while disabled");
    Err(FileIoError::ScriptsDisabled(format!(
        "set {}=1 to enable script generation",
        env_keys::ALLOW_SCRIPTS
    ))
    .into())
}

/// Write `command` as an executable script at `path` inside the sandbox
pub fn mkscript(config: &Config, sandbox: &Sandbox, path: &str, command: &str) -> Result<PathBuf> {
    ensure_enabled(config)?;
    if command.trim().is_empty() {
        return Err(FileIoError::InvalidArgument("Script command is empty".to_string()).into());
    }

    let script = ScriptShell::native().render(command);
    let written = mkfile(
        sandbox,
        path,
        script.as_bytes(),
        WriteFlag::Overwrite,
        SCRIPT_MODE,
    )?;
    tracing::debug!(path = %written.display(), "generated script");
    Ok(written)
}

/// Write `command` to a temporary script, run it from the sandbox root and
/// return the outcome. The script is deleted afterwards.
pub fn runscript(config: &Config, sandbox: &Sandbox, command: &str) -> Result<ExecResult> {
    ensure_enabled(config)?;
    if command.trim().is_empty() {
        return Err(FileIoError::InvalidArgument("Script command is empty".to_string()).into());
    }

    let shell = ScriptShell::native();
    let mut file = tempfile::Builder::new()
        .prefix("fops-")
        .suffix(&format!(".{}", shell.extension()))
        .tempfile()
        .map_err(|e| FopsError::from(FileIoError::from_io_error("create temp script", "", e)))?;
    file.write_all(shell.render(command).as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| {
            FopsError::from(FileIoError::from_io_error(
                "write temp script",
                &file.path().display().to_string(),
                e,
            ))
        })?;

    // Close our handle before running; the path is removed when dropped
    let script = file.into_temp_path();
    let options = ExecOptions {
        cwd: Some(sandbox.root().to_path_buf()),
        ..Default::default()
    };
    let result = run(shell.interpreter(&script), command, &options);

    if let Err(e) = script.close() {
        tracing::warn!(error = %e, "failed to remove temp script");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Sandbox, Config) {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let config = Config {
            root: sandbox.root().to_path_buf(),
            ..Default::default()
        };
        (dir, sandbox, config)
    }

    #[test]
    fn test_render_posix() {
        assert_eq!(
            ScriptShell::Posix.render("echo 'hello world'\n"),
            "#!/bin/sh\necho 'hello world'\n"
        );
        assert_eq!(ScriptShell::Cmd.render("a\nb"), "@echo off\r\na\r\nb\r\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_mkscript_writes_executable() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, sandbox, config) = setup();

        let path = mkscript(&config, &sandbox, "foobar/echo.sh", "echo 'hello world'").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#!/bin/sh\necho 'hello world'\n"
        );
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn test_mkscript_disabled() {
        let (_dir, sandbox, mut config) = setup();
        config.allow_scripts = false;

        let err = mkscript(&config, &sandbox, "x.sh", "true").unwrap_err();
        assert!(matches!(err, FopsError::FileIo(FileIoError::ScriptsDisabled(_))));
        assert!(!sandbox.root().join("x.sh").exists());
        assert!(runscript(&config, &sandbox, "true").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_runscript_runs_in_root() {
        let (_dir, sandbox, config) = setup();
        fs::write(sandbox.root().join("here.txt"), "").unwrap();

        let result = runscript(&config, &sandbox, "echo 'hello world'\nls").unwrap();
        assert!(result.success);
        assert_eq!(result.stdout, "hello world\nhere.txt\n");
        assert_eq!(result.command, "echo 'hello world'\nls");
    }

    #[test]
    #[cfg(unix)]
    fn test_runscript_failure_is_structured() {
        let (_dir, sandbox, config) = setup();
        let result = runscript(&config, &sandbox, "exit 7").unwrap();
        assert!(!result.success);
        assert_eq!(result.code, Some(7));
    }

    #[test]
    fn test_empty_command_rejected() {
        let (_dir, sandbox, config) = setup();
        assert!(mkscript(&config, &sandbox, "e.sh", "  ").is_err());
        assert!(runscript(&config, &sandbox, "").is_err());
    }
}
