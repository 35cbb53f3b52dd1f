#![deny(warnings)]

// Create or append to a file, creating parent folders and applying a mode

use crate::error::{FileIoError, FopsError, Result};
use crate::operations::mkfolder::create_folder;
use crate::operations::sandbox::Sandbox;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Mode given to new files when the caller does not ask for one
pub const DEFAULT_FILE_MODE: u32 = 0o744;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteFlag {
    #[default]
    Overwrite,
    Append,
}

impl FromStr for WriteFlag {
    type Err = FopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "overwrite" | "write" => Ok(WriteFlag::Overwrite),
            "a" | "append" => Ok(WriteFlag::Append),
            other => Err(FileIoError::InvalidArgument(format!(
                "Unknown write flag '{}' (expected 'w' or 'a')",
                other
            ))
            .into()),
        }
    }
}

/// Write `content` to `path` inside the sandbox.
///
/// Parent folders are created first. Overwrites go through a temp sibling and
/// a rename; appends open the file in append mode. On Unix the resulting file
/// gets exactly `permissions`.
pub fn mkfile(
    sandbox: &Sandbox,
    path: &str,
    content: &[u8],
    flag: WriteFlag,
    permissions: u32,
) -> Result<PathBuf> {
    let target = sandbox.resolve_mut(path)?;
    let target_str = target.display().to_string();

    if target.is_dir() {
        return Err(FileIoError::InvalidPath(format!("{} is a directory", target_str)).into());
    }
    if let Some(parent) = target.parent() {
        create_folder(parent)?;
    }

    match flag {
        WriteFlag::Append => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&target)
                .map_err(|e| {
                    FopsError::from(FileIoError::from_io_error(
                        "open file for appending",
                        &target_str,
                        e,
                    ))
                })?;
            file.write_all(content).map_err(|e| {
                FopsError::from(FileIoError::from_io_error("write to file", &target_str, e))
            })?;
        }
        WriteFlag::Overwrite => {
            let temp_path = temp_sibling(&target);
            let temp_str = temp_path.display().to_string();
            fs::write(&temp_path, content).map_err(|e| {
                FopsError::from(FileIoError::from_io_error(
                    "write to temp file",
                    &temp_str,
                    e,
                ))
            })?;
            if let Err(e) = fs::rename(&temp_path, &target) {
                let _ = fs::remove_file(&temp_path);
                return Err(FileIoError::from_io_error(
                    "rename temp file",
                    &format!("{} to {}", temp_str, target_str),
                    e,
                )
                .into());
            }
        }
    }

    set_permissions(&target, permissions)?;
    tracing::debug!(path = %target_str, bytes = content.len(), ?flag, "wrote file");
    Ok(target)
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.tmp", name))
}

#[cfg(unix)]
fn set_permissions(target: &Path, permissions: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(target, fs::Permissions::from_mode(permissions)).map_err(|e| {
        FileIoError::InvalidMode(format!(
            "Failed to set permissions {:o} on {}: {}",
            permissions,
            target.display(),
            e
        ))
        .into()
    })
}

#[cfg(not(unix))]
fn set_permissions(target: &Path, permissions: u32) -> Result<()> {
    // Only the owner-write bit maps onto the readonly flag here
    let mut perms = fs::metadata(target)
        .map_err(|e| {
            FopsError::from(FileIoError::from_io_error(
                "read metadata",
                &target.display().to_string(),
                e,
            ))
        })?
        .permissions();
    perms.set_readonly(permissions & 0o200 == 0);
    fs::set_permissions(target, perms).map_err(|e| {
        FileIoError::InvalidMode(format!(
            "Failed to set permissions on {}: {}",
            target.display(),
            e
        ))
        .into()
    })
}

/// Parse an octal permission string: `744`, `0644`, `0o755`
pub fn parse_mode(mode_str: &str) -> Result<u32> {
    let trimmed = mode_str.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > 4 {
        return Err(invalid_mode(mode_str));
    }

    let mode = u32::from_str_radix(digits, 8).map_err(|_| invalid_mode(mode_str))?;
    if mode > 0o7777 {
        return Err(invalid_mode(mode_str));
    }
    Ok(mode)
}

fn invalid_mode(mode_str: &str) -> FopsError {
    FileIoError::InvalidMode(format!(
        "Invalid mode format: {} (expected octal like 755 or 0644)",
        mode_str
    ))
    .into()
}
