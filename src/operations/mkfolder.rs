#![deny(warnings)]

// Create directories (recursively) inside the sandbox

use crate::error::{FileIoError, Result};
use crate::operations::sandbox::Sandbox;
use std::fs;
use std::path::{Path, PathBuf};

/// Create `path` and any missing parents (mkdir -p).
///
/// Returns the first directory that was actually created, or `None` when the
/// directory already existed.
pub fn mkfolder(sandbox: &Sandbox, path: &str) -> Result<Option<PathBuf>> {
    let target = sandbox.resolve_mut(path)?;
    create_folder(&target)
}

/// Same as [`mkfolder`] for a path that has already been fenced
pub(crate) fn create_folder(target: &Path) -> Result<Option<PathBuf>> {
    if target.is_dir() {
        return Ok(None);
    }
    if target.exists() {
        return Err(FileIoError::InvalidPath(format!(
            "{} exists and is not a directory",
            target.display()
        ))
        .into());
    }

    // Walk up to find the first missing ancestor; that is what gets created first
    let mut first_created = target.to_path_buf();
    while let Some(parent) = first_created.parent() {
        if parent.as_os_str().is_empty() || parent.exists() {
            break;
        }
        first_created = parent.to_path_buf();
    }

    fs::create_dir_all(target).map_err(|e| {
        FileIoError::WriteError(format!(
            "Failed to create directory {}: {}",
            target.display(),
            e
        ))
    })?;

    tracing::debug!(path = %target.display(), "created folder");
    Ok(Some(first_created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mkfolder() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        let created = mkfolder(&sandbox, "newdir").unwrap();
        assert_eq!(created, Some(sandbox.root().join("newdir")));
        assert!(sandbox.root().join("newdir").is_dir());
    }

    #[test]
    fn test_mkfolder_recursive_reports_first_created() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        let created = mkfolder(&sandbox, "a/b/c").unwrap();
        assert_eq!(created, Some(sandbox.root().join("a")));
        assert!(sandbox.root().join("a/b/c").is_dir());
    }

    #[test]
    fn test_mkfolder_already_exists() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        mkfolder(&sandbox, "existing").unwrap();
        assert_eq!(mkfolder(&sandbox, "existing").unwrap(), None);
    }

    #[test]
    fn test_mkfolder_dot_folder() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        mkfolder(&sandbox, ".config").unwrap();
        assert!(sandbox.root().join(".config").is_dir());
    }

    #[test]
    fn test_mkfolder_over_file_fails() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        fs::write(sandbox.root().join("file"), "x").unwrap();

        assert!(mkfolder(&sandbox, "file").is_err());
    }

    #[test]
    fn test_mkfolder_outside_root_refused() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path().join("inner")).unwrap();

        assert!(mkfolder(&sandbox, "../sibling").is_err());
        assert!(!dir.path().join("sibling").exists());
    }
}
