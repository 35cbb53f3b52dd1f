#![deny(warnings)]

// Remove files or folders recursively (rm -rf) inside the sandbox

use crate::error::{FileIoError, FopsError, Result};
use crate::operations::sandbox::Sandbox;
use globset::GlobBuilder;
use ignore::WalkBuilder;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct OpResult {
    pub path: String,
    pub status: String,
    pub existed: bool,
}

impl OpResult {
    fn ok(path: &str, existed: bool) -> Self {
        Self {
            path: path.to_string(),
            status: "ok".to_string(),
            existed,
        }
    }

    fn failed(path: &str, error: &FopsError) -> Self {
        tracing::warn!(path, error = %error, "remove failed");
        Self {
            path: path.to_string(),
            status: format!("error: {}", error),
            existed: !error.is_not_found(),
        }
    }
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Expand a glob pattern to the existing paths it matches, sorted.
/// Wildcards may appear in any component; `**` crosses directories.
/// A match inside an already matched folder is dropped.
fn expand_glob(sandbox: &Sandbox, pattern: &str) -> Result<Vec<PathBuf>> {
    let resolved = sandbox.resolve(pattern)?;

    // Literal leading components form the walk base
    let (mut base, rest) = match resolved.strip_prefix(sandbox.root()) {
        Ok(rest) => (sandbox.root().to_path_buf(), rest.to_path_buf()),
        Err(_) => (PathBuf::new(), resolved.clone()),
    };
    let mut glob_parts: Vec<String> = Vec::new();
    for component in rest.components() {
        let part = component.as_os_str().to_string_lossy().into_owned();
        if glob_parts.is_empty() && !has_glob_chars(&part) {
            base.push(component.as_os_str());
        } else {
            glob_parts.push(part);
        }
    }
    if glob_parts.is_empty() {
        return Ok(Vec::new());
    }

    let glob = GlobBuilder::new(&glob_parts.join("/"))
        .literal_separator(true)
        .build()
        .map_err(|e| FileIoError::InvalidPath(format!("Invalid glob pattern {}: {}", pattern, e)))?;
    let matcher = glob.compile_matcher();

    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkBuilder::new(&base);
    walker.standard_filters(false).follow_links(false);
    if !glob_parts.iter().any(|p| p.contains("**")) {
        walker.max_depth(Some(glob_parts.len()));
    }

    let mut matches = Vec::new();
    for entry in walker.build() {
        let entry = entry.map_err(|e| {
            FileIoError::ReadError(format!("Failed to walk {}: {}", base.display(), e))
        })?;
        if entry.depth() == 0 {
            continue;
        }
        let is_match = entry
            .path()
            .strip_prefix(&base)
            .map(|relative| matcher.is_match(relative))
            .unwrap_or(false);
        if is_match {
            matches.push(entry.into_path());
        }
    }
    matches.sort();

    let mut outermost: Vec<PathBuf> = Vec::with_capacity(matches.len());
    for path in matches {
        let nested = outermost.last().is_some_and(|kept| path.starts_with(kept));
        if !nested {
            outermost.push(path);
        }
    }
    Ok(outermost)
}

/// The concrete paths `path` stands for. An existing literal path wins over
/// its glob reading, so `a[1].txt` removes that file.
fn targets(sandbox: &Sandbox, path: &str) -> Result<Vec<String>> {
    if !has_glob_chars(path) || fs::symlink_metadata(sandbox.resolve(path)?).is_ok() {
        return Ok(vec![path.to_string()]);
    }
    Ok(expand_glob(sandbox, path)?
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

/// Remove files or folders. Missing paths count as success and a glob with
/// no matches is reported as not existing. Failures are recorded per path
/// without stopping the batch.
pub fn rmfile(sandbox: &Sandbox, paths: &[&str]) -> Result<Vec<OpResult>> {
    let mut results = Vec::new();

    for path in paths {
        let expanded = match targets(sandbox, path) {
            Ok(expanded) => expanded,
            Err(e) => {
                results.push(OpResult::failed(path, &e));
                continue;
            }
        };
        if expanded.is_empty() {
            tracing::debug!(pattern = %path, "glob matched nothing");
            results.push(OpResult::ok(path, false));
            continue;
        }
        for target in &expanded {
            results.push(match rm_single(sandbox, target) {
                Ok(existed) => OpResult::ok(target, existed),
                Err(e) => OpResult::failed(target, &e),
            });
        }
    }

    Ok(results)
}

/// Alias of [`rmfile`]; folders and files are removed the same way
pub fn rmfolder(sandbox: &Sandbox, paths: &[&str]) -> Result<Vec<OpResult>> {
    rmfile(sandbox, paths)
}

/// Remove a single file or folder; `Ok(false)` when it was already absent
fn rm_single(sandbox: &Sandbox, path: &str) -> Result<bool> {
    let target = sandbox.resolve_entry(path)?;
    let target_str = target.display().to_string();

    if sandbox.is_root(&target) {
        return Err(FileIoError::PermissionDenied(format!(
            "Refusing to remove the sandbox root: {}",
            target_str
        ))
        .into());
    }

    // A link is removed itself, never followed
    let metadata = match fs::symlink_metadata(&target) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(FileIoError::from_io_error("stat path", &target_str, e).into());
        }
    };

    if metadata.is_dir() {
        fs::remove_dir_all(&target).map_err(|e| {
            FopsError::from(FileIoError::from_io_error("remove directory", &target_str, e))
        })?;
    } else {
        fs::remove_file(&target).map_err(|e| {
            FopsError::from(FileIoError::from_io_error("remove file", &target_str, e))
        })?;
    }

    tracing::debug!(path = %target_str, "removed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, Sandbox) {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_rmfile_file() {
        let (_dir, sandbox) = sandbox();
        let file = sandbox.root().join("file.txt");
        fs::write(&file, "content").unwrap();

        let results = rmfile(&sandbox, &["file.txt"]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, "ok");
        assert!(results[0].existed);
        assert!(!file.exists());
    }

    #[test]
    fn test_rmfolder_recursive() {
        let (_dir, sandbox) = sandbox();
        let subdir = sandbox.root().join("subdir/deeper");
        fs::create_dir_all(&subdir).unwrap();
        fs::write(subdir.join("file.txt"), "content").unwrap();

        let results = rmfolder(&sandbox, &["subdir"]).unwrap();
        assert_eq!(results[0].status, "ok");
        assert!(!sandbox.root().join("subdir").exists());
    }

    #[test]
    fn test_rmfile_missing_is_ok() {
        let (_dir, sandbox) = sandbox();
        let results = rmfile(&sandbox, &["ghost.txt"]).unwrap();
        assert_eq!(results[0].status, "ok");
        assert!(!results[0].existed);
    }

    #[test]
    fn test_rmfile_glob() {
        let (_dir, sandbox) = sandbox();
        let base = sandbox.root();
        fs::write(base.join("file1.txt"), "content1").unwrap();
        fs::write(base.join("file2.txt"), "content2").unwrap();
        fs::write(base.join("other.log"), "content3").unwrap();

        let results = rmfile(&sandbox, &["*.txt"]).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == "ok" && r.existed));
        assert!(!base.join("file1.txt").exists());
        assert!(!base.join("file2.txt").exists());
        assert!(base.join("other.log").exists());
    }

    #[test]
    fn test_rmfile_glob_in_directory_component() {
        let (_dir, sandbox) = sandbox();
        let base = sandbox.root();
        for d in ["a", "b"] {
            fs::create_dir(base.join(d)).unwrap();
            fs::write(base.join(d).join("x.txt"), "x").unwrap();
            fs::write(base.join(d).join("keep.md"), "k").unwrap();
        }

        let results = rmfile(&sandbox, &["*/x.txt"]).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == "ok" && r.existed));
        assert!(!base.join("a/x.txt").exists());
        assert!(!base.join("b/x.txt").exists());
        assert!(base.join("a/keep.md").exists());
        assert!(base.join("b/keep.md").exists());
    }

    #[test]
    fn test_rmfile_double_star_keeps_outermost_match() {
        let (_dir, sandbox) = sandbox();
        let base = sandbox.root();
        fs::create_dir_all(base.join("src/tmp/inner")).unwrap();
        fs::write(base.join("src/tmp/inner/f"), "").unwrap();
        fs::create_dir_all(base.join("tmp")).unwrap();

        let results = rmfile(&sandbox, &["**/tmp"]).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!base.join("src/tmp").exists());
        assert!(!base.join("tmp").exists());
        assert!(base.join("src").exists());
    }

    #[test]
    fn test_rmfile_glob_without_matches_is_reported() {
        let (_dir, sandbox) = sandbox();
        let results = rmfile(&sandbox, &["nothing/*.txt", "*.none"]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "nothing/*.txt");
        assert_eq!(results[0].status, "ok");
        assert!(!results[0].existed);
        assert_eq!(results[1].path, "*.none");
    }

    #[test]
    fn test_rmfile_literal_name_with_glob_chars() {
        let (_dir, sandbox) = sandbox();
        let base = sandbox.root();
        fs::write(base.join("a[1].txt"), "literal").unwrap();
        fs::write(base.join("a1.txt"), "glob reading").unwrap();

        let results = rmfile(&sandbox, &["a[1].txt"]).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].existed);
        assert!(!base.join("a[1].txt").exists());
        assert!(base.join("a1.txt").exists());
    }

    #[test]
    fn test_rmfile_invalid_glob_is_recorded() {
        let (_dir, sandbox) = sandbox();
        fs::write(sandbox.root().join("keep.txt"), "").unwrap();

        let results = rmfile(&sandbox, &["broken[", "keep.txt"]).unwrap();
        assert!(results[0].status.starts_with("error"));
        assert_eq!(results[1].status, "ok");
        assert!(!sandbox.root().join("keep.txt").exists());
    }

    #[test]
    fn test_rmfile_refuses_root_and_outside() {
        let (_dir, sandbox) = sandbox();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("keep.txt");
        fs::write(&victim, "x").unwrap();

        let results = rmfile(&sandbox, &[".", victim.to_str().unwrap()]).unwrap();
        assert!(results[0].status.starts_with("error"));
        assert!(results[1].status.contains("outside"));
        assert!(sandbox.root().exists());
        assert!(victim.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_rmfile_symlink_does_not_follow() {
        use std::os::unix::fs::symlink;
        let (_dir, sandbox) = sandbox();
        let target_dir = sandbox.root().join("real");
        fs::create_dir(&target_dir).unwrap();
        fs::write(target_dir.join("keep.txt"), "x").unwrap();
        symlink(&target_dir, sandbox.root().join("link")).unwrap();

        let results = rmfile(&sandbox, &["link"]).unwrap();
        assert_eq!(results[0].status, "ok");
        assert!(target_dir.join("keep.txt").exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_rmfile_removes_link_pointing_outside_root() {
        use std::os::unix::fs::symlink;
        let (_dir, sandbox) = sandbox();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("keep.txt"), "x").unwrap();
        let link = sandbox.root().join("link");
        symlink(outside.path(), &link).unwrap();

        let results = rmfile(&sandbox, &["link"]).unwrap();
        assert_eq!(results[0].status, "ok");
        assert!(results[0].existed);
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(outside.path().join("keep.txt").exists());

        // Reaching through the link is still fenced
        symlink(outside.path(), &link).unwrap();
        let results = rmfile(&sandbox, &["link/keep.txt"]).unwrap();
        assert!(results[0].status.contains("outside"));
        assert!(outside.path().join("keep.txt").exists());
    }
}
