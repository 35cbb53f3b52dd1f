#![deny(warnings)]

// Resolve caller paths against the configured root and fence mutations inside it

use crate::error::{FileIoError, Result};
use std::path::{Component, Path, PathBuf};

/// Expand `~` and environment variables in a caller-supplied path
pub fn expand_path(path: &str) -> Result<String> {
    shellexpand::full(path)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| {
            FileIoError::InvalidPath(format!("Failed to expand path '{}': {}", path, e)).into()
        })
}

/// Lexically normalize an absolute path: drop `.`, let `..` pop a component.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the filesystem root stays at the root
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest,
/// so symlinks along the existing part are resolved.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest: Vec<std::ffi::OsString> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in rest.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// A root directory that filesystem mutations are confined to
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root` (expanded, absolute, canonical when it exists)
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let raw = root.as_ref().to_string_lossy();
        let expanded = PathBuf::from(expand_path(&raw)?);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()
                .map_err(|e| FileIoError::from_io_error("read working directory", &raw, e))?
                .join(expanded)
        };
        let root = absolute
            .canonicalize()
            .unwrap_or_else(|_| normalize(&absolute));
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path for reading: relative paths are taken from the root.
    /// No containment check is applied.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            return Err(FileIoError::InvalidPath("Empty path".to_string()).into());
        }
        let expanded = PathBuf::from(expand_path(path)?);
        let joined = if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        };
        Ok(normalize(&joined))
    }

    /// Resolve a path that is about to be created or written.
    /// Fails with `OutsideSandbox` unless the result lies within the root.
    pub fn resolve_mut(&self, path: &str) -> Result<PathBuf> {
        let resolved = self.resolve(path)?;
        let real = canonicalize_existing_prefix(&resolved);
        self.fence(path, &real)?;
        Ok(resolved)
    }

    /// Resolve a path whose final component is acted on itself (deleted,
    /// not followed). Only the parent is canonicalized, so a symlink inside
    /// the root may be removed even when it points elsewhere.
    pub fn resolve_entry(&self, path: &str) -> Result<PathBuf> {
        let resolved = self.resolve(path)?;
        self.fence(path, &canonicalize_entry(&resolved))?;
        Ok(resolved)
    }

    fn fence(&self, path: &str, real: &Path) -> Result<()> {
        if real.starts_with(&self.root) {
            return Ok(());
        }
        tracing::warn!(path, root = %self.root.display(), "mutation outside sandbox refused");
        Err(FileIoError::OutsideSandbox(format!(
            "{} resolves outside {}",
            path,
            self.root.display()
        ))
        .into())
    }

    /// True when the entry at `path` is the root directory itself
    pub fn is_root(&self, path: &Path) -> bool {
        canonicalize_entry(path) == self.root
    }
}

/// Canonical parent with the final component re-appended unresolved
fn canonicalize_entry(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => canonicalize_existing_prefix(parent).join(name),
        _ => canonicalize_existing_prefix(path),
    }
}
