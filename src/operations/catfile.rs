#![deny(warnings)]

// Read files and folders recursively into descriptors

use crate::error::{FileIoError, FopsError, Result};
use crate::operations::mime::mimetype;
use crate::operations::sandbox::Sandbox;
use crate::operations::unitsize::storage_unit_lookup;
use base64::Engine as _;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How file bytes are rendered into the `content` field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Base64,
    Utf8,
    Hex,
    Ascii,
    Latin1,
}

impl FromStr for Encoding {
    type Err = FopsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(Encoding::Base64),
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "hex" => Ok(Encoding::Hex),
            "ascii" => Ok(Encoding::Ascii),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            other => Err(FileIoError::InvalidEncoding(format!(
                "'{}' (expected base64, utf8, hex, ascii or latin1)",
                other
            ))
            .into()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Base64 => "base64",
            Encoding::Utf8 => "utf8",
            Encoding::Hex => "hex",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin1",
        };
        f.write_str(name)
    }
}

/// Render raw bytes in the requested encoding.
/// Invalid UTF-8 is replaced with U+FFFD; `ascii` drops the high bit.
pub fn encode(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Hex => hex::encode(bytes),
        Encoding::Ascii => bytes.iter().map(|b| (b & 0x7f) as char).collect(),
        Encoding::Latin1 => bytes.iter().map(|b| *b as char).collect(),
    }
}

/// Everything known about one file that was read
#[derive(Debug, Clone, Serialize)]
pub struct FileDescriptor {
    pub name: String,
    pub path: String,
    pub content: String,
    pub encoding: Encoding,
    pub mime: String,
    /// Human readable, e.g. `1.5 KB`
    pub size: String,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    pub modified: i64,
    pub accessed: i64,
}

/// One node of a catfile result
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatEntry {
    File(FileDescriptor),
    Folder {
        name: String,
        path: String,
        entries: Vec<CatEntry>,
    },
    /// Stands in for a path that was missing or could not be read
    NotFound { path: String, reason: String },
}

impl CatEntry {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatEntry::NotFound { .. })
    }

    pub fn as_file(&self) -> Option<&FileDescriptor> {
        match self {
            CatEntry::File(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    /// Flatten into leaves (files and sentinels), depth first, preserving order
    pub fn into_leaves(self, out: &mut Vec<CatEntry>) {
        match self {
            CatEntry::Folder { entries, .. } => {
                for entry in entries {
                    entry.into_leaves(out);
                }
            }
            leaf => out.push(leaf),
        }
    }
}

/// Read each path into a [`CatEntry`]. Folders recurse into their children
/// (sorted by name); anything unreadable becomes a `NotFound` sentinel and the
/// walk continues with the next path.
pub fn catfile(sandbox: &Sandbox, paths: &[&str], encoding: Encoding) -> Vec<CatEntry> {
    let mut ancestors = HashSet::new();
    let mut entries = Vec::with_capacity(paths.len());

    for path in paths {
        let resolved = match sandbox.resolve(path) {
            Ok(p) => p,
            Err(e) => {
                entries.push(not_found(path, &e.to_string()));
                continue;
            }
        };
        if let Some(entry) = read_entry(&resolved, encoding, &mut ancestors) {
            entries.push(entry);
        }
    }

    entries
}

/// Alias of [`catfile`]
pub fn catfolder(sandbox: &Sandbox, paths: &[&str], encoding: Encoding) -> Vec<CatEntry> {
    catfile(sandbox, paths, encoding)
}

/// Like [`catfile`] but flattened to files and sentinels
pub fn open_files(sandbox: &Sandbox, paths: &[&str], encoding: Encoding) -> Vec<CatEntry> {
    let mut leaves = Vec::new();
    for entry in catfile(sandbox, paths, encoding) {
        entry.into_leaves(&mut leaves);
    }
    leaves
}

fn not_found(path: &str, reason: &str) -> CatEntry {
    tracing::warn!(path, reason, "unreadable path replaced by sentinel");
    CatEntry::NotFound {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `None` for entries that are neither files nor folders (sockets, FIFOs, devices)
fn read_entry(
    path: &Path,
    encoding: Encoding,
    ancestors: &mut HashSet<PathBuf>,
) -> Option<CatEntry> {
    let path_str = path.display().to_string();

    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            let err = FileIoError::from_io_error("stat path", &path_str, e);
            return Some(not_found(&path_str, &err.to_string()));
        }
    };

    if metadata.is_file() {
        Some(match read_file(path, &metadata, encoding) {
            Ok(descriptor) => CatEntry::File(descriptor),
            Err(e) => not_found(&path_str, &e.to_string()),
        })
    } else if metadata.is_dir() {
        Some(read_folder(path, encoding, ancestors))
    } else {
        tracing::debug!(path = %path_str, "skipping special file");
        None
    }
}

fn read_folder(path: &Path, encoding: Encoding, ancestors: &mut HashSet<PathBuf>) -> CatEntry {
    let path_str = path.display().to_string();

    // Symlinked folders can loop back onto an ancestor
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !ancestors.insert(canonical.clone()) {
        return not_found(&path_str, "symlink cycle: folder is its own ancestor");
    }

    let children = match list_children(path) {
        Ok(children) => children,
        Err(e) => {
            ancestors.remove(&canonical);
            return not_found(&path_str, &e.to_string());
        }
    };

    let entries = children
        .iter()
        .filter_map(|child| read_entry(child, encoding, ancestors))
        .collect();

    ancestors.remove(&canonical);
    tracing::debug!(path = %path_str, "read folder");

    CatEntry::Folder {
        name: display_name(path),
        path: path_str,
        entries,
    }
}

fn list_children(path: &Path) -> Result<Vec<PathBuf>> {
    let path_str = path.display().to_string();
    let mut children = Vec::new();
    let dir = fs::read_dir(path)
        .map_err(|e| FopsError::from(FileIoError::from_io_error("read directory", &path_str, e)))?;
    for entry in dir {
        let entry = entry.map_err(|e| {
            FileIoError::ReadError(format!("Failed to read directory entry in {}: {}", path_str, e))
        })?;
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

fn read_file(path: &Path, metadata: &fs::Metadata, encoding: Encoding) -> Result<FileDescriptor> {
    let path_str = path.display().to_string();
    let bytes = fs::read(path)
        .map_err(|e| FopsError::from(FileIoError::from_io_error("read file", &path_str, e)))?;

    let len = bytes.len() as u64;
    Ok(FileDescriptor {
        name: display_name(path),
        path: path_str,
        content: encode(&bytes, encoding),
        encoding,
        mime: mimetype(path).to_string(),
        size: storage_unit_lookup(len),
        bytes: len,
        created: FileTime::from_creation_time(metadata).map(|t| t.unix_seconds()),
        modified: FileTime::from_last_modification_time(metadata).unix_seconds(),
        accessed: FileTime::from_last_access_time(metadata).unix_seconds(),
    })
}
