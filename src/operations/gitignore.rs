#![deny(warnings)]

// Merge rule lines into a .gitignore without duplicating what is already there

use crate::error::{FileIoError, FopsError, Result};
use crate::operations::mkfile::{mkfile, WriteFlag};
use crate::operations::sandbox::Sandbox;
use ignore::gitignore::GitignoreBuilder;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const GITIGNORE: &str = ".gitignore";
const GITIGNORE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Serialize)]
pub struct GitignoreMerge {
    pub path: PathBuf,
    /// Lines appended, in order
    pub added: Vec<String>,
    /// Incoming lines that were already present
    pub skipped: Vec<String>,
    /// The file did not exist before
    pub created: bool,
}

/// Result of merging incoming rules into existing text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMerge {
    pub content: String,
    pub added: Vec<String>,
    pub skipped: Vec<String>,
}

/// Trim a rule line. Leading whitespace always goes; trailing whitespace goes
/// unless it is an escaped space (`foo\ `). An even run of backslashes
/// escapes itself (`foo\\ ` keeps no space).
fn normalize_line(line: &str) -> String {
    let line = line.trim_start();
    let trimmed = line.trim_end();
    let backslashes = trimmed.chars().rev().take_while(|c| *c == '\\').count();
    if backslashes % 2 == 1 && line[trimmed.len()..].starts_with(' ') {
        format!("{} ", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Reject rules the gitignore matcher cannot compile
fn validate_rules(dir: &Path, rules: &str) -> Result<()> {
    let mut builder = GitignoreBuilder::new(dir);
    for raw in rules.lines() {
        let line = normalize_line(raw);
        if line.is_empty() {
            continue;
        }
        builder
            .add_line(None, &line)
            .map_err(|e| FileIoError::InvalidRule(format!("'{}': {}", line, e)))?;
    }
    Ok(())
}

/// Append the lines of `incoming` that `existing` does not already contain.
///
/// Existing text is kept verbatim. Blank input lines become single separators
/// between added lines; leading and trailing blanks are dropped.
pub fn merge_rules(existing: &str, incoming: &str) -> RuleMerge {
    let mut seen: HashSet<String> = existing
        .lines()
        .map(normalize_line)
        .filter(|l| !l.is_empty())
        .collect();

    let mut block: Vec<String> = Vec::new();
    let mut added = Vec::new();
    let mut skipped = Vec::new();
    let mut pending_blank = false;

    for raw in incoming.lines() {
        let line = normalize_line(raw);
        if line.is_empty() {
            pending_blank = !block.is_empty();
            continue;
        }
        if !seen.insert(line.clone()) {
            skipped.push(line);
            continue;
        }
        if pending_blank {
            block.push(String::new());
            pending_blank = false;
        }
        block.push(line.clone());
        added.push(line);
    }

    let mut content = existing.to_string();
    if !block.is_empty() {
        if !content.trim().is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            let ends_blank = content
                .lines()
                .last()
                .map(|l| l.trim().is_empty())
                .unwrap_or(true);
            if !ends_blank {
                content.push('\n');
            }
        }
        content.push_str(&block.join("\n"));
        content.push('\n');
    }

    RuleMerge {
        content,
        added,
        skipped,
    }
}

/// Merge `rules` into the `.gitignore` at `path` (a folder, or the file itself).
/// The file is only written when it is new or something was added.
pub fn mkgitignore(sandbox: &Sandbox, path: &str, rules: &str) -> Result<GitignoreMerge> {
    let resolved = sandbox.resolve_mut(path)?;
    let target = if resolved.file_name().and_then(|n| n.to_str()) == Some(GITIGNORE) {
        resolved
    } else {
        resolved.join(GITIGNORE)
    };
    let target_str = target.display().to_string();
    let folder = target.parent().unwrap_or(sandbox.root()).to_path_buf();

    validate_rules(&folder, rules)?;

    let (existing, created) = match fs::read_to_string(&target) {
        Ok(text) => (text, false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (String::new(), true),
        Err(e) => {
            return Err(FopsError::from(FileIoError::from_io_error(
                "read .gitignore",
                &target_str,
                e,
            )))
        }
    };

    let merge = merge_rules(&existing, rules);

    if created || !merge.added.is_empty() {
        mkfile(
            sandbox,
            &target_str,
            merge.content.as_bytes(),
            WriteFlag::Overwrite,
            GITIGNORE_MODE,
        )?;
    }

    tracing::debug!(
        path = %target_str,
        added = merge.added.len(),
        skipped = merge.skipped.len(),
        created,
        "merged gitignore"
    );

    Ok(GitignoreMerge {
        path: target,
        added: merge.added,
        skipped: merge.skipped,
        created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_into_empty_dedents_template() {
        let merge = merge_rules(
            "",
            "
            #test
            /whatever/**
        ",
        );
        assert_eq!(merge.content, "#test\n/whatever/**\n");
        assert_eq!(merge.added, vec!["#test", "/whatever/**"]);
        assert!(merge.skipped.is_empty());
    }

    #[test]
    fn test_merge_skips_existing_and_keeps_formatting() {
        let existing = "# build output\n  target/\n*.log\n";
        let merge = merge_rules(existing, "target/\nnode_modules/\n*.log\n.env\n");

        assert_eq!(merge.skipped, vec!["target/", "*.log"]);
        assert_eq!(merge.added, vec!["node_modules/", ".env"]);
        assert_eq!(
            merge.content,
            "# build output\n  target/\n*.log\n\nnode_modules/\n.env\n"
        );
    }

    #[test]
    fn test_merge_dedupes_within_input_and_collapses_blanks() {
        let merge = merge_rules("", "\n\na\n\n\n\nb\na\n\n");
        assert_eq!(merge.content, "a\n\nb\n");
        assert_eq!(merge.skipped, vec!["a"]);
    }

    #[test]
    fn test_merge_without_trailing_newline() {
        let merge = merge_rules("dist", "build/");
        assert_eq!(merge.content, "dist\n\nbuild/\n");
    }

    #[test]
    fn test_merge_existing_ends_blank() {
        let merge = merge_rules("dist\n\n", "build/");
        assert_eq!(merge.content, "dist\n\nbuild/\n");
    }

    #[test]
    fn test_merge_nothing_new_leaves_content() {
        let existing = "a\r\nb\r\n";
        let merge = merge_rules(existing, "b\na");
        assert_eq!(merge.content, existing);
        assert!(merge.added.is_empty());
    }

    #[test]
    fn test_escaped_trailing_space_survives() {
        assert_eq!(normalize_line("  foo\\   "), "foo\\ ");
        assert_eq!(normalize_line("  foo   "), "foo");
        // Escaped backslash, then plain trailing spaces
        assert_eq!(normalize_line("foo\\\\  "), "foo\\\\");
        assert_eq!(normalize_line("foo\\\\\\ "), "foo\\\\\\ ");
    }

    #[test]
    fn test_mkgitignore_creates_in_folder() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        let merge = mkgitignore(&sandbox, "./foobar", "\n  #test\n  /whatever/**\n").unwrap();
        assert!(merge.created);
        assert_eq!(merge.path, sandbox.root().join("foobar/.gitignore"));
        assert_eq!(
            fs::read_to_string(&merge.path).unwrap(),
            "#test\n/whatever/**\n"
        );
    }

    #[test]
    fn test_mkgitignore_merges_existing_file() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let path = sandbox.root().join(".gitignore");
        fs::write(&path, "target/\n").unwrap();

        let merge = mkgitignore(&sandbox, ".gitignore", "target/\n*.tmp\n").unwrap();
        assert!(!merge.created);
        assert_eq!(merge.added, vec!["*.tmp"]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "target/\n\n*.tmp\n");

        // A second identical merge is a no-op
        let again = mkgitignore(&sandbox, ".gitignore", "target/\n*.tmp\n").unwrap();
        assert!(again.added.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "target/\n\n*.tmp\n");
    }

    #[test]
    fn test_mkgitignore_rejects_invalid_glob() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        let err = mkgitignore(&sandbox, ".", "ok/\nbroken[\n").unwrap_err();
        assert!(matches!(err, FopsError::FileIo(FileIoError::InvalidRule(_))));
        assert!(!sandbox.root().join(".gitignore").exists());
    }

    #[test]
    fn test_mkgitignore_outside_sandbox() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        assert!(mkgitignore(&sandbox, "..", "x").is_err());
    }
}
