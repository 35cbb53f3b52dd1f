#![deny(warnings)]

// Runtime configuration shared by the server and the library operations

use crate::error::{FileIoError, Result};
use crate::operations::catfile::Encoding;
use crate::operations::mkfile::{parse_mode, DEFAULT_FILE_MODE};
use std::path::PathBuf;

/// Environment keys read by [`Config::from_env`] and by the CLI flags.
pub mod env_keys {
    pub const ROOT: &str = "FOPS_ROOT";
    pub const ALLOW_SCRIPTS: &str = "FOPS_ALLOW_SCRIPTS";
    pub const ENCODING: &str = "FOPS_ENCODING";
    pub const FILE_MODE: &str = "FOPS_FILE_MODE";
    pub const LOG: &str = "FOPS_LOG";
    pub const LOG_JSON: &str = "FOPS_LOG_JSON";
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Sandbox root; mutations must resolve inside it
    pub root: PathBuf,
    /// Gate for mkscript/runscript
    pub allow_scripts: bool,
    /// Encoding used by catfile when the caller does not name one
    pub default_encoding: Encoding,
    /// Mode applied by mkfile when the caller does not name one
    pub file_mode: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            allow_scripts: true,
            default_encoding: Encoding::default(),
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl Config {
    /// Build a config from `FOPS_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(root) = env_non_empty(env_keys::ROOT) {
            config.root = PathBuf::from(root);
        }
        if let Some(flag) = env_non_empty(env_keys::ALLOW_SCRIPTS) {
            config.allow_scripts = parse_bool(env_keys::ALLOW_SCRIPTS, &flag)?;
        }
        if let Some(encoding) = env_non_empty(env_keys::ENCODING) {
            config.default_encoding = encoding.parse()?;
        }
        if let Some(mode) = env_non_empty(env_keys::FILE_MODE) {
            config.file_mode = parse_mode(&mode)?;
        }

        Ok(config)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse the usual truthy/falsy spellings of an environment flag
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(FileIoError::InvalidArgument(format!(
            "{} must be a boolean (1/0, true/false), got '{}'",
            key, other
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.allow_scripts);
        assert_eq!(config.default_encoding, Encoding::Base64);
        assert_eq!(config.file_mode, 0o744);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "1").unwrap());
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        let err = parse_bool("X", "maybe").unwrap_err();
        assert!(matches!(
            err,
            crate::error::FopsError::FileIo(FileIoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(env_keys::ROOT, "/srv/project");
        std::env::set_var(env_keys::ALLOW_SCRIPTS, "0");
        std::env::set_var(env_keys::ENCODING, "utf8");
        std::env::set_var(env_keys::FILE_MODE, "0644");

        let config = Config::from_env().unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/project"));
        assert!(!config.allow_scripts);
        assert_eq!(config.default_encoding, Encoding::Utf8);
        assert_eq!(config.file_mode, 0o644);

        std::env::set_var(env_keys::FILE_MODE, "rwx");
        assert!(Config::from_env().is_err());

        for key in [
            env_keys::ROOT,
            env_keys::ALLOW_SCRIPTS,
            env_keys::ENCODING,
            env_keys::FILE_MODE,
        ] {
            std::env::remove_var(key);
        }
    }
}
