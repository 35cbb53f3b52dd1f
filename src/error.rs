#![deny(warnings)]

// Error types for the fops-mcp crate

use thiserror::Error;

/// Main error type for the fops-mcp application
#[derive(Error, Debug)]
pub enum FopsError {
    /// File operation errors
    #[error("File I/O error: {0}")]
    FileIo(#[from] FileIoError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// Transport layer errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File operation errors
#[derive(Error, Debug)]
pub enum FileIoError {
    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A non-path argument with an unusable value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation target resolves outside the sandbox root
    #[error("Path outside sandbox: {0}")]
    OutsideSandbox(String),

    /// Invalid file mode
    #[error("Invalid file mode: {0}")]
    InvalidMode(String),

    /// Unknown content encoding
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Unparseable .gitignore rule
    #[error("Invalid gitignore rule: {0}")]
    InvalidRule(String),

    /// Unparseable storage size or unit
    #[error("Invalid storage unit: {0}")]
    InvalidUnit(String),

    /// Script generation is switched off
    #[error("Scripts disabled: {0}")]
    ScriptsDisabled(String),

    /// Shell command exited unsuccessfully
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Read error
    #[error("Read error: {0}")]
    ReadError(String),

    /// Write error
    #[error("Write error: {0}")]
    WriteError(String),

    /// Regex compilation error
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] regex::Error),
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Invalid tool parameters
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParameters(String),
}

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// IO error in transport
    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FopsError>;

impl FileIoError {
    /// Map a std::io::Error to a more specific FileIoError based on the error kind
    pub fn from_io_error(operation: &str, path: &str, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::NotFound => {
                FileIoError::NotFound(format!("{} not found: {}", operation, path))
            }
            ErrorKind::PermissionDenied => FileIoError::PermissionDenied(format!(
                "Permission denied when {}: {}",
                operation, path
            )),
            ErrorKind::AlreadyExists => {
                FileIoError::WriteError(format!("{} already exists: {}", operation, path))
            }
            ErrorKind::InvalidInput => FileIoError::InvalidPath(format!(
                "Invalid input for {}: {} ({})",
                operation, path, error
            )),
            _ => FileIoError::WriteError(format!("Failed to {} {}: {}", operation, path, error)),
        }
    }
}

impl FopsError {
    /// True when the underlying failure is a missing path
    pub fn is_not_found(&self) -> bool {
        matches!(self, FopsError::FileIo(FileIoError::NotFound(_)))
    }
}
