//! Error types for brickops

use thiserror::Error;

/// Gluster error strings that indicate a transient cluster-wide lock
const TRANSIENT_GLUSTER_ERRORS: &[&str] = &[
    "Another transaction is in progress",
    "Locking failed",
    "Staging failed",
];

/// brickops error types
#[derive(Error, Debug)]
pub enum BrickOpsError {
    /// Request rejected before any command was issued
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A remote or local command exited unsuccessfully
    #[error("Command '{command}' failed on {host} (exit code: {exit_code:?}): {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// A command did not finish in time
    #[error("Command '{command}' on {host} timed out after {timeout} seconds")]
    CommandTimeout {
        host: String,
        command: String,
        timeout: u64,
    },

    /// SSH errors
    #[error("SSH error on {host}: {message}")]
    Ssh { host: String, message: String },

    /// The daemon answered with a non-zero opRet
    #[error("Gluster operation failed (opRet: {op_ret}, opErrno: {op_errno}): {message}")]
    Gluster {
        op_ret: i32,
        op_errno: i32,
        message: String,
    },

    /// Malformed XML output
    #[error("Unable to parse XML output: {0}")]
    Xml(String),

    /// Malformed JSON output
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output that parsed but did not carry the expected data
    #[error("Unexpected command output: {0}")]
    UnexpectedOutput(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The target is in a state that forbids the operation
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime failures (task join errors and the like)
    #[error("Execution error: {0}")]
    Execution(String),
}

impl BrickOpsError {
    /// Whether repeating the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BrickOpsError::Ssh { .. } | BrickOpsError::CommandTimeout { .. } => true,
            BrickOpsError::CommandFailed { stderr, .. } => is_transient_message(stderr),
            BrickOpsError::Gluster { message, .. } => is_transient_message(message),
            _ => false,
        }
    }
}

fn is_transient_message(message: &str) -> bool {
    TRANSIENT_GLUSTER_ERRORS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Result type alias using BrickOpsError
pub type Result<T> = std::result::Result<T, BrickOpsError>;
