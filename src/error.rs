/*!
 * Error types for Orbit Extract
 */

use std::io;
use thiserror::Error;

use crate::backend::BackendError;

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// Invalid glob pattern, bucket URL or configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store's auth layer rejected a listing or fetch
    #[error("Permission denied for '{key}': {message}")]
    PermissionDenied { key: String, message: String },

    /// A listing safety cap was exceeded
    #[error("Glob pattern exceeds limits: {message} (limit {limit})")]
    ResourceExhausted { limit: u64, message: String },

    /// Retryable network/throttling failure that outlived its retries
    #[error("Transient remote error: {0}")]
    TransientRemote(String),

    /// Non-retryable remote failure
    #[error("Remote error: {0}")]
    FatalRemote(String),

    /// The glob matched nothing in the bucket
    #[error("No files found for glob pattern '{pattern}'")]
    NoMatches { pattern: String },

    /// The run was cancelled by the caller
    #[error("Extraction cancelled")]
    Cancelled,

    /// Local I/O failure while writing scratch files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Primary failure combined with a failure to release temporary artifacts
    #[error("{primary} (cleanup also failed: {cleanup})")]
    Cleanup {
        primary: Box<ExtractError>,
        cleanup: String,
    },
}

impl ExtractError {
    /// Combine this error with a cleanup failure instead of discarding either
    pub fn with_cleanup(self, cleanup: impl std::fmt::Display) -> Self {
        ExtractError::Cleanup {
            primary: Box::new(self),
            cleanup: cleanup.to_string(),
        }
    }

    /// The error that caused the run to fail, looking through cleanup wrappers
    pub fn primary(&self) -> &ExtractError {
        match self {
            ExtractError::Cleanup { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.primary() {
            ExtractError::Config(_)
            | ExtractError::PermissionDenied { .. }
            | ExtractError::ResourceExhausted { .. }
            | ExtractError::NoMatches { .. } => EXIT_FATAL,
            ExtractError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if this error is transient (temporary, worth retrying the run)
    pub fn is_transient(&self) -> bool {
        match self.primary() {
            ExtractError::TransientRemote(_) => true,
            ExtractError::Io(io_err) => matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Check if this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.primary(), ExtractError::Cancelled)
    }

    /// Get error category for logging and instrumentation
    pub fn category(&self) -> ErrorCategory {
        match self.primary() {
            ExtractError::Config(_) => ErrorCategory::Configuration,
            ExtractError::PermissionDenied { .. } => ErrorCategory::Security,
            ExtractError::ResourceExhausted { .. } => ErrorCategory::Resource,
            ExtractError::TransientRemote(_) | ExtractError::FatalRemote(_) => {
                ErrorCategory::Network
            }
            ExtractError::NoMatches { .. } => ErrorCategory::Validation,
            ExtractError::Cancelled => ErrorCategory::Cancelled,
            ExtractError::Io(_) => ErrorCategory::IoError,
            ExtractError::Cleanup { .. } => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Pattern or policy validation errors
    Validation,
    /// Local I/O errors
    IoError,
    /// Listing caps exceeded
    Resource,
    /// Configuration errors
    Configuration,
    /// Network/protocol errors
    Network,
    /// Authentication/authorization errors
    Security,
    /// Caller cancelled the run
    Cancelled,
    /// Uncategorized errors
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Resource => write!(f, "resource"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Cancelled => write!(f, "cancelled"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<BackendError> for ExtractError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied { key, message } => {
                ExtractError::PermissionDenied { key, message }
            }
            BackendError::AuthenticationFailed { backend, message } => {
                ExtractError::PermissionDenied {
                    key: backend,
                    message,
                }
            }
            BackendError::InvalidConfig { backend, message } => {
                ExtractError::Config(format!("{}: {}", backend, message))
            }
            other if other.is_retriable() => ExtractError::TransientRemote(other.to_string()),
            other => ExtractError::FatalRemote(other.to_string()),
        }
    }
}
