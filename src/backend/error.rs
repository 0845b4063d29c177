//! Error types for remote object stores
//!
//! Every store implementation classifies its provider errors into these
//! variants so the extraction pipeline can tell auth failures, retryable
//! network trouble and permanent failures apart.

use std::fmt;
use std::io;

/// Result type alias for store operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Unified error type for store operations
#[derive(Debug)]
pub enum BackendError {
    /// I/O error occurred during a store operation
    Io(io::Error),

    /// Object not found in the bucket
    NotFound { key: String, backend: String },

    /// Permission denied accessing an object or listing
    PermissionDenied { key: String, message: String },

    /// Authentication failed
    AuthenticationFailed { backend: String, message: String },

    /// Connection failed to the remote store
    ConnectionFailed {
        backend: String,
        endpoint: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out
    Timeout {
        operation: String,
        duration_secs: u64,
    },

    /// The store asked us to slow down
    Throttled { backend: String, message: String },

    /// Invalid configuration for the store
    InvalidConfig { backend: String, message: String },

    /// Requested byte range is not satisfiable
    InvalidRange { key: String, message: String },

    /// Network error during a remote operation
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic store error with context
    Other { backend: String, message: String },
}

impl BackendError {
    /// Check if this error is retriable (transient)
    pub fn is_retriable(&self) -> bool {
        match self {
            BackendError::Timeout { .. } => true,
            BackendError::ConnectionFailed { .. } => true,
            BackendError::Network { .. } => true,
            BackendError::Throttled { .. } => true,
            BackendError::Io(e) => {
                matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                )
            }

            BackendError::NotFound { .. } => false,
            BackendError::PermissionDenied { .. } => false,
            BackendError::AuthenticationFailed { .. } => false,
            BackendError::InvalidConfig { .. } => false,
            BackendError::InvalidRange { .. } => false,
            BackendError::Other { .. } => false,
        }
    }

    /// Check if this error indicates the object was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }

    /// Check if this error is related to authentication or authorization
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BackendError::AuthenticationFailed { .. } | BackendError::PermissionDenied { .. }
        )
    }

    /// Classify a provider error message the way the S3/GCS/Azure SDKs report them
    pub fn classify(backend: &str, key: &str, message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("accessdenied")
            || lower.contains("access denied")
            || lower.contains("forbidden")
            || lower.contains("403")
        {
            BackendError::PermissionDenied {
                key: key.to_string(),
                message,
            }
        } else if lower.contains("nosuchkey") || lower.contains("404") || lower.contains("not found")
        {
            BackendError::NotFound {
                key: key.to_string(),
                backend: backend.to_string(),
            }
        } else if lower.contains("slowdown")
            || lower.contains("throttl")
            || lower.contains("429")
            || lower.contains("503")
            || lower.contains("serviceunavailable")
        {
            BackendError::Throttled {
                backend: backend.to_string(),
                message,
            }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            BackendError::Timeout {
                operation: format!("{} {}", backend, key),
                duration_secs: 0,
            }
        } else if lower.contains("connection reset")
            || lower.contains("connection refused")
            || lower.contains("broken pipe")
            || lower.contains("dispatch failure")
        {
            BackendError::Network {
                message,
                source: None,
            }
        } else {
            BackendError::Other {
                backend: backend.to_string(),
                message,
            }
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Io(err) => write!(f, "I/O error: {}", err),
            BackendError::NotFound { key, backend } => {
                write!(f, "Object not found on {}: {}", backend, key)
            }
            BackendError::PermissionDenied { key, message } => {
                write!(f, "Permission denied for {}: {}", key, message)
            }
            BackendError::AuthenticationFailed { backend, message } => {
                write!(f, "Authentication failed for {}: {}", backend, message)
            }
            BackendError::ConnectionFailed {
                backend,
                endpoint,
                source,
            } => {
                if let Some(src) = source {
                    write!(f, "Connection to {} ({}) failed: {}", backend, endpoint, src)
                } else {
                    write!(f, "Connection to {} ({}) failed", backend, endpoint)
                }
            }
            BackendError::Timeout {
                operation,
                duration_secs,
            } => {
                write!(
                    f,
                    "Operation '{}' timed out after {} seconds",
                    operation, duration_secs
                )
            }
            BackendError::Throttled { backend, message } => {
                write!(f, "Request throttled by {}: {}", backend, message)
            }
            BackendError::InvalidConfig { backend, message } => {
                write!(f, "Invalid configuration for {}: {}", backend, message)
            }
            BackendError::InvalidRange { key, message } => {
                write!(f, "Invalid range for {}: {}", key, message)
            }
            BackendError::Network { message, source } => {
                if let Some(src) = source {
                    write!(f, "Network error: {} ({})", message, src)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            BackendError::Other { backend, message } => {
                write!(f, "Backend error on {}: {}", backend, message)
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BackendError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => BackendError::NotFound {
                key: String::new(),
                backend: "unknown".to_string(),
            },
            io::ErrorKind::PermissionDenied => BackendError::PermissionDenied {
                key: String::new(),
                message: err.to_string(),
            },
            _ => BackendError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retriable() {
        let err = BackendError::Timeout {
            operation: "list".to_string(),
            duration_secs: 30,
        };
        assert!(err.is_retriable());

        let err = BackendError::NotFound {
            key: "a.csv".to_string(),
            backend: "s3".to_string(),
        };
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::AuthenticationFailed {
            backend: "gcs".to_string(),
            message: "invalid credentials".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication failed for gcs: invalid credentials"
        );
    }

    #[test]
    fn test_classify_provider_messages() {
        let err = BackendError::classify("s3", "k", "AccessDenied: nope".to_string());
        assert!(err.is_auth_error());

        let err = BackendError::classify("s3", "k", "SlowDown: reduce rate".to_string());
        assert!(err.is_retriable());

        let err = BackendError::classify("gcs", "k", "HTTP 404 Not Found".to_string());
        assert!(err.is_not_found());

        let err = BackendError::classify("azure", "k", "malformed xml".to_string());
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let backend_err: BackendError = io_err.into();
        assert!(backend_err.is_not_found());
    }
}
