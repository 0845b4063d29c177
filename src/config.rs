/*!
 * Configuration types for Orbit Extract
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};
use crate::extract::policy::ExtractPolicy;

/// Main configuration for an extraction run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Which objects, and which bytes of them, to keep
    #[serde(default)]
    pub policy: ExtractPolicy,

    /// Safety caps on the remote listing
    #[serde(default)]
    pub glob: GlobLimits,

    /// Download worker pool and scratch location
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behaviour for individual remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Region for S3 buckets
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Listing caps; a zero value falls back to the default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobLimits {
    /// Cumulative size of forwarded objects, in bytes
    pub max_total_size: u64,

    /// Objects that pass the glob filter
    pub max_objects_matched: usize,

    /// Objects enumerated from the store, matched or not
    pub max_objects_listed: u64,

    /// Keys requested per listing page
    pub page_size: usize,
}

impl GlobLimits {
    pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 10 * 1024 * 1024 * 1024;
    pub const DEFAULT_MAX_OBJECTS_MATCHED: usize = 1000;
    pub const DEFAULT_MAX_OBJECTS_LISTED: u64 = 1_000_000;
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    /// Limits with every zero replaced by its default
    pub fn effective(&self) -> Self {
        fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
            if value == T::default() {
                default
            } else {
                value
            }
        }

        Self {
            max_total_size: or_default(self.max_total_size, Self::DEFAULT_MAX_TOTAL_SIZE),
            max_objects_matched: or_default(
                self.max_objects_matched,
                Self::DEFAULT_MAX_OBJECTS_MATCHED,
            ),
            max_objects_listed: or_default(self.max_objects_listed, Self::DEFAULT_MAX_OBJECTS_LISTED),
            page_size: or_default(self.page_size, Self::DEFAULT_PAGE_SIZE),
        }
    }
}

impl Default for GlobLimits {
    fn default() -> Self {
        Self {
            max_total_size: Self::DEFAULT_MAX_TOTAL_SIZE,
            max_objects_matched: Self::DEFAULT_MAX_OBJECTS_MATCHED,
            max_objects_listed: Self::DEFAULT_MAX_OBJECTS_LISTED,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Downloader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Concurrent fetches
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Parent of the per-run scratch directory (None = system temp dir)
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            temp_root: None,
        }
    }
}

/// Fixed-backoff retry of transient remote failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_workers() -> usize {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl ExtractConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| ExtractError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ExtractError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
