//! Bucket URL parsing and store construction
//!
//! Supported URL formats:
//! - `s3://bucket/pattern` - S3 (requires `s3-native` feature)
//! - `gs://bucket/pattern` or `gcs://bucket/pattern` - GCS (requires `gcs-native` feature)
//! - `azure://container/pattern` or `az://container/pattern` - Azure Blob (requires `azure-native` feature)
//! - `file:///dir/pattern` - local directory treated as a bucket
//!
//! The pattern is everything after the bucket, matched against keys relative
//! to the bucket root. It is not percent-decoded: `?`, `[` and `]` are glob
//! syntax here, not URL syntax.

use super::{LocalStore, RemoteStore, RetryingStore};
use crate::config::{ExtractConfig, RetryConfig};
use crate::error::{ExtractError, Result};
use crate::extract::glob::split_pattern;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Storage provider named by a bucket URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    S3,
    Gcs,
    Azure,
    File,
}

impl Scheme {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Some(Scheme::S3),
            "gs" | "gcs" => Some(Scheme::Gcs),
            "azure" | "az" => Some(Scheme::Azure),
            "file" => Some(Scheme::File),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::S3 => write!(f, "s3"),
            Scheme::Gcs => write!(f, "gs"),
            Scheme::Azure => write!(f, "azure"),
            Scheme::File => write!(f, "file"),
        }
    }
}

/// A parsed `scheme://bucket/pattern` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketUrl {
    pub scheme: Scheme,
    /// Bucket or container name; the root directory for `file://`
    pub bucket: String,
    /// Glob pattern relative to the bucket root
    pub pattern: String,
}

impl BucketUrl {
    /// Parse a bucket URL, rejecting unknown schemes and empty patterns
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ExtractError::Config(format!("'{}' is not a bucket URL", url)))?;
        let scheme = Scheme::parse(scheme).ok_or_else(|| {
            ExtractError::Config(format!(
                "unsupported scheme '{}' in '{}' (expected s3, gs, azure or file)",
                scheme, url
            ))
        })?;

        if scheme == Scheme::File {
            return Self::parse_file(rest);
        }

        let (bucket, pattern) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(ExtractError::Config(format!("missing bucket name in '{}'", url)));
        }
        if pattern.is_empty() {
            return Err(ExtractError::Config(format!("missing object pattern in '{}'", url)));
        }

        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            pattern: pattern.to_string(),
        })
    }

    fn parse_file(path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(ExtractError::Config(format!(
                "file URL must be absolute: 'file://{}'",
                path
            )));
        }
        let trimmed = path.trim_start_matches('/');
        let (prefix, glob) = split_pattern(trimmed);
        let (root, pattern) = match prefix.rsplit_once('/') {
            Some((dir, _)) if glob.is_none() => (dir.to_string(), &trimmed[dir.len() + 1..]),
            None if glob.is_none() => (String::new(), trimmed),
            _ => {
                let dir = prefix.trim_end_matches('/');
                (dir.to_string(), trimmed[dir.len()..].trim_start_matches('/'))
            }
        };
        if pattern.is_empty() {
            return Err(ExtractError::Config(format!(
                "missing file pattern in 'file://{}'",
                path
            )));
        }

        Ok(Self {
            scheme: Scheme::File,
            bucket: format!("/{}", root),
            pattern: pattern.to_string(),
        })
    }
}

impl fmt::Display for BucketUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            Scheme::File => write!(f, "file://{}/{}", self.bucket.trim_end_matches('/'), self.pattern),
            _ => write!(f, "{}://{}/{}", self.scheme, self.bucket, self.pattern),
        }
    }
}

/// Connection settings forwarded to provider SDKs
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Region for S3 buckets
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack, ...)
    pub endpoint: Option<String>,
    pub retry: RetryConfig,
}

impl From<&ExtractConfig> for StoreOptions {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            retry: config.retry.clone(),
        }
    }
}

/// Build the store for a bucket URL, wrapped in the retry decorator
pub async fn open_store(url: &BucketUrl, options: &StoreOptions) -> Result<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match url.scheme {
        Scheme::File => {
            let root = PathBuf::from(&url.bucket);
            if !root.is_dir() {
                return Err(ExtractError::Config(format!(
                    "'{}' is not a directory",
                    root.display()
                )));
            }
            Arc::new(LocalStore::new(root))
        }
        Scheme::S3 => open_s3(url, options).await?,
        Scheme::Gcs => open_gcs(url)?,
        Scheme::Azure => open_azure(url)?,
    };

    tracing::debug!(backend = store.backend_name(), bucket = %url.bucket, "opened store");
    Ok(Arc::new(RetryingStore::new(store, &options.retry)))
}

#[cfg(feature = "s3-native")]
async fn open_s3(url: &BucketUrl, options: &StoreOptions) -> Result<Arc<dyn RemoteStore>> {
    let config = super::S3StoreConfig {
        bucket: url.bucket.clone(),
        region: options.region.clone(),
        endpoint: options.endpoint.clone(),
    };
    Ok(Arc::new(super::S3Store::new(config).await?))
}

#[cfg(not(feature = "s3-native"))]
async fn open_s3(_url: &BucketUrl, _options: &StoreOptions) -> Result<Arc<dyn RemoteStore>> {
    Err(ExtractError::Config(
        "s3:// URLs require the `s3-native` feature".to_string(),
    ))
}

#[cfg(feature = "gcs-native")]
fn open_gcs(url: &BucketUrl) -> Result<Arc<dyn RemoteStore>> {
    Ok(Arc::new(super::CloudStore::gcs(&url.bucket)?))
}

#[cfg(not(feature = "gcs-native"))]
fn open_gcs(_url: &BucketUrl) -> Result<Arc<dyn RemoteStore>> {
    Err(ExtractError::Config(
        "gs:// URLs require the `gcs-native` feature".to_string(),
    ))
}

#[cfg(feature = "azure-native")]
fn open_azure(url: &BucketUrl) -> Result<Arc<dyn RemoteStore>> {
    Ok(Arc::new(super::CloudStore::azure(&url.bucket)?))
}

#[cfg(not(feature = "azure-native"))]
fn open_azure(_url: &BucketUrl) -> Result<Arc<dyn RemoteStore>> {
    Err(ExtractError::Config(
        "azure:// URLs require the `azure-native` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_url() {
        let url = BucketUrl::parse("s3://my-bucket/data/**/*.parquet").unwrap();
        assert_eq!(url.scheme, Scheme::S3);
        assert_eq!(url.bucket, "my-bucket");
        assert_eq!(url.pattern, "data/**/*.parquet");
        assert_eq!(url.to_string(), "s3://my-bucket/data/**/*.parquet");
    }

    #[test]
    fn test_question_mark_stays_in_pattern() {
        let url = BucketUrl::parse("gs://b/logs/day-0?.csv").unwrap();
        assert_eq!(url.scheme, Scheme::Gcs);
        assert_eq!(url.pattern, "logs/day-0?.csv");
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = BucketUrl::parse("ftp://host/file.csv").unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn test_rejects_missing_pattern() {
        assert!(BucketUrl::parse("s3://bucket").is_err());
        assert!(BucketUrl::parse("s3:///data.csv").is_err());
    }

    #[test]
    fn test_parse_file_url_with_glob() {
        let url = BucketUrl::parse("file:///srv/exports/2024/**/*.csv").unwrap();
        assert_eq!(url.scheme, Scheme::File);
        assert_eq!(url.bucket, "/srv/exports/2024");
        assert_eq!(url.pattern, "**/*.csv");
    }

    #[test]
    fn test_parse_file_url_single_file() {
        let url = BucketUrl::parse("file:///srv/exports/data.csv").unwrap();
        assert_eq!(url.bucket, "/srv/exports");
        assert_eq!(url.pattern, "data.csv");
    }

    #[test]
    fn test_relative_file_url_rejected() {
        assert!(BucketUrl::parse("file://relative/*.csv").is_err());
    }
}
