//! Local filesystem store
//!
//! Treats a directory as a bucket: every regular file below the root is an
//! object whose key is its path relative to the root, joined with `/`.

use super::error::{BackendError, BackendResult};
use super::types::{ByteRange, ListPage, ListRequest, ListedObject, ReadStream};
use super::RemoteStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use walkdir::WalkDir;

/// Local directory exposed as a bucket
///
/// # Example
///
/// ```no_run
/// use orbit_extract::backend::{LocalStore, RemoteStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = LocalStore::new("/srv/exports");
///     let stream = store.fetch_range("2024/01/part-0.csv", None).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at a directory
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_key(&self, key: &str) -> BackendResult<PathBuf> {
        if key.split('/').any(|segment| segment == "..") {
            return Err(BackendError::InvalidConfig {
                backend: "local".to_string(),
                message: format!("key '{}' escapes the store root", key),
            });
        }
        Ok(self.root.join(key))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Deepest directory that can contain keys with this prefix
    fn walk_start(&self, prefix: Option<&str>) -> PathBuf {
        match prefix.and_then(|p| p.rfind('/').map(|idx| &p[..idx])) {
            Some(dir) if !dir.is_empty() => self.root.join(dir),
            _ => self.root.clone(),
        }
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn list_page(
        &self,
        request: &ListRequest,
        token: Option<&str>,
    ) -> BackendResult<ListPage> {
        let skip = match token {
            Some(t) => t.parse::<usize>().map_err(|_| BackendError::InvalidConfig {
                backend: "local".to_string(),
                message: format!("invalid page token '{}'", t),
            })?,
            None => 0,
        };

        let start = self.walk_start(request.prefix.as_deref());
        let prefix = request.prefix.clone();
        let page_size = request.page_size.max(1);
        let store = self.clone();

        // walkdir is blocking; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            if !start.exists() {
                return Ok(ListPage::default());
            }

            let mut seen = 0usize;
            let mut objects = Vec::with_capacity(page_size);
            let mut has_more = false;

            for entry in WalkDir::new(&start).sort_by_file_name() {
                let entry = entry.map_err(|e| BackendError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(key) = store.key_for(entry.path()) else {
                    continue;
                };
                if let Some(p) = &prefix {
                    if !key.starts_with(p.as_str()) {
                        continue;
                    }
                }

                seen += 1;
                if seen <= skip {
                    continue;
                }
                if objects.len() == page_size {
                    has_more = true;
                    break;
                }

                let meta = entry.metadata().map_err(|e| BackendError::Io(e.into()))?;
                let mut obj = ListedObject::new(key, meta.len());
                if let Ok(modified) = meta.modified() {
                    obj = obj.with_last_modified(DateTime::<Utc>::from(modified));
                }
                objects.push(obj);
            }

            let next_token = has_more.then(|| (skip + objects.len()).to_string());
            Ok(ListPage {
                objects,
                next_token,
            })
        })
        .await
        .map_err(|e| BackendError::Other {
            backend: "local".to_string(),
            message: format!("listing task failed: {}", e),
        })?
    }

    async fn fetch_range(&self, key: &str, range: Option<ByteRange>) -> BackendResult<ReadStream> {
        let path = self.resolve_key(key)?;
        let mut file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BackendError::NotFound {
                key: key.to_string(),
                backend: "local".to_string(),
            },
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied {
                key: key.to_string(),
                message: e.to_string(),
            },
            _ => BackendError::Io(e),
        })?;

        match range {
            Some(r) => {
                let size = file.metadata().await?.len();
                if r.end() > size {
                    return Err(BackendError::InvalidRange {
                        key: key.to_string(),
                        message: format!("{}..{} beyond size {}", r.offset, r.end(), size),
                    });
                }
                file.seek(SeekFrom::Start(r.offset)).await?;
                Ok(Box::pin(ReaderStream::new(file.take(r.length))))
            }
            None => Ok(Box::pin(ReaderStream::new(file))),
        }
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}
