//! In-memory object store
//!
//! Keeps objects in insertion order, which doubles as listing order, so tests
//! can drive the planner with an exact arrival sequence. Supports injected
//! failures and per-object fetch delays.

use super::error::{BackendError, BackendResult};
use super::types::{ByteRange, ListPage, ListRequest, ListedObject, ReadStream};
use super::RemoteStore;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Kind of failure to inject into a store call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Store auth layer rejects the call
    PermissionDenied,
    /// Retryable network failure
    Transient,
    /// Permanent failure
    Fatal,
}

impl InjectedFailure {
    fn into_error(self, key: &str) -> BackendError {
        match self {
            InjectedFailure::PermissionDenied => BackendError::PermissionDenied {
                key: key.to_string(),
                message: "injected permission failure".to_string(),
            },
            InjectedFailure::Transient => BackendError::Network {
                message: format!("injected transient failure for {}", key),
                source: None,
            },
            InjectedFailure::Fatal => BackendError::Other {
                backend: "memory".to_string(),
                message: format!("injected fatal failure for {}", key),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryObject {
    listed: ListedObject,
    data: Bytes,
}

#[derive(Debug, Default)]
struct Faults {
    /// key -> (failure, remaining count; None = always)
    fetch: HashMap<String, (InjectedFailure, Option<usize>)>,
    /// (failure, page index at which listing starts failing)
    list: Option<(InjectedFailure, usize)>,
    delays: HashMap<String, Duration>,
}

/// In-memory bucket for tests and demos
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<Vec<MemoryObject>>>,
    faults: Arc<RwLock<Faults>>,
    list_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create a new empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object with the given content; listing order is insertion order
    pub fn add_object(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let data = data.into();
        let listed = ListedObject::new(key, data.len() as u64)
            .with_last_modified(Utc::now())
            .with_etag(format!("{:x}", data.len()));
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(MemoryObject { listed, data });
    }

    /// Add an object filled with `size` copies of `byte`
    pub fn add_sized(&self, key: impl Into<String>, size: usize, byte: u8) {
        self.add_object(key, vec![byte; size]);
    }

    /// Make fetches of `key` fail; `times = None` fails forever
    pub fn fail_fetch(&self, key: impl Into<String>, failure: InjectedFailure, times: Option<usize>) {
        self.faults
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .fetch
            .insert(key.into(), (failure, times));
    }

    /// Make every listing call from page `from_page` onward fail
    pub fn fail_listing(&self, failure: InjectedFailure, from_page: usize) {
        self.faults.write().unwrap_or_else(|e| e.into_inner()).list = Some((failure, from_page));
    }

    /// Delay fetches of `key` before the first byte is returned
    pub fn delay_fetch(&self, key: impl Into<String>, delay: Duration) {
        self.faults
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .delays
            .insert(key.into(), delay);
    }

    /// Number of listing pages requested so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of fetches issued so far
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn take_fetch_fault(&self, key: &str) -> Option<InjectedFailure> {
        let mut faults = self.faults.write().unwrap_or_else(|e| e.into_inner());
        let entry = faults.fetch.get_mut(key)?;
        match entry.1 {
            None => Some(entry.0),
            Some(0) => None,
            Some(ref mut remaining) => {
                *remaining -= 1;
                Some(entry.0)
            }
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_page(
        &self,
        request: &ListRequest,
        token: Option<&str>,
    ) -> BackendResult<ListPage> {
        let page_index = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((failure, from_page)) = self.faults.read().unwrap_or_else(|e| e.into_inner()).list {
            if page_index >= from_page {
                return Err(failure.into_error("<listing>"));
            }
        }

        let start = match token {
            Some(t) => t.parse::<usize>().map_err(|_| BackendError::InvalidConfig {
                backend: "memory".to_string(),
                message: format!("invalid page token '{}'", t),
            })?,
            None => 0,
        };

        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let matching: Vec<&MemoryObject> = objects
            .iter()
            .filter(|o| match &request.prefix {
                Some(prefix) => o.listed.key.starts_with(prefix.as_str()),
                None => true,
            })
            .collect();

        let page_size = request.page_size.max(1);
        let end = (start + page_size).min(matching.len());
        let page = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|o| o.listed.clone())
            .collect();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }

    async fn fetch_range(&self, key: &str, range: Option<ByteRange>) -> BackendResult<ReadStream> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .faults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .delays
            .get(key)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.take_fetch_fault(key) {
            return Err(failure.into_error(key));
        }

        let data = {
            let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
            objects
                .iter()
                .find(|o| o.listed.key == key)
                .map(|o| o.data.clone())
                .ok_or_else(|| BackendError::NotFound {
                    key: key.to_string(),
                    backend: "memory".to_string(),
                })?
        };

        let slice = match range {
            Some(r) => {
                if r.end() > data.len() as u64 {
                    return Err(BackendError::InvalidRange {
                        key: key.to_string(),
                        message: format!("{}..{} beyond size {}", r.offset, r.end(), data.len()),
                    });
                }
                data.slice(r.offset as usize..r.end() as usize)
            }
            None => data,
        };

        Ok(Box::pin(stream::iter(vec![Ok(slice)])))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
