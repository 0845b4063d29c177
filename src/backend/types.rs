//! Common types for remote object stores

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

/// A single object from a remote listing
///
/// Produced by the store during listing and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedObject {
    /// Full key relative to the bucket root
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modification time, when the store reports one
    pub last_modified: Option<DateTime<Utc>>,

    /// ETag or content hash, when the store reports one
    pub etag: Option<String>,
}

impl ListedObject {
    /// Create a listing record with only key and size
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }

    /// Builder pattern: set modification time
    pub fn with_last_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(modified);
        self
    }

    /// Builder pattern: set etag
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// File extension of the key, including the leading dot
    pub fn extension(&self) -> Option<&str> {
        let name = self.key.rsplit('/').next()?;
        name.rfind('.').map(|idx| &name[idx..])
    }
}

/// Parameters for one listing page request
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Only keys starting with this prefix are listed
    pub prefix: Option<String>,

    /// Maximum number of keys the store should return per page
    pub page_size: usize,
}

impl ListRequest {
    /// Create a request for the given prefix and page size
    pub fn new(prefix: Option<String>, page_size: usize) -> Self {
        Self { prefix, page_size }
    }
}

/// One page of a remote listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects in store order
    pub objects: Vec<ListedObject>,

    /// Token for the next page; `None` once the listing is exhausted
    pub next_token: Option<String>,
}

impl ListPage {
    /// A final page with no continuation
    pub fn last(objects: Vec<ListedObject>) -> Self {
        Self {
            objects,
            next_token: None,
        }
    }
}

/// Inclusive-exclusive byte window of a remote object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// HTTP `Range` header value (`bytes=start-end`, inclusive end)
    pub fn http_header(&self) -> String {
        format!("bytes={}-{}", self.offset, self.end().saturating_sub(1))
    }
}

/// Async read stream for object data
pub type ReadStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;
