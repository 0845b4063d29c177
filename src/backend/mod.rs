//! Remote object store abstraction
//!
//! The extraction pipeline needs exactly two capabilities from a store:
//! paginated listing and ranged fetches. This module defines them as the
//! [`RemoteStore`] trait and ships implementations for the local filesystem,
//! an in-memory bucket, S3 and (through `object_store`) Azure Blob and GCS.
//!
//! # Example
//!
//! ```no_run
//! use orbit_extract::backend::{ListRequest, LocalStore, RemoteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LocalStore::new("/data/bucket");
//!     let page = store.list_page(&ListRequest::new(None, 100), None).await?;
//!     for obj in page.objects {
//!         println!("{}: {} bytes", obj.key, obj.size);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;

mod local;
mod memory;
mod retry;
mod url;

#[cfg(feature = "s3-native")]
mod s3;

#[cfg(any(feature = "azure-native", feature = "gcs-native"))]
mod cloud;

pub use error::{BackendError, BackendResult};
pub use local::LocalStore;
pub use memory::{InjectedFailure, MemoryStore};
pub use retry::RetryingStore;
pub use types::{ByteRange, ListPage, ListRequest, ListedObject, ReadStream};
pub use url::{open_store, BucketUrl, Scheme, StoreOptions};

#[cfg(feature = "s3-native")]
pub use s3::{S3Store, S3StoreConfig};

#[cfg(any(feature = "azure-native", feature = "gcs-native"))]
pub use cloud::CloudStore;

use async_trait::async_trait;

/// Listing and fetch capabilities of a remote bucket
///
/// Implementors must be `Send + Sync`: the downloader issues fetches for
/// several objects concurrently against a shared store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch one page of the listing
    ///
    /// `token` is `None` for the first page and the previous page's
    /// `next_token` afterwards. Objects are returned in the store's listing
    /// order, which the planner treats as arrival order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::PermissionDenied` if the store rejects the listing.
    async fn list_page(&self, request: &ListRequest, token: Option<&str>)
        -> BackendResult<ListPage>;

    /// Open a stream over an object, or over `range` of it when given
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the key doesn't exist.
    /// Returns `BackendError::InvalidRange` if the range lies outside the object.
    async fn fetch_range(&self, key: &str, range: Option<ByteRange>) -> BackendResult<ReadStream>;

    /// Get the store name/type (e.g., "local", "memory", "s3")
    fn backend_name(&self) -> &str;
}
