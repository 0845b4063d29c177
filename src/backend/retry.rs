//! Retry decorator for remote stores
//!
//! Transient failures (network, timeouts, throttling) are retried with a fixed
//! backoff and a bounded number of attempts. Anything else is returned on the
//! first failure so auth problems surface immediately.

use super::error::BackendResult;
use super::types::{ByteRange, ListPage, ListRequest, ReadStream};
use super::RemoteStore;
use crate::config::RetryConfig;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Store wrapper that retries transient failures of individual calls
///
/// Only the call that opens a fetch stream is retried; a stream that fails
/// midway is reported to the caller as-is.
pub struct RetryingStore {
    inner: Arc<dyn RemoteStore>,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryingStore {
    /// Wrap a store with the given retry settings
    pub fn new(inner: Arc<dyn RemoteStore>, config: &RetryConfig) -> Self {
        Self {
            inner,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> BackendResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retriable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        backend = self.inner.backend_name(),
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "transient store failure, retrying after {:?}",
                        self.backoff
                    );
                    attempt += 1;
                    sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RemoteStore for RetryingStore {
    async fn list_page(
        &self,
        request: &ListRequest,
        token: Option<&str>,
    ) -> BackendResult<ListPage> {
        self.with_retry("list_page", || self.inner.list_page(request, token))
            .await
    }

    async fn fetch_range(&self, key: &str, range: Option<ByteRange>) -> BackendResult<ReadStream> {
        self.with_retry("fetch_range", || self.inner.fetch_range(key, range))
            .await
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InjectedFailure;
    use crate::backend::MemoryStore;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let store = MemoryStore::new();
        store.add_object("k", "abc");
        store.fail_fetch("k", InjectedFailure::Transient, Some(2));

        let retrying = RetryingStore::new(Arc::new(store.clone()), &config(3));
        assert!(retrying.fetch_range("k", None).await.is_ok());
        assert_eq!(store.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = MemoryStore::new();
        store.add_object("k", "abc");
        store.fail_fetch("k", InjectedFailure::Transient, None);

        let retrying = RetryingStore::new(Arc::new(store.clone()), &config(2));
        let err = retrying.fetch_range("k", None).await.err().unwrap();
        assert!(err.is_retriable());
        assert_eq!(store.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_permission_denied_not_retried() {
        let store = MemoryStore::new();
        store.add_object("k", "abc");
        store.fail_fetch("k", InjectedFailure::PermissionDenied, None);

        let retrying = RetryingStore::new(Arc::new(store.clone()), &config(5));
        let err = retrying.fetch_range("k", None).await.err().unwrap();
        assert!(err.is_auth_error());
        assert_eq!(store.fetch_calls(), 1);
    }
}
