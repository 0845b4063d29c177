//! Azure Blob Storage and Google Cloud Storage via the `object_store` crate
//!
//! Authentication comes from the environment:
//! - GCS: `GOOGLE_APPLICATION_CREDENTIALS` or `GOOGLE_SERVICE_ACCOUNT`
//! - Azure: `AZURE_STORAGE_ACCOUNT_NAME` plus `AZURE_STORAGE_ACCOUNT_KEY` or a SAS token
//!
//! `object_store` has no page tokens, so pages are resumed with
//! `list_with_offset` using the last key of the previous page.

use super::error::{BackendError, BackendResult};
use super::types::{ByteRange, ListPage, ListRequest, ListedObject, ReadStream};
use super::RemoteStore;
use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, GetRange, ObjectMeta, ObjectStore};
use std::sync::Arc;

/// Cloud bucket backed by an `object_store` implementation
pub struct CloudStore {
    store: Arc<dyn ObjectStore>,
    name: &'static str,
}

impl CloudStore {
    /// Wrap an existing `object_store` client
    pub fn from_store(store: Arc<dyn ObjectStore>, name: &'static str) -> Self {
        Self { store, name }
    }

    /// Open a GCS bucket using credentials from the environment
    #[cfg(feature = "gcs-native")]
    pub fn gcs(bucket: &str) -> BackendResult<Self> {
        let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| BackendError::InvalidConfig {
                backend: "gcs".to_string(),
                message: format!("Failed to create GCS client: {}", e),
            })?;
        Ok(Self::from_store(Arc::new(store), "gcs"))
    }

    /// Open an Azure Blob container using credentials from the environment
    #[cfg(feature = "azure-native")]
    pub fn azure(container: &str) -> BackendResult<Self> {
        let store = object_store::azure::MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| BackendError::InvalidConfig {
                backend: "azure".to_string(),
                message: format!("Failed to create Azure client: {}", e),
            })?;
        Ok(Self::from_store(Arc::new(store), "azure"))
    }

    fn map_error(&self, key: &str, err: object_store::Error) -> BackendError {
        match err {
            object_store::Error::NotFound { .. } => BackendError::NotFound {
                key: key.to_string(),
                backend: self.name.to_string(),
            },
            other => BackendError::classify(self.name, key, other.to_string()),
        }
    }

    fn convert_object_meta(meta: &ObjectMeta) -> ListedObject {
        let mut listed = ListedObject::new(meta.location.as_ref(), meta.size as u64)
            .with_last_modified(meta.last_modified);
        listed.etag = meta.e_tag.clone();
        listed
    }
}

#[async_trait]
impl RemoteStore for CloudStore {
    #[tracing::instrument(skip(self, request), fields(backend = self.name))]
    async fn list_page(
        &self,
        request: &ListRequest,
        token: Option<&str>,
    ) -> BackendResult<ListPage> {
        // object_store prefixes are whole path segments; list the enclosing
        // directory and filter on the raw key prefix ourselves
        let key_prefix = request.prefix.clone().unwrap_or_default();
        let dir = key_prefix
            .rfind('/')
            .map(|idx| ObjectPath::from(&key_prefix[..idx]));
        let page_size = request.page_size.max(1);

        let listing = match token {
            Some(offset) => self
                .store
                .list_with_offset(dir.as_ref(), &ObjectPath::from(offset)),
            None => self.store.list(dir.as_ref()),
        };

        let metas: Vec<ObjectMeta> = listing
            .try_filter(|meta| futures::future::ready(meta.location.as_ref().starts_with(&key_prefix)))
            .take(page_size + 1)
            .try_collect()
            .await
            .map_err(|e| self.map_error(&key_prefix, e))?;

        let has_more = metas.len() > page_size;
        let objects: Vec<ListedObject> = metas
            .iter()
            .take(page_size)
            .map(Self::convert_object_meta)
            .collect();
        let next_token = if has_more {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    #[tracing::instrument(skip(self), fields(backend = self.name))]
    async fn fetch_range(&self, key: &str, range: Option<ByteRange>) -> BackendResult<ReadStream> {
        let options = GetOptions {
            range: range.map(|r| GetRange::Bounded(r.offset as usize..r.end() as usize)),
            ..Default::default()
        };

        let stream = self
            .store
            .get_opts(&ObjectPath::from(key), options)
            .await
            .map_err(|e| self.map_error(key, e))?
            .into_stream()
            .map_err(|e| std::io::Error::other(e.to_string()))
            .boxed();

        Ok(stream)
    }

    fn backend_name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use object_store::memory::InMemory;
    use object_store::PutPayload;

    async fn seeded() -> CloudStore {
        let inner = InMemory::new();
        for (key, data) in [
            ("data/2024/a.csv", "0123456789"),
            ("data/2024/b.csv", "abc"),
            ("data/2024x/c.csv", "zz"),
            ("other/d.csv", "q"),
        ] {
            inner
                .put(&ObjectPath::from(key), PutPayload::from(Bytes::from(data)))
                .await
                .unwrap();
        }
        CloudStore::from_store(Arc::new(inner), "memory")
    }

    #[tokio::test]
    async fn test_pages_resume_from_last_key() {
        let store = seeded().await;
        let req = ListRequest::new(Some("data/2024/".to_string()), 1);

        let first = store.list_page(&req, None).await.unwrap();
        assert_eq!(first.objects[0].key, "data/2024/a.csv");
        assert_eq!(first.next_token.as_deref(), Some("data/2024/a.csv"));

        let second = store
            .list_page(&req, first.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.objects[0].key, "data/2024/b.csv");
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_single_key_prefix() {
        let store = seeded().await;
        let req = ListRequest::new(Some("other/d.csv".to_string()), 10);
        let page = store.list_page(&req, None).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert_eq!(page.objects[0].size, 1);
    }

    #[tokio::test]
    async fn test_ranged_fetch() {
        let store = seeded().await;
        let mut stream = store
            .fetch_range("data/2024/a.csv", Some(ByteRange::new(2, 3)))
            .await
            .unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(out, b"234");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = seeded().await;
        let err = store.fetch_range("nope.csv", None).await.err().unwrap();
        assert!(err.is_not_found());
    }
}
