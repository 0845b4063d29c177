//! S3 store implementation
//!
//! Lists with `ListObjectsV2` continuation tokens and fetches with ranged
//! `GetObject` requests.

use super::error::{BackendError, BackendResult};
use super::types::{ByteRange, ListPage, ListRequest, ListedObject, ReadStream};
use super::RemoteStore;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::Client as AwsS3Client;
use chrono::{DateTime, Utc};
use tokio_util::io::ReaderStream;

/// Connection settings for an S3 bucket
#[derive(Debug, Clone, Default)]
pub struct S3StoreConfig {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services; forces path-style addressing
    pub endpoint: Option<String>,
}

/// S3 bucket exposed as a [`RemoteStore`]
#[derive(Clone)]
pub struct S3Store {
    client: AwsS3Client,
    bucket: String,
}

impl S3Store {
    /// Create a store using the default AWS credential chain
    pub async fn new(config: S3StoreConfig) -> BackendResult<Self> {
        if config.bucket.is_empty() {
            return Err(BackendError::InvalidConfig {
                backend: "s3".to_string(),
                message: "bucket name is empty".to_string(),
            });
        }

        let region_provider = match &config.region {
            Some(region) => RegionProviderChain::first_try(Region::new(region.clone())),
            None => RegionProviderChain::default_provider().or_else("us-east-1"),
        };
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: AwsS3Client::from_conf(builder.build()),
            bucket: config.bucket,
        })
    }
}

fn sdk_error<E, R>(key: &str, err: SdkError<E, R>) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            BackendError::Network {
                message,
                source: None,
            }
        }
        _ => BackendError::classify("s3", key, message),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl RemoteStore for S3Store {
    #[tracing::instrument(skip(self, request), fields(backend = "s3", bucket = %self.bucket))]
    async fn list_page(
        &self,
        request: &ListRequest,
        token: Option<&str>,
    ) -> BackendResult<ListPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(request.page_size.clamp(1, 1000) as i32);
        if let Some(prefix) = &request.prefix {
            req = req.prefix(prefix);
        }
        if let Some(t) = token {
            req = req.continuation_token(t);
        }

        let response = req
            .send()
            .await
            .map_err(|e| sdk_error(request.prefix.as_deref().unwrap_or(""), e))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?;
                let mut listed = ListedObject::new(key, obj.size().unwrap_or(0).max(0) as u64);
                listed.last_modified = obj.last_modified().and_then(to_chrono);
                listed.etag = obj.e_tag().map(|s| s.trim_matches('"').to_string());
                Some(listed)
            })
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    #[tracing::instrument(skip(self), fields(backend = "s3", bucket = %self.bucket))]
    async fn fetch_range(&self, key: &str, range: Option<ByteRange>) -> BackendResult<ReadStream> {
        let mut req = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(r) = range {
            req = req.range(r.http_header());
        }

        let output = req.send().await.map_err(|e| sdk_error(key, e))?;
        let reader = output.body.into_async_read();
        Ok(Box::pin(ReaderStream::new(reader)))
    }

    fn backend_name(&self) -> &str {
        "s3"
    }
}
