//! The object storage surface shared by the REST client and its decorators

use crate::cloudflare::{R2Bucket, R2Object};
use crate::error::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::fmt;

/// Upper bound on the buffer reserved up front from `Content-Length`
const MAX_PREALLOCATE: usize = 8 * 1024 * 1024;

/// Streamed body of a downloaded object
pub struct ObjectStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

impl ObjectStream {
    /// Read the whole body into memory
    pub async fn bytes(self) -> Result<Bytes> {
        // The header is only a hint; the buffer grows past it as chunks arrive
        let capacity = self
            .content_length
            .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX).min(MAX_PREALLOCATE));
        let buffer = self
            .stream
            .try_fold(BytesMut::with_capacity(capacity), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await?;
        Ok(buffer.freeze())
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Object metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// User metadata (`x-amz-meta-*` headers, prefix stripped)
    pub custom: HashMap<String, String>,
}

/// Object and bucket operations against R2.
///
/// Every method is a single awaitable outbound call (or, for `copy_object`
/// and `move_object`, a fixed sequence of them). Nothing is retried.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body` and return the object's URL
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String>;

    async fn download_object(&self, bucket: &str, key: &str) -> Result<ObjectStream>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<R2Object>>;

    async fn object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()>;

    /// Copy, then delete the source.
    ///
    /// Not atomic. If the copy succeeds and the delete fails, both objects
    /// exist afterwards and the delete's error is returned. No rollback is
    /// attempted.
    async fn move_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        self.copy_object(source_bucket, source_key, dest_bucket, dest_key)
            .await?;
        self.delete_object(source_bucket, source_key).await
    }

    async fn list_buckets(&self) -> Result<Vec<R2Bucket>>;

    async fn bucket_info(&self, bucket: &str) -> Result<R2Bucket>;

    async fn create_bucket(&self, bucket: &str, location_hint: Option<&str>) -> Result<R2Bucket>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, TransportError};
    use crate::request::Operation;

    #[tokio::test]
    async fn test_object_stream_collects_chunks() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let body = ObjectStream {
            content_type: Some("text/plain".to_string()),
            content_length: Some(11),
            stream: Box::pin(futures::stream::iter(chunks)),
        };

        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_object_stream_ignores_oversized_length_hint() {
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"tiny"))];
        let body = ObjectStream {
            content_type: None,
            content_length: Some(u64::MAX),
            stream: Box::pin(futures::stream::iter(chunks)),
        };

        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"tiny"));
    }

    #[tokio::test]
    async fn test_object_stream_propagates_errors() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::new(Operation::Download, "b/k", None, "connection reset").into()),
        ];
        let body = ObjectStream {
            content_type: None,
            content_length: None,
            stream: Box::pin(futures::stream::iter(chunks)),
        };

        assert!(matches!(body.bytes().await, Err(Error::Transport(_))));
    }
}
