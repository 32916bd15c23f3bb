//! Structured logging around any `ObjectStore`

use crate::cloudflare::{R2Bucket, R2Object};
use crate::error::{Error, Result};
use crate::request::Operation;
use crate::store::{ObjectMetadata, ObjectStore, ObjectStream};
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Deref;
use tracing::{error, info};

/// Logs the start, success and failure of every operation of the wrapped
/// store. Errors pass through unchanged.
#[derive(Debug, Clone)]
pub struct Logged<S> {
    label: String,
    inner: S,
}

impl<S> Logged<S> {
    pub fn new(label: impl Into<String>, inner: S) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn failed(&self, operation: Operation, resource: &str, err: &Error) {
        let status = err.as_transport().and_then(|e| e.status());
        error!(
            client = %self.label,
            operation = %operation,
            resource,
            status,
            error = %err,
            "R2 operation failed"
        );
    }

    fn logged<T>(&self, operation: Operation, resource: &str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => info!(client = %self.label, operation = %operation, resource, "R2 operation succeeded"),
            Err(err) => self.failed(operation, resource, err),
        }
        result
    }
}

impl<S> Deref for Logged<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for Logged<S> {
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String> {
        let resource = format!("{}/{}", bucket, key);
        info!(client = %self.label, resource = %resource, size = body.len(), content_type, "Uploading object");
        let result = self.inner.upload_object(bucket, key, body, content_type).await;
        self.logged(Operation::Upload, &resource, result)
    }

    async fn download_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        let resource = format!("{}/{}", bucket, key);
        info!(client = %self.label, resource = %resource, "Downloading object");
        let result = self.inner.download_object(bucket, key).await;
        self.logged(Operation::Download, &resource, result)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let resource = format!("{}/{}", bucket, key);
        info!(client = %self.label, resource = %resource, "Deleting object");
        let result = self.inner.delete_object(bucket, key).await;
        self.logged(Operation::Delete, &resource, result)
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<R2Object>> {
        info!(client = %self.label, bucket, prefix, "Listing objects");
        let result = self.inner.list_objects(bucket, prefix).await;
        if let Ok(objects) = &result {
            info!(client = %self.label, bucket, count = objects.len(), "Listed objects");
        }
        self.logged(Operation::ListObjects, bucket, result)
    }

    async fn object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let resource = format!("{}/{}", bucket, key);
        info!(client = %self.label, resource = %resource, "Getting object metadata");
        let result = self.inner.object_metadata(bucket, key).await;
        self.logged(Operation::ObjectMetadata, &resource, result)
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        let resource = format!("{}/{} -> {}/{}", source_bucket, source_key, dest_bucket, dest_key);
        info!(client = %self.label, resource = %resource, "Copying object");
        let result = self
            .inner
            .copy_object(source_bucket, source_key, dest_bucket, dest_key)
            .await;
        self.logged(Operation::Copy, &resource, result)
    }

    async fn move_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        let resource = format!("{}/{} -> {}/{}", source_bucket, source_key, dest_bucket, dest_key);
        info!(client = %self.label, resource = %resource, "Moving object");
        let result = self
            .inner
            .move_object(source_bucket, source_key, dest_bucket, dest_key)
            .await;
        self.logged(Operation::Move, &resource, result)
    }

    async fn list_buckets(&self) -> Result<Vec<R2Bucket>> {
        info!(client = %self.label, "Listing buckets");
        let result = self.inner.list_buckets().await;
        self.logged(Operation::ListBuckets, "buckets", result)
    }

    async fn bucket_info(&self, bucket: &str) -> Result<R2Bucket> {
        info!(client = %self.label, bucket, "Getting bucket info");
        let result = self.inner.bucket_info(bucket).await;
        self.logged(Operation::BucketInfo, bucket, result)
    }

    async fn create_bucket(&self, bucket: &str, location_hint: Option<&str>) -> Result<R2Bucket> {
        info!(client = %self.label, bucket, location_hint, "Creating bucket");
        let result = self.inner.create_bucket(bucket, location_hint).await;
        self.logged(Operation::CreateBucket, bucket, result)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        info!(client = %self.label, bucket, "Deleting bucket");
        let result = self.inner.delete_bucket(bucket).await;
        self.logged(Operation::DeleteBucket, bucket, result)
    }
}
