//! R2 client over the Cloudflare REST API (bearer token)

use crate::cloudflare::{
    ensure_success, read_envelope, BucketList, CreateBucketParams, R2Bucket, R2Object,
};
use crate::config::R2Options;
use crate::error::{Error, Result, TransportError};
use crate::presigned::{PresignedMethod, PresignedUrl, Presigner};
use crate::request::{ObjectRequest, Operation};
use crate::store::{ObjectMetadata, ObjectStore, ObjectStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Content type used when the source of a copy does not report one
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Prefix of user metadata headers
const META_PREFIX: &str = "x-amz-meta-";

/// R2 client bound to a logical name and a shared configuration.
///
/// Holds no per-call state: any number of operations may run on one
/// instance concurrently. The `reqwest::Client` is a pooled handle and is
/// expected to be shared between instances.
#[derive(Clone)]
pub struct R2Client {
    name: String,
    options: Arc<R2Options>,
    base_url: Url,
    http_client: Client,
    presigner: Presigner,
}

impl R2Client {
    /// Create a new R2 client
    pub fn new(name: impl Into<String>, options: Arc<R2Options>, http_client: Client) -> Result<Self> {
        let base_url = options.base_url()?;
        Ok(Self::with_base_url(name, options, base_url, http_client))
    }

    /// Construct from an already parsed `api_base_uri`
    pub(crate) fn with_base_url(
        name: impl Into<String>,
        options: Arc<R2Options>,
        base_url: Url,
        http_client: Client,
    ) -> Self {
        let presigner = Presigner::new(&options);

        Self {
            name: name.into(),
            options,
            base_url,
            http_client,
            presigner,
        }
    }

    /// Logical name this client was created for
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &R2Options {
        &self.options
    }

    /// `{base}/{account}/r2/buckets/{segments...}`, each segment percent-encoded.
    ///
    /// Empty, `.` and `..` segments are refused: URL normalization would drop
    /// them and the request would reach a different resource.
    fn buckets_url(&self, segments: &[&str]) -> Result<Url> {
        if let Some(segment) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(Error::InvalidInput(format!(
                "'{}' cannot be used as a bucket name or object key",
                segment
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("api_base_uri '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(&self.options.account_id)
            .push("r2")
            .push("buckets")
            .extend(segments);
        Ok(url)
    }

    /// REST URL of one object
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        self.buckets_url(&[bucket, "objects", key])
    }

    fn authorized(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.options.api_token))
    }

    async fn execute(&self, builder: RequestBuilder, operation: Operation, resource: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::network(operation, resource, e))?;
        Ok(ensure_success(response, operation, resource).await?)
    }

    /// Send one object request and fail on anything but 2xx
    async fn send(&self, request: ObjectRequest) -> Result<Response> {
        let resource = request.resource();
        let url = self.object_url(&request.bucket, &request.key)?;

        let mut builder = self.authorized(request.method.clone(), url);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        self.execute(builder, request.operation, &resource).await
    }

    /// Generate a presigned URL for one object with the configured expiry
    pub async fn presign(
        &self,
        method: PresignedMethod,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<PresignedUrl> {
        self.presigner.presign(method, bucket, key, content_type).await
    }
}

impl fmt::Debug for R2Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Client")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("account_id", &self.options.account_id)
            .finish_non_exhaustive()
    }
}

fn header_str(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn custom_metadata(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(META_PREFIX)?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String> {
        let url = self.object_url(bucket, key)?;
        self.send(ObjectRequest::upload(bucket, key, body, content_type))
            .await?;
        Ok(url.to_string())
    }

    async fn download_object(&self, bucket: &str, key: &str) -> Result<ObjectStream> {
        let request = ObjectRequest::new(Operation::Download, bucket, key);
        let resource = request.resource();
        let response = self.send(request).await?;

        let content_type = header_str(response.headers(), CONTENT_TYPE);
        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(move |e| Error::from(TransportError::network(Operation::Download, resource.as_str(), e)));

        Ok(ObjectStream {
            content_type,
            content_length,
            stream: Box::pin(stream),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.send(ObjectRequest::new(Operation::Delete, bucket, key))
            .await?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<R2Object>> {
        let url = self.buckets_url(&[bucket, "objects"])?;
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(prefix) = prefix {
                query.push(("prefix", prefix));
            }
            if let Some(cursor) = cursor.as_deref() {
                query.push(("cursor", cursor));
            }

            let builder = self.authorized(Method::GET, url.clone()).query(&query);
            let response = self.execute(builder, Operation::ListObjects, bucket).await?;
            let (page, info): (Vec<R2Object>, _) =
                read_envelope(response, Operation::ListObjects, bucket).await?;
            objects.extend(page);

            // Stop when the server hands back the cursor it was just given
            match info {
                Some(info) if info.is_truncated && info.cursor.is_some() && info.cursor != cursor => {
                    cursor = info.cursor
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let response = self
            .send(ObjectRequest::new(Operation::ObjectMetadata, bucket, key))
            .await?;
        let headers = response.headers();

        Ok(ObjectMetadata {
            key: key.to_string(),
            size: header_str(headers, CONTENT_LENGTH)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            content_type: header_str(headers, CONTENT_TYPE),
            etag: header_str(headers, ETAG),
            last_modified: header_str(headers, LAST_MODIFIED),
            custom: custom_metadata(headers),
        })
    }

    /// The REST API has no server-side copy: the source is read and
    /// re-uploaded with its content type.
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        let read = ObjectRequest::new(Operation::Copy, source_bucket, source_key);
        let resource = read.resource();
        let source = self.send(read).await?;

        let content_type = header_str(source.headers(), CONTENT_TYPE)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let body = source
            .bytes()
            .await
            .map_err(|e| TransportError::network(Operation::Copy, resource, e))?;

        let write = ObjectRequest::new(Operation::Copy, dest_bucket, dest_key)
            .with_method(Method::PUT)
            .with_body(body)
            .with_content_type(&content_type);
        self.send(write).await?;

        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<R2Bucket>> {
        let account = self.options.account_id.as_str();
        let builder = self.authorized(Method::GET, self.buckets_url(&[])?);
        let response = self.execute(builder, Operation::ListBuckets, account).await?;
        let (list, _): (BucketList, _) = read_envelope(response, Operation::ListBuckets, account).await?;
        Ok(list.buckets)
    }

    async fn bucket_info(&self, bucket: &str) -> Result<R2Bucket> {
        let builder = self.authorized(Method::GET, self.buckets_url(&[bucket])?);
        let response = self.execute(builder, Operation::BucketInfo, bucket).await?;
        let (info, _) = read_envelope(response, Operation::BucketInfo, bucket).await?;
        Ok(info)
    }

    async fn create_bucket(&self, bucket: &str, location_hint: Option<&str>) -> Result<R2Bucket> {
        let params = CreateBucketParams {
            name: bucket,
            location_hint,
        };
        let builder = self
            .authorized(Method::POST, self.buckets_url(&[])?)
            .json(&params);
        let response = self.execute(builder, Operation::CreateBucket, bucket).await?;
        let (created, _) = read_envelope(response, Operation::CreateBucket, bucket).await?;
        Ok(created)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let builder = self.authorized(Method::DELETE, self.buckets_url(&[bucket])?);
        self.execute(builder, Operation::DeleteBucket, bucket).await?;
        Ok(())
    }
}
