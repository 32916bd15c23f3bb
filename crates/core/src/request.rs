//! Per-call request description

use bytes::Bytes;
use reqwest::Method;
use std::fmt;

/// Every outbound operation the client performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    Download,
    Delete,
    ListObjects,
    ObjectMetadata,
    Copy,
    Move,
    ListBuckets,
    BucketInfo,
    CreateBucket,
    DeleteBucket,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Download => "download",
            Operation::Delete => "delete",
            Operation::ListObjects => "list objects",
            Operation::ObjectMetadata => "object metadata",
            Operation::Copy => "copy",
            Operation::Move => "move",
            Operation::ListBuckets => "list buckets",
            Operation::BucketInfo => "bucket info",
            Operation::CreateBucket => "create bucket",
            Operation::DeleteBucket => "delete bucket",
        }
    }

    /// HTTP method used for the single call behind this operation.
    ///
    /// `Copy` and `Move` are composites and report the method of their
    /// first step.
    pub fn method(&self) -> Method {
        match self {
            Operation::Upload => Method::PUT,
            Operation::Download
            | Operation::ListObjects
            | Operation::ListBuckets
            | Operation::BucketInfo
            | Operation::Copy
            | Operation::Move => Method::GET,
            Operation::ObjectMetadata => Method::HEAD,
            Operation::Delete | Operation::DeleteBucket => Method::DELETE,
            Operation::CreateBucket => Method::POST,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One object call: built, sent, then dropped once the response is consumed
#[derive(Debug, Clone)]
pub struct ObjectRequest {
    pub operation: Operation,
    pub method: Method,
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub body: Option<Bytes>,
}

impl ObjectRequest {
    pub fn new(operation: Operation, bucket: &str, key: &str) -> Self {
        Self {
            operation,
            method: operation.method(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: None,
            body: None,
        }
    }

    pub fn upload(bucket: &str, key: &str, body: Bytes, content_type: &str) -> Self {
        Self::new(Operation::Upload, bucket, key)
            .with_body(body)
            .with_content_type(content_type)
    }

    /// Override the verb, for composite operations whose steps differ
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// `bucket/key`, used as the resource in errors and logs
    pub fn resource(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}
