//! Cloudflare API wire types for R2

use crate::error::TransportError;
use crate::request::Operation;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cloudflare API response wrapper
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<CloudflareMessage>,
    pub result: Option<T>,
    pub result_info: Option<ResultInfo>,
}

/// Cloudflare error or informational message
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareMessage {
    #[allow(dead_code)]
    #[serde(default)]
    pub code: i32,
    pub message: String,
}

/// Pagination details on list responses
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ResultInfo {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub is_truncated: bool,
}

fn join_errors(errors: &[CloudflareMessage]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turn a non-success response into a `TransportError`, keeping the
/// envelope's error messages when the body has them.
pub(crate) async fn ensure_success(
    response: Response,
    operation: Operation,
    resource: &str,
) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<CloudflareResponse<serde_json::Value>>(&body) {
        Ok(envelope) if !envelope.errors.is_empty() => join_errors(&envelope.errors),
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        _ => body,
    };

    Err(TransportError::new(operation, resource, Some(status.as_u16()), message))
}

/// Decode a Cloudflare envelope, failing on `success: false`
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    response: Response,
    operation: Operation,
    resource: &str,
) -> Result<(T, Option<ResultInfo>), TransportError> {
    let response = ensure_success(response, operation, resource).await?;
    let status = response.status().as_u16();

    let envelope: CloudflareResponse<T> = response
        .json()
        .await
        .map_err(|e| TransportError::new(operation, resource, Some(status), format!("invalid response body: {}", e)))?;

    if !envelope.success {
        return Err(TransportError::new(
            operation,
            resource,
            Some(status),
            join_errors(&envelope.errors),
        ));
    }

    let result = envelope.result.ok_or_else(|| {
        TransportError::new(operation, resource, Some(status), "response has no result")
    })?;

    Ok((result, envelope.result_info))
}

/// R2 Bucket information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct R2Bucket {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BucketList {
    #[serde(default)]
    pub buckets: Vec<R2Bucket>,
}

/// Body of a create-bucket call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateBucketParams<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<&'a str>,
}

/// Object entry from a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct R2Object {
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub http_metadata: Option<HttpMetadata>,
    #[serde(default)]
    pub custom_metadata: HashMap<String, String>,
}

impl R2Object {
    pub fn content_type(&self) -> Option<&str> {
        self.http_metadata
            .as_ref()
            .and_then(|m| m.content_type.as_deref())
    }
}

/// HTTP metadata stored alongside an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMetadata {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub cache_control: Option<String>,
}
