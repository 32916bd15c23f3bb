//! Presigned URL generation for R2 over the S3 protocol

use crate::config::R2Options;
use crate::error::Result;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    presigning::PresigningConfig,
    Client,
};
use std::time::Duration;

/// HTTP methods for presigned URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignedMethod {
    Get,
    Put,
    Delete,
}

impl PresignedMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PresignedMethod::Get => "GET",
            PresignedMethod::Put => "PUT",
            PresignedMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for PresignedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresignedMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(PresignedMethod::Get),
            "PUT" => Ok(PresignedMethod::Put),
            "DELETE" => Ok(PresignedMethod::Delete),
            other => Err(format!("unsupported presign method '{}'", other)),
        }
    }
}

/// A signed, time-limited URL for one verb on one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub method: PresignedMethod,
    pub url: String,
    pub expires_in: Duration,
}

impl PresignedUrl {
    /// The object URL without the signature query
    pub fn canonical_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

/// Signs S3 requests against the R2 endpoint (path-style, SigV4).
///
/// Presigning is local: no request leaves the process.
#[derive(Debug, Clone)]
pub struct Presigner {
    client: Client,
    expires_in: Duration,
}

impl Presigner {
    pub fn new(options: &R2Options) -> Self {
        let credentials = Credentials::new(
            &options.access_key_id,
            &options.secret_access_key,
            None,
            None,
            "r2kit",
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(options.s3_endpoint())
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            expires_in: options.presigned_url_expiry(),
        }
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    pub async fn presign(
        &self,
        method: PresignedMethod,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<PresignedUrl> {
        let config = PresigningConfig::expires_in(self.expires_in)?;

        let request = match method {
            PresignedMethod::Get => {
                self.client
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .presigned(config)
                    .await?
            }
            PresignedMethod::Put => {
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .set_content_type(content_type.map(str::to_string))
                    .presigned(config)
                    .await?
            }
            PresignedMethod::Delete => {
                self.client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .presigned(config)
                    .await?
            }
        };

        Ok(PresignedUrl {
            method,
            url: request.uri().to_string(),
            expires_in: self.expires_in,
        })
    }
}
