//! Error types for r2kit-core

use crate::request::Operation;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for r2kit-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for r2kit-core
#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration field is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// A bucket name or object key the REST API cannot address
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Outbound call failed or returned a non-success status
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Presigned URL generation failed
    #[error("Presign error: {0}")]
    Presign(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The transport failure behind this error, if any
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Error::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the remote end answered 404
    pub fn is_not_found(&self) -> bool {
        self.as_transport().is_some_and(TransportError::is_not_found)
    }
}

/// A failed outbound call, with enough context to tell which one.
///
/// `status` is `None` when no response was received (connect failure,
/// timeout, broken body stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub operation: Operation,
    pub resource: String,
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(
        operation: Operation,
        resource: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            resource: resource.into(),
            status,
            message: message.into(),
        }
    }

    /// Wrap a reqwest failure that happened before or while reading a response
    pub fn network(operation: Operation, resource: impl Into<String>, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "operation timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        Self::new(operation, resource, err.status().map(|s| s.as_u16()), message)
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} {} failed: HTTP {}: {}",
                self.operation, self.resource, status, self.message
            ),
            None => write!(f, "{} {} failed: {}", self.operation, self.resource, self.message),
        }
    }
}

impl std::error::Error for TransportError {}

// Generic SdkError conversion for presigning
impl<E> From<aws_sdk_s3::error::SdkError<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: aws_sdk_s3::error::SdkError<E>) -> Self {
        Error::Presign(aws_sdk_s3::error::DisplayErrorContext(&err).to_string())
    }
}

impl From<aws_sdk_s3::presigning::PresigningConfigError> for Error {
    fn from(err: aws_sdk_s3::presigning::PresigningConfigError) -> Self {
        Error::Presign(err.to_string())
    }
}
