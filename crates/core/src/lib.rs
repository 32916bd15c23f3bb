//! r2kit-core - Client library for Cloudflare R2
//!
//! Object and bucket operations over the Cloudflare REST API with a bearer
//! token, presigned URL generation over the S3 protocol, and a factory that
//! caches one client per logical name.

pub mod cache;
pub mod client;
pub mod cloudflare;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod presigned;
pub mod request;
pub mod store;

// Re-export commonly used types
pub use cache::{CachePolicy, ClientCache, Eviction};
pub use client::R2Client;
pub use cloudflare::{HttpMetadata, R2Bucket, R2Object};
pub use config::{get_config_path, load_config, load_config_from, save_config_to};
pub use config::{ConfigFile, LoggingConfig, R2Options};
pub use error::{Error, Result, TransportError};
pub use factory::{ClientFactory, SharedClient};
pub use logging::Logged;
pub use presigned::{PresignedMethod, PresignedUrl, Presigner};
pub use request::{ObjectRequest, Operation};
pub use store::{ObjectMetadata, ObjectStore, ObjectStream};
