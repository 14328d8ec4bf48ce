//! Storage backend abstraction for gallery images.
//!
//! Supports multiple backends:
//! - `local`: Local filesystem storage, served back through `/uploads/{key}`
//! - `s3`: S3-compatible object storage (MinIO, AWS S3, etc.)

pub mod local;
pub mod s3;

use crate::app_config::StorageConfig;
use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed stream of bytes for streaming file content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Represents a retrieved storage object with metadata.
pub struct StorageObject {
    /// Streaming body content
    pub body: ByteStream,
    /// Content length in bytes
    pub content_length: Option<i64>,
    /// MIME content type
    pub content_type: Option<String>,
    /// Entity tag for caching
    pub e_tag: Option<String>,
    /// Content range for partial responses
    pub content_range: Option<String>,
    /// Accept ranges header value
    pub accept_ranges: Option<String>,
    /// Last modified timestamp
    pub last_modified: Option<String>,
}

/// Storage operation errors.
#[derive(Debug)]
pub enum StorageError {
    /// Object not found
    NotFound(String),
    /// I/O error
    Io(std::io::Error),
    /// S3 error
    S3(String),
    /// Invalid range request
    InvalidRange(String),
    /// Key rejected by the backend
    InvalidKey(String),
    /// Backend could not be constructed from configuration
    Config(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::S3(msg) => write!(f, "S3 error: {}", msg),
            StorageError::InvalidRange(msg) => write!(f, "Invalid range: {}", msg),
            StorageError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            StorageError::Config(msg) => write!(f, "Storage configuration error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Trait for storage backends.
///
/// Keys are opaque to the backend; the gallery service generates them.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store an object under `key` with the given content type.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Retrieve an object.
    ///
    /// Optional `range` parameter supports HTTP Range requests for streaming.
    async fn get_object(
        &self,
        key: &str,
        range: Option<String>,
    ) -> Result<StorageObject, StorageError>;

    /// Delete an object. Returns `StorageError::NotFound` when the backend can
    /// tell the object was already gone.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Publicly resolvable URL for `key`.
    fn public_url(&self, key: &str) -> String;
}

/// Build the configured backend.
///
/// `site_base_url` is where this server is reachable; the local backend
/// serves its files from there.
pub fn from_config(
    config: &StorageConfig,
    site_base_url: &str,
) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match config.backend.as_str() {
        "s3" => {
            let storage = s3::S3Storage::from_config(config)?;
            Ok(Arc::new(storage))
        }
        "local" => {
            let pub_url = format!("{}/uploads", site_base_url.trim_end_matches('/'));
            let storage = local::LocalStorage::new(config.local_path.clone().into(), pub_url)?;
            Ok(Arc::new(storage))
        }
        other => Err(StorageError::Config(format!(
            "Unknown storage backend '{}', expected 'local' or 's3'",
            other
        ))),
    }
}
