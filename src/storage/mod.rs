//! Object storage for property images.
//!
//! Images are written once under a unique key and served directly from the
//! bucket, so the store only needs `put` and a way to build a public URL.

mod memory;
mod s3;

pub use memory::{MemoryStore, StoredObject};
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{StorageBackend, StorageConfig};

/// Content type used when neither the upload nor the filename names an image type
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, tagged as publicly readable.
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str)
        -> Result<(), StorageError>;

    /// Direct URL for a stored key.
    fn public_url(&self, key: &str) -> String;
}

/// Build the configured store.
pub async fn from_config(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::S3 => {
            info!(bucket = %config.bucket, region = %config.region, "Using S3 object storage");
            Arc::new(S3Store::from_config(config).await)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory object storage; uploaded images are lost on restart");
            Arc::new(MemoryStore::new(&config.bucket))
        }
    }
}

/// Storage key for the `index`-th image of an upload made at `timestamp_ms`.
///
/// The key embeds the original filename, the upload time and the ordinal, so
/// keys are unique across properties as well as within one upload.
pub fn image_key(filename: &str, timestamp_ms: i64, index: usize) -> String {
    format!("{}-{}-{}", sanitize_filename(filename), timestamp_ms, index)
}

/// Reduce a client-supplied filename to a URL-safe basename.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Pick a content type: the declared one if it is an image, else a guess
/// from the filename, else JPEG.
pub fn content_type_for(filename: &str, declared: Option<&str>) -> String {
    if let Some(declared) = declared.filter(|ct| ct.starts_with("image/")) {
        return declared.to_string();
    }

    mime_guess::from_path(filename)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
