//! Blob storage for uploaded and derived image files.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Keys are flat file names: `[A-Za-z0-9._-]`, not starting with a dot
/// Suffix of in-flight writes; never a valid key
pub const PARTIAL_SUFFIX: &str = ".partial";

pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= 255
        && !key.starts_with('.')
        && !key.ends_with(PARTIAL_SUFFIX)
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Storage key for a new blob: `<id>.<ext>`
pub fn object_key(id: uuid::Uuid, extension: &str) -> String {
    format!("{}.{}", id, extension)
}

/// Content type served for a key, from its extension
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}
