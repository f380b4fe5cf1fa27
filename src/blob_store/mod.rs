/// Blob Storage
///
/// Remote object storage for uploaded attachments, plus the local vault used
/// for local mode and fallback writes.

pub mod memory;
pub mod s3;
pub mod vault;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;
pub use vault::{Vault, VaultAdapter};

use crate::error::UploadResult;
use async_trait::async_trait;

/// Remote blob store
///
/// Keys are full object keys (`folder/<digest>.<ext>`). Writing the same key
/// twice is an idempotent overwrite.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key` and return the public URL
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> UploadResult<String>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> UploadResult<bool>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> UploadResult<()>;

    /// Public URL an object would have, without contacting the store
    fn url_for(&self, key: &str) -> String;
}
