//! Storage backend abstraction: one trait, two interchangeable
//! implementations. An object-storage bucket addressed by key, and a relay
//! that forwards blobs through the chat platform and keeps the resulting
//! message reference.

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::BoxStream;

use crate::error::AppError;
use crate::models::StorageType;

pub mod object;
pub mod relay;
pub mod router;

/// What a backend hands back after persisting a blob.
#[derive(Debug, Clone)]
pub struct StoredRef {
    /// Backend-specific identifier: object key or relay attachment id. Only
    /// interpretable together with the backend that produced it.
    pub blob_ref: String,
    /// Relay message carrying the blob; 0 for the object backend.
    pub relay_message_id: i64,
}

/// Bytes coming back out of a backend.
pub enum BlobPayload {
    /// Object reads are buffered; blobs are bounded by the upload limit.
    Buffered(Vec<u8>),
    /// Relay reads stream straight through without touching disk.
    Stream(BoxStream<'static, Result<Bytes, reqwest::Error>>),
}

pub struct FetchedBlob {
    pub payload: BlobPayload,
    pub content_type: Option<String>,
}

impl BlobPayload {
    /// Collect the payload into memory. Test and bot-upload convenience.
    pub async fn into_bytes(self) -> Result<Vec<u8>, AppError> {
        use futures_util::StreamExt;
        match self {
            BlobPayload::Buffered(bytes) => Ok(bytes),
            BlobPayload::Stream(mut stream) => {
                let mut out = Vec::new();
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
                Ok(out)
            }
        }
    }
}

/// Core storage capability both backends implement. Backend-specific
/// operations (object copy for renames, relay path re-resolution) stay on
/// the concrete types.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist a blob under `key`. The relay backend ignores the key; its
    /// reference is assigned by the platform.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        file_name: &str,
    ) -> Result<StoredRef, AppError>;

    /// Retrieve a blob by its backend reference. `Ok(None)` is a miss, not
    /// an error.
    async fn fetch(&self, blob_ref: &str) -> Result<Option<FetchedBlob>, AppError>;

    /// Remove a blob. Best-effort; a missing blob is not an error.
    async fn delete(&self, blob_ref: &str, relay_message_id: i64) -> Result<(), AppError>;

    fn storage_type(&self) -> StorageType;
}
