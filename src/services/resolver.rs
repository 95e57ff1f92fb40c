//! Retrieval-resolution chain: given a requested path, find and return the
//! bytes regardless of which backend stored them. Lookup strategies run in a
//! fixed order, each tried only when the previous one missed.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::Database;
use crate::error::AppError;
use crate::models::{FileRecord, StorageType};
use crate::storage::router::StorageRouter;
use crate::storage::{BlobPayload, FetchedBlob, StorageBackend};

/// Immutable once written, so bytes served straight from the object backend
/// can be cached aggressively. Relay bytes get no such promise.
const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

pub enum Resolved {
    Bytes {
        payload: BlobPayload,
        content_type: String,
        cache_control: Option<&'static str>,
        inline: bool,
        file_name: Option<String>,
    },
    Redirect(String),
    NotFound,
}

#[derive(Clone)]
pub struct RetrievalResolver {
    db: Database,
    storage: Arc<StorageRouter>,
}

impl RetrievalResolver {
    pub fn new(db: Database, storage: Arc<StorageRouter>) -> Self {
        Self { db, storage }
    }

    pub async fn resolve(&self, raw_path: &str) -> Result<Resolved, AppError> {
        let decoded = urlencoding::decode(raw_path)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw_path.to_string());
        let path = decoded.trim_start_matches('/').to_string();
        if path.is_empty() {
            return Ok(Resolved::NotFound);
        }

        // 1. The common case: the locator's path segment is the object key.
        if let Some(object) = self.storage.object_backend() {
            match object.fetch(&path).await {
                Ok(Some(blob)) => {
                    debug!("resolved {} via direct object lookup", path);
                    return Ok(bytes_response(blob, None, &path, Some(IMMUTABLE_CACHE)));
                }
                Ok(None) => {}
                Err(e) => warn!("direct object lookup failed for {}: {}", path, e),
            }
        }

        // 2-4. Metadata lookups, narrowest first.
        let record = self.lookup_record(&path).await?;

        if let Some(record) = record {
            // 5. Dispatch by the backend that stored the blob.
            match record.storage_type {
                StorageType::Object => {
                    if let Some(object) = self.storage.object_backend() {
                        match object.fetch(&record.blob_ref).await {
                            Ok(Some(blob)) => {
                                return Ok(bytes_response(
                                    blob,
                                    Some(&record),
                                    &path,
                                    Some(IMMUTABLE_CACHE),
                                ));
                            }
                            Ok(None) => {
                                warn!("object blob {} missing for {}", record.blob_ref, record.url)
                            }
                            Err(e) => warn!("object fetch failed for {}: {}", record.blob_ref, e),
                        }
                    }
                }
                StorageType::Relay => {
                    match self.storage.relay_backend().fetch(&record.blob_ref).await {
                        Ok(Some(blob)) => {
                            return Ok(bytes_response(blob, Some(&record), &path, None));
                        }
                        Ok(None) => {
                            warn!("relay blob {} missing for {}", record.blob_ref, record.url)
                        }
                        Err(e) => warn!("relay fetch failed for {}: {}", record.blob_ref, e),
                    }
                }
            }

            // 6. Bytes are unreachable under the requested path, but the
            // record knows a different canonical locator.
            let requested_url = self.storage.url_for(&path);
            if record.url != requested_url {
                return Ok(Resolved::Redirect(record.url));
            }
        }

        Ok(Resolved::NotFound)
    }

    async fn lookup_record(&self, path: &str) -> Result<Option<FileRecord>, AppError> {
        if let Some(record) = self.db.find_file_by_url(&self.storage.url_for(path)).await? {
            return Ok(Some(record));
        }
        if let Some(record) = self.db.find_file_by_blob_ref(path).await? {
            return Ok(Some(record));
        }
        let last_segment = path.rsplit('/').next().unwrap_or(path);
        self.db.find_file_by_file_name(last_segment).await
    }
}

fn bytes_response(
    blob: FetchedBlob,
    record: Option<&FileRecord>,
    path: &str,
    cache_control: Option<&'static str>,
) -> Resolved {
    let content_type = record
        .map(|r| r.mime_type.clone())
        .filter(|mt| !mt.is_empty())
        .or(blob.content_type)
        .unwrap_or_else(|| {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string()
        });

    let inline = content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type.starts_with("audio/");

    Resolved::Bytes {
        payload: blob.payload,
        content_type,
        cache_control,
        inline,
        file_name: record.map(|r| r.file_name.clone()),
    }
}
