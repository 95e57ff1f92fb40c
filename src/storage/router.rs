//! Decides where a blob goes on upload, owns the canonical-locator naming
//! scheme, and falls back from the object backend to the relay when the
//! bucket write fails. Performs storage side effects only; metadata rows
//! are written by the upload handlers.

use std::sync::Arc;

use chrono::Utc;
use rand::RngExt;
use tracing::warn;

use super::object::ObjectBackend;
use super::relay::RelayBackend;
use super::StorageBackend;
use crate::db::Database;
use crate::error::AppError;
use crate::models::{FileRecord, StorageType};

pub struct StorageRouter {
    object: Option<Arc<ObjectBackend>>,
    relay: Arc<RelayBackend>,
    public_base_url: String,
    default_storage: StorageType,
}

pub struct StoreRequest<'a> {
    pub data: &'a [u8],
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub uploader_chat_id: i64,
    /// Explicit per-request override; `None` falls through to the deployment
    /// default.
    pub storage_type: Option<StorageType>,
    /// Replaces the timestamp component of the locator. Repeated uploads
    /// with the same suffix overwrite each other; that is documented
    /// behavior, not a defect.
    pub custom_suffix: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub url: String,
    pub blob_ref: String,
    pub storage_type: StorageType,
    pub relay_message_id: i64,
}

impl StorageRouter {
    pub fn new(
        object: Option<Arc<ObjectBackend>>,
        relay: Arc<RelayBackend>,
        public_base_url: &str,
        default_storage: StorageType,
    ) -> Self {
        Self {
            object,
            relay,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            default_storage,
        }
    }

    pub fn object_backend(&self) -> Option<&ObjectBackend> {
        self.object.as_deref()
    }

    pub fn relay_backend(&self) -> &RelayBackend {
        &self.relay
    }

    pub fn default_storage(&self) -> StorageType {
        self.default_storage
    }

    /// Canonical public locator for a generated key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Persist a blob and return its locator plus backend reference. The
    /// database handle is used read-only, to probe generated locators for
    /// collisions.
    pub async fn store(
        &self,
        request: StoreRequest<'_>,
        db: &Database,
    ) -> Result<StoredBlob, AppError> {
        let extension = extension_for(request.file_name, request.mime_type);

        let key = match request.custom_suffix {
            Some(suffix) => {
                if !is_valid_suffix(suffix) {
                    return Err(AppError::Validation(format!(
                        "invalid suffix: {}",
                        suffix
                    )));
                }
                format!("{}.{}", suffix, extension)
            }
            None => {
                let mut key = format!("{}.{}", Utc::now().timestamp_millis(), extension);
                // Millisecond timestamps can collide under rapid concurrent
                // uploads; a detected clash gets a random tail.
                while db.find_file_by_url(&self.url_for(&key)).await?.is_some() {
                    key = format!(
                        "{}-{}.{}",
                        Utc::now().timestamp_millis(),
                        random_tail(4),
                        extension
                    );
                }
                key
            }
        };

        let requested = request.storage_type.unwrap_or(self.default_storage);

        if requested == StorageType::Object {
            match &self.object {
                Some(object) => {
                    match object
                        .put(&key, request.data, request.mime_type, request.file_name)
                        .await
                    {
                        Ok(stored) => {
                            return Ok(StoredBlob {
                                url: self.url_for(&key),
                                blob_ref: stored.blob_ref,
                                storage_type: StorageType::Object,
                                relay_message_id: 0,
                            });
                        }
                        Err(e) => {
                            warn!(
                                "object backend store failed for {}, falling back to relay: {}",
                                key, e
                            );
                        }
                    }
                }
                None => {
                    warn!("object backend not configured, storing {} via relay", key);
                }
            }
        }

        let stored = self
            .relay
            .put(&key, request.data, request.mime_type, request.file_name)
            .await?;

        Ok(StoredBlob {
            url: self.url_for(&key),
            blob_ref: stored.blob_ref,
            storage_type: StorageType::Relay,
            relay_message_id: stored.relay_message_id,
        })
    }

    /// Move a record to a suffix-based locator. Returns the new (url,
    /// blob_ref) pair. Object blobs are copied to the new key and the old
    /// key deleted; relay references are not renamable, so only the locator
    /// changes.
    pub async fn rename(
        &self,
        record: &FileRecord,
        suffix: &str,
    ) -> Result<(String, String), AppError> {
        if !is_valid_suffix(suffix) {
            return Err(AppError::Validation(format!("invalid suffix: {}", suffix)));
        }

        let extension = extension_of_locator(&record.url)
            .map(str::to_string)
            .unwrap_or_else(|| extension_for(&record.file_name, &record.mime_type));
        let new_key = format!("{}.{}", suffix, extension);
        let new_url = self.url_for(&new_key);

        match record.storage_type {
            StorageType::Object => {
                let object = self.object.as_ref().ok_or_else(|| {
                    AppError::Configuration("object backend not configured".to_string())
                })?;
                object.copy(&record.blob_ref, &new_key).await?;
                object.delete(&record.blob_ref, 0).await?;
                Ok((new_url, new_key))
            }
            StorageType::Relay => Ok((new_url, record.blob_ref.clone())),
        }
    }

    /// Remove the blob behind a record, dispatched by its backend.
    pub async fn delete_blob(&self, record: &FileRecord) -> Result<(), AppError> {
        match record.storage_type {
            StorageType::Object => match &self.object {
                Some(object) => object.delete(&record.blob_ref, 0).await,
                None => Ok(()),
            },
            StorageType::Relay => {
                self.relay
                    .delete(&record.blob_ref, record.relay_message_id)
                    .await
            }
        }
    }
}

/// Extension for a generated locator: the original filename wins, the
/// declared MIME type fills in, `bin` is the last resort.
pub fn extension_for(file_name: &str, mime_type: &str) -> String {
    if let Some(ext) = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
    {
        if !ext.is_empty() {
            return ext.to_ascii_lowercase();
        }
    }

    if let Some(extensions) = mime_guess::get_mime_extensions_str(mime_type) {
        if let Some(first) = extensions.first() {
            return (*first).to_string();
        }
    }

    "bin".to_string()
}

/// Extension of an existing locator's final path segment.
pub fn extension_of_locator(url: &str) -> Option<&str> {
    let segment = url.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

pub fn is_valid_suffix(suffix: &str) -> bool {
    !suffix.is_empty()
        && suffix.len() <= 64
        && suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn random_tail(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
