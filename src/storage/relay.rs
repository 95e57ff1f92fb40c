//! Relay storage backend: a blob becomes a message in a fixed storage chat,
//! and the platform-assigned attachment id becomes its reference. That
//! reference only resolves to a transient download path, which expires,
//! so it is re-resolved on every fetch and never cached.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{info, warn};

use super::{BlobPayload, FetchedBlob, StorageBackend, StoredRef};
use crate::bot::api::BotApi;
use crate::error::AppError;
use crate::models::StorageType;

#[derive(Clone)]
pub struct RelayBackend {
    api: Arc<BotApi>,
    storage_chat_id: i64,
}

impl RelayBackend {
    pub fn new(api: Arc<BotApi>, storage_chat_id: i64) -> Self {
        Self {
            api,
            storage_chat_id,
        }
    }
}

#[async_trait]
impl StorageBackend for RelayBackend {
    async fn put(
        &self,
        _key: &str,
        data: &[u8],
        content_type: &str,
        file_name: &str,
    ) -> Result<StoredRef, AppError> {
        let sent = self
            .api
            .send_media(self.storage_chat_id, data.to_vec(), file_name, content_type)
            .await?;

        let blob_ref = sent.attachment_ref().ok_or_else(|| {
            AppError::Upstream("relay response carried no attachment reference".to_string())
        })?;
        if sent.message_id == 0 {
            return Err(AppError::Upstream(
                "relay response carried no message id".to_string(),
            ));
        }

        info!(
            "relayed {} ({} bytes) as message {}",
            file_name,
            data.len(),
            sent.message_id
        );
        Ok(StoredRef {
            blob_ref,
            relay_message_id: sent.message_id,
        })
    }

    async fn fetch(&self, blob_ref: &str) -> Result<Option<FetchedBlob>, AppError> {
        // The transient path is looked up at request time, every time.
        let file_path = self.api.get_file(blob_ref).await?;
        let response = self.api.download(&file_path).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Some(FetchedBlob {
            payload: BlobPayload::Stream(response.bytes_stream().boxed()),
            content_type,
        }))
    }

    async fn delete(&self, blob_ref: &str, relay_message_id: i64) -> Result<(), AppError> {
        if relay_message_id == 0 {
            return Ok(());
        }
        if let Err(e) = self
            .api
            .delete_message(self.storage_chat_id, relay_message_id)
            .await
        {
            warn!(
                "relay message delete failed for {} (message {}): {}",
                blob_ref, relay_message_id, e
            );
        }
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Relay
    }
}
