//! S3-compatible object storage backend.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use tracing::{info, warn};

use super::{BlobPayload, FetchedBlob, StorageBackend, StoredRef};
use crate::config::ObjectStorageConfig;
use crate::error::AppError;
use crate::models::StorageType;

#[derive(Clone, Debug)]
pub struct ObjectBackend {
    client: Client,
    bucket: String,
}

impl ObjectBackend {
    pub fn new(config: &ObjectStorageConfig) -> Result<Self, AppError> {
        if config.bucket.is_empty() {
            return Err(AppError::Configuration("bucket name is required".to_string()));
        }
        if config.access_key_id.is_empty() || config.secret_access_key.is_empty() {
            return Err(AppError::Configuration(
                "object storage credentials are required".to_string(),
            ));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "filebed-object-storage",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(endpoint_url) = &config.endpoint_url {
            if !endpoint_url.is_empty() {
                info!("using custom object storage endpoint: {}", endpoint_url);
                builder = builder
                    .endpoint_url(endpoint_url)
                    // S3-compatible services resolve buckets by path, not
                    // virtual host.
                    .force_path_style(true);
            }
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    /// Server-side copy, used by the suffix-rename operation. The object
    /// backend is the only one whose references are renamable.
    pub async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), AppError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from_key))
            .key(to_key)
            .send()
            .await
            .map_err(|e| {
                AppError::Upstream(format!(
                    "object copy {} -> {} failed: {}",
                    from_key,
                    to_key,
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for ObjectBackend {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        _file_name: &str,
    ) -> Result<StoredRef, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                AppError::Upstream(format!(
                    "object store failed for {}: {}",
                    key,
                    e.into_service_error()
                ))
            })?;

        info!("stored object {}/{} ({} bytes)", self.bucket, key, data.len());
        Ok(StoredRef {
            blob_ref: key.to_string(),
            relay_message_id: 0,
        })
    }

    async fn fetch(&self, blob_ref: &str) -> Result<Option<FetchedBlob>, AppError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(blob_ref)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    return Ok(None);
                }
                return Err(AppError::Upstream(format!(
                    "object fetch failed for {}: {}",
                    blob_ref, service
                )));
            }
        };

        let content_type = response.content_type().map(str::to_string);
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Upstream(format!("object body read failed: {}", e)))?;

        Ok(Some(FetchedBlob {
            payload: BlobPayload::Buffered(body.into_bytes().to_vec()),
            content_type,
        }))
    }

    async fn delete(&self, blob_ref: &str, _relay_message_id: i64) -> Result<(), AppError> {
        if let Err(e) = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(blob_ref)
            .send()
            .await
        {
            warn!(
                "object delete failed for {}: {}",
                blob_ref,
                e.into_service_error()
            );
        }
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Object
    }
}
