use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::Json;

use crate::db::Database;
use crate::error::AppError;
use crate::models::{NewFileRecord, StorageType, UploadResponse};
use crate::storage::router::StoreRequest;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    request_body(content_type = "multipart/form-data",
        description = "`file` is required; `category` (name or id) and `storage_type` (object|relay) are optional"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing or invalid field", body = crate::error::ErrorBody),
        (status = 502, description = "Both storage backends refused the blob", body = crate::error::ErrorBody),
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(Vec<u8>, String, String)> = None;
    let mut category: Option<String> = None;
    let mut storage_override: Option<StorageType> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("multipart error: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let declared = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file field: {}", e)))?
                    .to_vec();
                let mime_type = declared
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string()
                    });
                file = Some((data, file_name, mime_type));
            }
            Some("category") => {
                category = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("failed to read category field: {}", e))
                })?);
            }
            Some("storage_type") => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("failed to read storage_type field: {}", e))
                })?;
                let text = text.trim();
                if !text.is_empty() {
                    storage_override =
                        Some(StorageType::try_from(text.to_string()).map_err(AppError::Validation)?);
                }
            }
            _ => {}
        }
    }

    let (data, file_name, mime_type) =
        file.ok_or_else(|| AppError::Validation("missing 'file' field".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    if data.len() > state.config.max_file_size_bytes() {
        return Err(AppError::Validation(format!(
            "file exceeds the {} MB limit",
            state.config.max_file_size_mb
        )));
    }

    let category_id = match category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => Some(lookup_category(&state.db, raw).await?),
        None => None,
    };

    let stored = state
        .storage
        .store(
            StoreRequest {
                data: &data,
                file_name: &file_name,
                mime_type: &mime_type,
                uploader_chat_id: 0,
                storage_type: storage_override,
                custom_suffix: None,
            },
            &state.db,
        )
        .await?;

    state
        .db
        .insert_file_record(&NewFileRecord {
            url: stored.url.clone(),
            blob_ref: stored.blob_ref,
            relay_message_id: stored.relay_message_id,
            file_name,
            file_size: data.len() as i64,
            mime_type,
            uploader_chat_id: 0,
            storage_type: stored.storage_type,
            category_id,
            custom_suffix: None,
        })
        .await?;

    Ok(Json(UploadResponse {
        status: "success",
        url: stored.url,
    }))
}

/// The category field accepts a numeric id or a name.
async fn lookup_category(db: &Database, raw: &str) -> Result<i64, AppError> {
    let category = match raw.parse::<i64>() {
        Ok(id) => db.find_category_by_id(id).await?,
        Err(_) => db.find_category_by_name(raw).await?,
    };
    category
        .map(|c| c.id)
        .ok_or_else(|| AppError::Validation(format!("unknown category: {}", raw)))
}
