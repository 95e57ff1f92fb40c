use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use tracing::warn;

use crate::error::AppError;
use crate::models::{
    DeleteMultipleRequest, DeleteMultipleResponse, DeleteRequest, StatusResponse,
    UpdateSuffixRequest, UploadResponse,
};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/update-suffix",
    tag = "files",
    request_body = UpdateSuffixRequest,
    responses(
        (status = 200, description = "Locator renamed", body = UploadResponse),
        (status = 400, description = "Invalid suffix", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown locator", body = crate::error::ErrorBody),
    )
)]
pub async fn update_suffix(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSuffixRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    let record = state
        .db
        .find_file_by_url(request.url.trim())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no file with locator {}", request.url)))?;

    let suffix = request.suffix.trim();
    let (new_url, new_blob_ref) = state.storage.rename(&record, suffix).await?;
    state
        .db
        .update_file_locator(record.id, &new_url, &new_blob_ref, Some(suffix))
        .await?;

    Ok(Json(UploadResponse {
        status: "success",
        url: new_url,
    }))
}

#[utoipa::path(
    post,
    path = "/delete",
    tag = "files",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "File deleted", body = StatusResponse),
        (status = 404, description = "Unknown file id", body = crate::error::ErrorBody),
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let record = state
        .db
        .find_file_by_id(request.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file {} not found", request.id)))?;

    state.storage.delete_blob(&record).await?;
    state.db.delete_file(record.id).await?;

    Ok(Json(StatusResponse { status: "success" }))
}

#[utoipa::path(
    post,
    path = "/delete-multiple",
    tag = "files",
    request_body = DeleteMultipleRequest,
    responses(
        (status = 200, description = "Per-locator outcome", body = DeleteMultipleResponse),
    )
)]
pub async fn delete_multiple(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteMultipleRequest>,
) -> Result<Json<DeleteMultipleResponse>, AppError> {
    let mut deleted = 0usize;
    let mut failed = Vec::new();

    for url in &request.urls {
        match delete_by_url(&state, url).await {
            Ok(true) => deleted += 1,
            Ok(false) => failed.push(url.clone()),
            Err(e) => {
                warn!("delete failed for {}: {}", url, e);
                failed.push(url.clone());
            }
        }
    }

    Ok(Json(DeleteMultipleResponse {
        status: "success",
        deleted,
        failed,
    }))
}

async fn delete_by_url(state: &AppState, url: &str) -> Result<bool, AppError> {
    let Some(record) = state.db.find_file_by_url(url.trim()).await? else {
        return Ok(false);
    };
    state.storage.delete_blob(&record).await?;
    state.db.delete_file(record.id).await?;
    Ok(true)
}
