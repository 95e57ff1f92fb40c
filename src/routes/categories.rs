use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use crate::error::AppError;
use crate::models::{CategoryResponse, CreateCategoryRequest, DeleteCategoryRequest, StatusResponse};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/create-category",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 200, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Empty or duplicate name", body = crate::error::ErrorBody),
    )
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    let name = request.name.trim();
    if state.db.find_category_by_name(name).await?.is_some() {
        return Err(AppError::Validation(format!(
            "category \"{}\" already exists",
            name
        )));
    }

    let category = state.db.create_category(name).await?;
    Ok(Json(CategoryResponse {
        status: "success",
        category,
    }))
}

#[utoipa::path(
    post,
    path = "/delete-category",
    tag = "categories",
    request_body = DeleteCategoryRequest,
    responses(
        (status = 200, description = "Category deleted; references nulled", body = StatusResponse),
        (status = 404, description = "Unknown category id", body = crate::error::ErrorBody),
    )
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteCategoryRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    state.db.delete_category(request.id).await?;
    Ok(Json(StatusResponse { status: "success" }))
}
