use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

pub mod categories;
pub mod health;
pub mod manage;
pub mod serve;
pub mod upload;
pub mod webhook;

#[derive(OpenApi)]
#[openapi(
    paths(
        upload::upload,
        manage::update_suffix,
        manage::delete_file,
        manage::delete_multiple,
        categories::create_category,
        categories::delete_category,
        webhook::webhook,
        health::healthz,
    ),
    components(schemas(
        crate::models::UploadResponse,
        crate::models::UpdateSuffixRequest,
        crate::models::DeleteRequest,
        crate::models::DeleteMultipleRequest,
        crate::models::DeleteMultipleResponse,
        crate::models::CreateCategoryRequest,
        crate::models::DeleteCategoryRequest,
        crate::models::CategoryResponse,
        crate::models::StatusResponse,
        crate::models::Category,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "files", description = "Upload, serve, rename, and delete stored files"),
        (name = "categories", description = "Category management"),
        (name = "bot", description = "Chat platform webhook"),
    )
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    // Leave headroom above the payload limit for multipart framing.
    let body_limit = DefaultBodyLimit::max(state.config.max_file_size_bytes() + 1024 * 1024);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/upload", post(upload::upload))
        .route("/update-suffix", post(manage::update_suffix))
        .route("/delete", post(manage::delete_file))
        .route("/delete-multiple", post(manage::delete_multiple))
        .route("/create-category", post(categories::create_category))
        .route("/delete-category", post(categories::delete_category))
        .route("/webhook", post(webhook::webhook))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Everything else is a file locator, resolved through the retrieval
        // chain.
        .fallback(serve::serve_file)
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
