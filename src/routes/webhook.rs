use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use tracing::warn;

use crate::bot::conversation::ConversationEngine;
use crate::bot::types::Update;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/webhook",
    tag = "bot",
    request_body(content_type = "application/json",
        description = "Raw update envelope; always acknowledged regardless of contents"),
    responses(
        (status = 200, description = "Always acknowledged, regardless of internal outcome"),
    )
)]
pub async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Json<serde_json::Value> {
    // The body is taken raw so even a malformed envelope gets a success
    // acknowledgement; a failure status here would trigger upstream retry
    // storms.
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            let engine = ConversationEngine::new(state.clone());
            // Acknowledge first, process after. Redelivery of the same event
            // must stay tolerable: category creation is idempotent by name,
            // duplicate uploads are accepted as-is.
            tokio::spawn(async move {
                engine.handle_update(update).await;
            });
        }
        Err(e) => warn!("discarding unparseable webhook update: {}", e),
    }

    Json(serde_json::json!({ "status": "received" }))
}
