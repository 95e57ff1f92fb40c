use axum::response::Json;

use crate::models::StatusResponse;

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is up", body = StatusResponse))
)]
pub async fn healthz() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}
