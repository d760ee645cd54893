use axum::extract::State;
use axum::Json;

use crate::api::AppState;
use crate::error::AppError;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the database answers; also reports the replay watermark.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repo
        .ping()
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;
    let watermark = state.repo.get_watermark().await?;
    Ok(Json(serde_json::json!({
        "status": "ready",
        "watermark": watermark.map(|w| w.to_string()),
    })))
}
