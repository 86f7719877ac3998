//! Attendance screenshot upload and token-buffer inspection.
//!
//! The upload returns as soon as the image is on disk and queued for OCR;
//! recognition lands in the token buffer asynchronously and is visible via
//! the GET route.

use axum::{
    body::Bytes,
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(current))
        .route("/upload", post(upload))
        .with_state(state)
}

async fn current(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let preview = state.engine.attendance().await?;
    Ok(Json(json!({
        "batch_seq": preview.batch_seq,
        "tokens": preview.tokens,
        "verdicts": preview.verdicts,
    })))
}

async fn upload(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    if body.is_empty() {
        return Err(ApiError::bad_request("image body required"));
    }

    tokio::fs::create_dir_all(&state.uploads_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to create uploads dir: {e}")))?;

    let filename = format!(
        "attendance-{}.png",
        chrono::Utc::now().format("%Y%m%d-%H%M%S%3f")
    );
    let path = state.uploads_dir.join(filename);
    tokio::fs::write(&path, &body)
        .await
        .map_err(|e| ApiError::internal(format!("failed to store upload: {e}")))?;

    info!("Stored attendance upload ({} bytes) at {:?}", body.len(), path);

    let seq = state.engine.ingest_upload(path).await?;
    Ok(Json(json!({ "accepted": true, "seq": seq })))
}
