//! Report publishing endpoints.

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use super::ApiState;
use crate::api::error::ApiResult;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/publish", post(publish))
        .route("/last", get(last))
        .with_state(state)
}

/// Compose and push the attendance report. On success the rotation advances
/// and the token buffer clears; on sink failure nothing changes and the call
/// can simply be retried.
async fn publish(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let report = state.engine.publish_report().await?;
    Ok(Json(json!({ "published": true, "report": report })))
}

async fn last(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let last = state.engine.last_report().await?;
    Ok(Json(json!({ "report": last })))
}
