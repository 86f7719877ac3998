//! Event rotation endpoints.
//!
//! Covers listing, creation (single event or uploaded boss list), deletion,
//! and the manual overrides (activate by id, force next).

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::ApiResult;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/upload-list", post(upload_list))
        .route("/:id", axum::routing::delete(delete_event))
        .route("/:id/activate", post(activate_event))
        .route("/force-next", post(force_next))
        .with_state(state)
}

async fn list_events(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let events = state.engine.events().await?;
    let active_id = events
        .iter()
        .find(|e| e.status == crate::rotation::EventStatus::Active)
        .map(|e| e.id.clone());
    Ok(Json(json!({ "events": events, "active_id": active_id })))
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    /// Optional spawn instant; omitted means "the default offset from now".
    pub spawn_at: Option<DateTime<Utc>>,
}

async fn create_event(
    State(state): State<ApiState>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<Json<Value>> {
    let entry = state.engine.create_event(req.name, req.spawn_at).await?;
    Ok(Json(json!({ "event": entry })))
}

/// Accepts a raw text boss list, one event per line. Lines without a time
/// token get the fallback spawn and are reported back as such.
async fn upload_list(State(state): State<ApiState>, body: String) -> ApiResult<Json<Value>> {
    let parsed = state.engine.ingest_event_list(body).await?;
    let fallbacks = parsed.iter().filter(|e| e.fallback).count();
    info!("Boss list upload parsed {} lines", parsed.len());
    Ok(Json(json!({
        "parsed": parsed.len(),
        "fallback_count": fallbacks,
        "events": parsed,
    })))
}

async fn delete_event(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let removed = state.engine.delete_event(id).await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn activate_event(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let entry = state.engine.set_active(id).await?;
    Ok(Json(json!({ "active": entry })))
}

async fn force_next(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let next = state.engine.force_next().await?;
    Ok(Json(json!({ "active": next })))
}
