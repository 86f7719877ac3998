//! Voice presence endpoints: the live roster, session history, and a push
//! ingest route for deployments where the gateway bridge posts events
//! instead of being polled.

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};
use crate::gateway::PresenceEvent;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(roster))
        .route("/event", post(ingest_event))
        .route("/history", get(history))
        .with_state(state)
}

async fn roster(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let members = state.engine.roster().await?;
    Ok(Json(json!({ "members": members })))
}

async fn history(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let records = state.engine.session_history().await?;
    Ok(Json(json!({ "sessions": records })))
}

#[derive(Debug, Deserialize)]
pub struct PresenceEventRequest {
    pub kind: String,
    pub identity: String,
    pub display_name: Option<String>,
    /// Event instant; defaults to arrival time.
    pub at: Option<DateTime<Utc>>,
}

async fn ingest_event(
    State(state): State<ApiState>,
    Json(req): Json<PresenceEventRequest>,
) -> ApiResult<Json<Value>> {
    let at = req.at.unwrap_or_else(Utc::now);
    let event = match req.kind.as_str() {
        "join" => PresenceEvent::Join {
            display_name: req
                .display_name
                .unwrap_or_else(|| req.identity.clone()),
            identity: req.identity,
            at,
        },
        "leave" => PresenceEvent::Leave {
            identity: req.identity,
            at,
        },
        "heartbeat" => PresenceEvent::Heartbeat {
            identity: req.identity,
            at,
        },
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown presence event kind '{other}'"
            )))
        }
    };

    state.engine.presence_event(event).await?;
    Ok(Json(json!({ "accepted": true })))
}
