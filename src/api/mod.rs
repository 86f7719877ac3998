//! REST API server for rollcall.
//!
//! Provides HTTP endpoints for:
//! - Event rotation control (list, create, activate, force-next)
//! - Boss-list and attendance screenshot uploads
//! - Voice presence roster and session history
//! - Report publishing

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use tower::ServiceBuilder;
use tracing::info;

use crate::engine::EngineHandle;

pub use routes::ApiState;

pub struct ApiServer {
    port: u16,
    state: ApiState,
}

impl ApiServer {
    pub fn new(engine: EngineHandle, uploads_dir: PathBuf, port: u16) -> Self {
        Self {
            port,
            state: ApiState {
                engine,
                uploads_dir,
            },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // API routes
            .nest("/events", routes::events::router(self.state.clone()))
            .nest("/presence", routes::presence::router(self.state.clone()))
            .nest("/attendance", routes::attendance::router(self.state.clone()))
            .nest("/report", routes::report::router(self.state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET    /                    - Service info");
        info!("  GET    /version             - Version info");
        info!("  GET    /events              - List rotation entries");
        info!("  POST   /events              - Create event");
        info!("  POST   /events/upload-list  - Upload boss list (text)");
        info!("  DELETE /events/:id          - Delete event");
        info!("  POST   /events/:id/activate - Force entry active");
        info!("  POST   /events/force-next   - Finish active, promote next");
        info!("  GET    /presence            - Live voice roster");
        info!("  POST   /presence/event      - Ingest presence event");
        info!("  GET    /presence/history    - Finalized sessions");
        info!("  GET    /attendance          - Current OCR token buffer");
        info!("  POST   /attendance/upload   - Upload attendance screenshot");
        info!("  POST   /report/publish      - Publish attendance report");
        info!("  GET    /report/last         - Last published report");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "rollcall",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "rollcall"
    }))
}
