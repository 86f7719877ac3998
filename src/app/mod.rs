use crate::api::ApiServer;
use crate::config::Config;
use crate::engine::{Engine, EngineHandle, EngineOptions};
use crate::gateway::{HttpPollingSource, PresenceSource};
use crate::global;
use crate::ocr;
use crate::report::sink::build_sink;
use crate::snapshot::SnapshotStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting rollcall service");

    let config = Config::load()?;

    let ocr_engine: Arc<dyn ocr::OcrEngine> = Arc::from(ocr::build_engine(&config.ocr)?);
    let sink = Arc::from(build_sink(config.report.webhook_url.as_deref()));
    let store = SnapshotStore::new(global::snapshot_file()?);

    let engine = Engine::start(
        ocr_engine,
        sink,
        store,
        EngineOptions {
            fallback_offset_minutes: config.rotation.default_spawn_offset_minutes,
            ocr_languages: config.ocr.languages.clone(),
        },
    )?;

    let api_server = ApiServer::new(engine.clone(), global::uploads_dir()?, config.http.port);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    spawn_tick_task(engine.clone(), config.rotation.tick_interval_secs);

    if let Some(members_url) = config.gateway.members_url.clone() {
        let source = HttpPollingSource::new(
            members_url,
            Duration::from_secs(config.gateway.poll_interval_secs.max(1)),
        );
        spawn_presence_task(engine.clone(), source);
    } else {
        info!("No gateway.members_url configured; presence arrives via POST /presence/event only");
    }

    info!("rollcall is ready!");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping");
    Ok(())
}

/// Drives the rotation's promotion check. The tick is idempotent, so a
/// missed or doubled interval is harmless.
fn spawn_tick_task(engine: EngineHandle, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if engine.tick().await.is_err() {
                warn!("Engine gone, stopping tick task");
                break;
            }
        }
    });
}

/// Populates the roster once, then streams presence deltas into the engine.
/// Source errors are logged and retried on the next poll; they never take
/// the service down.
fn spawn_presence_task(engine: EngineHandle, mut source: HttpPollingSource) {
    tokio::spawn(async move {
        match source.list_members().await {
            Ok(members) => {
                if engine.populate_roster(members).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!("Initial member listing failed: {e:#}"),
        }

        loop {
            match source.next_events().await {
                Ok(events) => {
                    for event in events {
                        if engine.presence_event(event).await.is_err() {
                            warn!("Engine gone, stopping presence task");
                            return;
                        }
                    }
                }
                Err(e) => warn!("Presence poll failed: {e:#}"),
            }
        }
    });
}
