//! The attendance engine: one owner for all mutable state.
//!
//! Every inbound event (presence updates, the periodic tick, OCR
//! completions, control commands) is a typed `EngineCommand` drained from a
//! single queue, so no two of them ever touch the same collection
//! concurrently. External calls (OCR recognition, report publishing) run in
//! spawned tasks and re-enter the queue with their outcome; the loop itself
//! never blocks on the network.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::gateway::PresenceEvent;
use crate::matching::{self, DetectedNameToken, MatchVerdict};
use crate::ocr::OcrEngine;
use crate::presence::{ChannelMember, RosterEntry, SessionRecord, VoicePresenceTracker};
use crate::report::{self, AttendanceReport, PublishedReport, ReportSink};
use crate::rotation::parser::{EventLineParser, ParsedEvent};
use crate::rotation::{EventEntry, EventRotationScheduler};
use crate::snapshot::{Snapshot, SnapshotStore};

const COMMAND_QUEUE_DEPTH: usize = 64;

/// The OCR token buffer for the current batch. Replaced wholesale by a newer
/// batch, cleared on publish, never merged.
#[derive(Debug, Default)]
pub struct TokenBuffer {
    pub batch_seq: u64,
    pub tokens: Vec<DetectedNameToken>,
    pub image_path: Option<PathBuf>,
}

/// Current buffer contents plus a preview reconciliation against the live
/// roster, as shown by the API before publishing.
#[derive(Debug, Clone, Serialize)]
pub struct AttendancePreview {
    pub batch_seq: u64,
    pub tokens: Vec<DetectedNameToken>,
    pub verdicts: Vec<MatchVerdict>,
}

type Reply<T> = oneshot::Sender<T>;

pub enum EngineCommand {
    Presence(PresenceEvent),
    PopulateRoster(Vec<ChannelMember>),
    Tick,
    CreateEvent {
        name: String,
        spawn_at: Option<DateTime<Utc>>,
        reply: Reply<EngineResult<EventEntry>>,
    },
    IngestEventList {
        text: String,
        reply: Reply<EngineResult<Vec<ParsedEvent>>>,
    },
    DeleteEvent {
        id: String,
        reply: Reply<EngineResult<EventEntry>>,
    },
    SetActive {
        id: String,
        reply: Reply<EngineResult<EventEntry>>,
    },
    ForceNext {
        reply: Reply<Option<EventEntry>>,
    },
    IngestUpload {
        image_path: PathBuf,
        reply: Reply<u64>,
    },
    OcrCompleted {
        seq: u64,
        image_path: PathBuf,
        outcome: Result<String, String>,
    },
    PublishReport {
        reply: Reply<EngineResult<AttendanceReport>>,
    },
    CommitPublish {
        event_id: Option<String>,
        batch_seq: u64,
        published: PublishedReport,
    },
    AbortPublish {
        reason: String,
    },
    QueryEvents {
        reply: Reply<Vec<EventEntry>>,
    },
    QueryRoster {
        reply: Reply<Vec<RosterEntry>>,
    },
    QueryHistory {
        reply: Reply<Vec<SessionRecord>>,
    },
    QueryAttendance {
        reply: Reply<AttendancePreview>,
    },
    QueryLastReport {
        reply: Reply<Option<PublishedReport>>,
    },
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Spawn offset applied to event-list lines with no time token.
    pub fallback_offset_minutes: i64,
    /// Language hint forwarded to the OCR engine.
    pub ocr_languages: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fallback_offset_minutes: 60,
            ocr_languages: "eng+chi_sim".to_string(),
        }
    }
}

/// Cloneable front door to the engine. All methods enqueue a command and,
/// where a reply is expected, await it.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

pub struct Engine {
    rotation: EventRotationScheduler,
    presence: VoicePresenceTracker,
    tokens: TokenBuffer,
    last_report: Option<PublishedReport>,
    ocr: Arc<dyn OcrEngine>,
    sink: Arc<dyn ReportSink>,
    store: SnapshotStore,
    parser: EventLineParser,
    options: EngineOptions,
    latest_upload_seq: u64,
    publish_in_flight: bool,
    self_tx: mpsc::Sender<EngineCommand>,
}

impl Engine {
    /// Load state from the snapshot store, spawn the engine loop, and return
    /// its handle.
    pub fn start(
        ocr: Arc<dyn OcrEngine>,
        sink: Arc<dyn ReportSink>,
        store: SnapshotStore,
        options: EngineOptions,
    ) -> anyhow::Result<EngineHandle> {
        let snapshot = store.load()?;
        let rotation = EventRotationScheduler::restore(snapshot.events)?;
        let presence = VoicePresenceTracker::with_history(snapshot.session_history);
        let parser = EventLineParser::new()?;

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let engine = Engine {
            rotation,
            presence,
            tokens: TokenBuffer::default(),
            last_report: snapshot.last_report,
            ocr,
            sink,
            store,
            parser,
            options,
            latest_upload_seq: 0,
            publish_in_flight: false,
            self_tx: tx.clone(),
        };

        tokio::spawn(engine.run(rx));
        Ok(EngineHandle { tx })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<EngineCommand>) {
        info!("Attendance engine started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        info!("Attendance engine stopped");
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Presence(event) => self.handle_presence(event),
            EngineCommand::PopulateRoster(members) => {
                info!("Populating roster with {} members", members.len());
                self.presence.populate(&members, Utc::now());
            }
            EngineCommand::Tick => {
                if let Some(promoted) = self.rotation.tick(Utc::now()) {
                    info!("Event '{}' is now active", promoted.name);
                    self.save();
                }
            }
            EngineCommand::CreateEvent {
                name,
                spawn_at,
                reply,
            } => {
                let _ = reply.send(self.create_event(name, spawn_at));
            }
            EngineCommand::IngestEventList { text, reply } => {
                let _ = reply.send(self.ingest_event_list(&text));
            }
            EngineCommand::DeleteEvent { id, reply } => {
                let result = self.rotation.remove(&id);
                if result.is_ok() {
                    self.save();
                }
                let _ = reply.send(result);
            }
            EngineCommand::SetActive { id, reply } => {
                let result = self.rotation.set_active_by_id(&id).map(EventEntry::clone);
                if result.is_ok() {
                    self.save();
                }
                let _ = reply.send(result);
            }
            EngineCommand::ForceNext { reply } => {
                let next = self.rotation.force_next(Utc::now()).map(EventEntry::clone);
                self.save();
                let _ = reply.send(next);
            }
            EngineCommand::IngestUpload { image_path, reply } => {
                let seq = self.ingest_upload(image_path);
                let _ = reply.send(seq);
            }
            EngineCommand::OcrCompleted {
                seq,
                image_path,
                outcome,
            } => self.handle_ocr_completed(seq, image_path, outcome),
            EngineCommand::PublishReport { reply } => self.handle_publish(reply),
            EngineCommand::CommitPublish {
                event_id,
                batch_seq,
                published,
            } => self.handle_commit_publish(event_id, batch_seq, published),
            EngineCommand::AbortPublish { reason } => {
                self.publish_in_flight = false;
                error!("Report publish failed: {reason}");
            }
            EngineCommand::QueryEvents { reply } => {
                let _ = reply.send(self.rotation.entries().to_vec());
            }
            EngineCommand::QueryRoster { reply } => {
                let _ = reply.send(self.presence.snapshot(Utc::now()));
            }
            EngineCommand::QueryHistory { reply } => {
                let _ = reply.send(self.presence.history().to_vec());
            }
            EngineCommand::QueryAttendance { reply } => {
                let roster = self.presence.snapshot(Utc::now());
                let _ = reply.send(AttendancePreview {
                    batch_seq: self.tokens.batch_seq,
                    tokens: self.tokens.tokens.clone(),
                    verdicts: matching::reconcile(&self.tokens.tokens, &roster),
                });
            }
            EngineCommand::QueryLastReport { reply } => {
                let _ = reply.send(self.last_report.clone());
            }
        }
    }

    fn handle_presence(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Join {
                identity,
                display_name,
                at,
            } => self.presence.on_join(&identity, &display_name, at),
            PresenceEvent::Leave { identity, at } => {
                let record = self.presence.on_leave(&identity, at);
                match record.duration_secs {
                    Some(secs) => info!("{} left voice after {}s", record.display_name, secs),
                    None => warn!("{} left voice without a tracked join", record.identity),
                }
                self.save();
            }
            PresenceEvent::Heartbeat { identity, at } => self.presence.on_heartbeat(&identity, at),
        }
    }

    fn create_event(
        &mut self,
        name: String,
        spawn_at: Option<DateTime<Utc>>,
    ) -> EngineResult<EventEntry> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Input("event name must not be empty".into()));
        }
        let spawn_at = spawn_at.unwrap_or_else(|| Utc::now() + self.fallback_offset());
        let entry = self.rotation.insert(name, spawn_at).clone();
        info!("Created event '{}' spawning at {}", entry.name, entry.spawn_at);
        self.save();
        Ok(entry)
    }

    fn ingest_event_list(&mut self, text: &str) -> EngineResult<Vec<ParsedEvent>> {
        let parsed = self
            .parser
            .parse(text, Utc::now(), self.fallback_offset());
        if parsed.is_empty() {
            return Err(EngineError::Input(
                "event list contained no usable lines".into(),
            ));
        }
        for event in &parsed {
            self.rotation.insert(event.name.clone(), event.spawn_at);
        }
        let fallbacks = parsed.iter().filter(|e| e.fallback).count();
        info!(
            "Ingested {} events ({} with fallback spawn times)",
            parsed.len(),
            fallbacks
        );
        self.save();
        Ok(parsed)
    }

    fn ingest_upload(&mut self, image_path: PathBuf) -> u64 {
        self.latest_upload_seq += 1;
        let seq = self.latest_upload_seq;
        info!("Upload #{seq} accepted, OCR starting: {:?}", image_path);

        let ocr = Arc::clone(&self.ocr);
        let languages = self.options.ocr_languages.clone();
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let outcome = ocr
                .recognize(&image_path, &languages)
                .await
                .map_err(|e| format!("{e:#}"));
            // the engine may be gone on shutdown; nothing left to deliver to
            let _ = tx
                .send(EngineCommand::OcrCompleted {
                    seq,
                    image_path,
                    outcome,
                })
                .await;
        });

        seq
    }

    fn handle_ocr_completed(
        &mut self,
        seq: u64,
        image_path: PathBuf,
        outcome: Result<String, String>,
    ) {
        if seq < self.latest_upload_seq {
            warn!(
                "Discarding stale OCR result for upload #{seq} (latest is #{})",
                self.latest_upload_seq
            );
            return;
        }
        match outcome {
            Ok(text) => {
                let tokens = matching::tokens_from_text(&text);
                info!("Upload #{seq} recognized {} name tokens", tokens.len());
                self.tokens = TokenBuffer {
                    batch_seq: seq,
                    tokens,
                    image_path: Some(image_path),
                };
            }
            Err(reason) => {
                error!("OCR for upload #{seq} failed: {reason}");
            }
        }
    }

    fn handle_publish(&mut self, reply: Reply<EngineResult<AttendanceReport>>) {
        if self.publish_in_flight {
            let _ = reply.send(Err(EngineError::InvariantViolation(
                "a report publish is already in flight".into(),
            )));
            return;
        }

        let now = Utc::now();
        let roster = self.presence.snapshot(now);
        let report = report::compose(self.rotation.active(), &self.tokens.tokens, &roster, now);
        let content = report::render(&report);
        let event_id = report.event_id.clone();
        let batch_seq = self.tokens.batch_seq;
        let attachment = self.tokens.image_path.clone();

        self.publish_in_flight = true;
        let sink = Arc::clone(&self.sink);
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            match sink.publish(&content, attachment.as_deref()).await {
                Ok(()) => {
                    let published = PublishedReport {
                        content,
                        pushed_at: Utc::now(),
                    };
                    let _ = tx
                        .send(EngineCommand::CommitPublish {
                            event_id,
                            batch_seq,
                            published,
                        })
                        .await;
                    let _ = reply.send(Ok(report));
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    let _ = tx
                        .send(EngineCommand::AbortPublish {
                            reason: reason.clone(),
                        })
                        .await;
                    let _ = reply.send(Err(EngineError::TransientExternal(reason)));
                }
            }
        });
    }

    /// Second half of the two-phase publish: the sink accepted the report,
    /// so advance the rotation and clear the token buffer together. If the
    /// rotation changed while the sink call was running, the commit is stale
    /// and neither transition happens.
    fn handle_commit_publish(
        &mut self,
        event_id: Option<String>,
        batch_seq: u64,
        published: PublishedReport,
    ) {
        self.publish_in_flight = false;

        let active_id = self.rotation.active().map(|e| e.id.clone());
        if active_id != event_id {
            warn!("Rotation changed during publish; skipping advance");
        } else {
            if event_id.is_some() {
                match self.rotation.advance(Utc::now()) {
                    Some(next) => info!("Rotation advanced, '{}' is now active", next.name),
                    None => info!("Rotation advanced, no event pending"),
                }
            }
            if self.tokens.batch_seq <= batch_seq {
                self.tokens = TokenBuffer::default();
            }
        }

        self.last_report = Some(published);
        self.save();
    }

    fn fallback_offset(&self) -> Duration {
        Duration::minutes(self.options.fallback_offset_minutes)
    }

    fn save(&self) {
        let snapshot = Snapshot {
            events: self.rotation.entries().to_vec(),
            session_history: self.presence.history().to_vec(),
            last_report: self.last_report.clone(),
        };
        if let Err(e) = self.store.save(&snapshot) {
            error!("Failed to save snapshot: {e:#}");
        }
    }
}

impl EngineHandle {
    async fn send(&self, command: EngineCommand) -> EngineResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EngineError::TransientExternal("engine is not running".into()))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> EngineResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await
            .map_err(|_| EngineError::TransientExternal("engine dropped the request".into()))
    }

    pub async fn presence_event(&self, event: PresenceEvent) -> EngineResult<()> {
        self.send(EngineCommand::Presence(event)).await
    }

    pub async fn populate_roster(&self, members: Vec<ChannelMember>) -> EngineResult<()> {
        self.send(EngineCommand::PopulateRoster(members)).await
    }

    pub async fn tick(&self) -> EngineResult<()> {
        self.send(EngineCommand::Tick).await
    }

    pub async fn create_event(
        &self,
        name: String,
        spawn_at: Option<DateTime<Utc>>,
    ) -> EngineResult<EventEntry> {
        self.request(|reply| EngineCommand::CreateEvent {
            name,
            spawn_at,
            reply,
        })
        .await?
    }

    pub async fn ingest_event_list(&self, text: String) -> EngineResult<Vec<ParsedEvent>> {
        self.request(|reply| EngineCommand::IngestEventList { text, reply })
            .await?
    }

    pub async fn delete_event(&self, id: String) -> EngineResult<EventEntry> {
        self.request(|reply| EngineCommand::DeleteEvent { id, reply })
            .await?
    }

    pub async fn set_active(&self, id: String) -> EngineResult<EventEntry> {
        self.request(|reply| EngineCommand::SetActive { id, reply })
            .await?
    }

    pub async fn force_next(&self) -> EngineResult<Option<EventEntry>> {
        self.request(|reply| EngineCommand::ForceNext { reply }).await
    }

    /// Accepts an uploaded screenshot and returns its batch sequence number.
    /// Recognition completes asynchronously; poll `attendance()` for tokens.
    pub async fn ingest_upload(&self, image_path: PathBuf) -> EngineResult<u64> {
        self.request(|reply| EngineCommand::IngestUpload { image_path, reply })
            .await
    }

    pub async fn publish_report(&self) -> EngineResult<AttendanceReport> {
        self.request(|reply| EngineCommand::PublishReport { reply })
            .await?
    }

    pub async fn events(&self) -> EngineResult<Vec<EventEntry>> {
        self.request(|reply| EngineCommand::QueryEvents { reply })
            .await
    }

    pub async fn roster(&self) -> EngineResult<Vec<RosterEntry>> {
        self.request(|reply| EngineCommand::QueryRoster { reply })
            .await
    }

    pub async fn session_history(&self) -> EngineResult<Vec<SessionRecord>> {
        self.request(|reply| EngineCommand::QueryHistory { reply })
            .await
    }

    pub async fn attendance(&self) -> EngineResult<AttendancePreview> {
        self.request(|reply| EngineCommand::QueryAttendance { reply })
            .await
    }

    pub async fn last_report(&self) -> EngineResult<Option<PublishedReport>> {
        self.request(|reply| EngineCommand::QueryLastReport { reply })
            .await
    }
}
