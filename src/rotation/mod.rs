//! Scheduled-event rotation: pending → active → done.
//!
//! At most one entry is Active at any observed state. Done is terminal for a
//! cycle; the record stays in the list as history. All transitions go through
//! this module so promotion and demotion behave identically no matter which
//! command triggered them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

pub mod parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Active,
    Done,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    pub id: String,
    pub name: String,
    pub spawn_at: DateTime<Utc>,
    pub status: EventStatus,
}

#[derive(Debug, Default)]
pub struct EventRotationScheduler {
    entries: Vec<EventEntry>,
    active_id: Option<String>,
}

impl EventRotationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from snapshot data, validating the single-active invariant.
    pub fn restore(entries: Vec<EventEntry>) -> EngineResult<Self> {
        let active: Vec<&EventEntry> = entries
            .iter()
            .filter(|e| e.status == EventStatus::Active)
            .collect();
        if active.len() > 1 {
            return Err(EngineError::InvariantViolation(format!(
                "snapshot contains {} active entries",
                active.len()
            )));
        }
        let active_id = active.first().map(|e| e.id.clone());
        Ok(Self { entries, active_id })
    }

    pub fn insert(&mut self, name: impl Into<String>, spawn_at: DateTime<Utc>) -> &EventEntry {
        let entry = EventEntry {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            spawn_at,
            status: EventStatus::Pending,
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn remove(&mut self, id: &str) -> EngineResult<EventEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("no event with id {id}")))?;
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
        Ok(self.entries.remove(idx))
    }

    /// Idempotent promotion check. If nothing is Active, promote the Pending
    /// entry with the earliest spawn time that is due. Returns the promoted
    /// entry, if any; repeated calls with unchanged state are no-ops.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<&EventEntry> {
        if self.active_id.is_some() {
            return None;
        }
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == EventStatus::Pending && e.spawn_at <= now)
            .min_by_key(|(_, e)| e.spawn_at)
            .map(|(idx, _)| idx)?;
        Some(self.promote(idx))
    }

    /// Finish the Active entry (Done) and immediately attempt promotion of
    /// the next due Pending entry. Called after a successful report publish.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<&EventEntry> {
        self.demote_active();
        self.tick(now)
    }

    /// Force a specific Pending entry Active, demoting the current Active
    /// entry to Done. Activating an entry that is not Pending is an
    /// invariant violation, reported and state-preserving.
    pub fn set_active_by_id(&mut self, id: &str) -> EngineResult<&EventEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("no event with id {id}")))?;
        let status = self.entries[idx].status;
        if status != EventStatus::Pending {
            return Err(EngineError::InvariantViolation(format!(
                "cannot activate event {id} in status {}",
                status.as_str()
            )));
        }
        self.demote_active();
        Ok(self.promote(idx))
    }

    /// Finish the Active entry and promote the next earliest Pending entry
    /// regardless of its spawn time (manual override).
    pub fn force_next(&mut self, _now: DateTime<Utc>) -> Option<&EventEntry> {
        self.demote_active();
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == EventStatus::Pending)
            .min_by_key(|(_, e)| e.spawn_at)
            .map(|(idx, _)| idx)?;
        Some(self.promote(idx))
    }

    pub fn active(&self) -> Option<&EventEntry> {
        let id = self.active_id.as_deref()?;
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == EventStatus::Active)
            .count()
    }

    fn promote(&mut self, idx: usize) -> &EventEntry {
        debug_assert!(self.active_id.is_none());
        self.entries[idx].status = EventStatus::Active;
        self.active_id = Some(self.entries[idx].id.clone());
        &self.entries[idx]
    }

    fn demote_active(&mut self) {
        if let Some(id) = self.active_id.take() {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
                entry.status = EventStatus::Done;
            }
        }
    }
}
