//! Crash-resilient snapshot of events, session history, and the last report.
//!
//! Saves write a temp file next to the target and rename it into place, so a
//! reader never observes a half-written snapshot. A missing file loads as
//! the empty default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::presence::SessionRecord;
use crate::report::PublishedReport;
use crate::rotation::EventEntry;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub events: Vec<EventEntry>,
    pub session_history: Vec<SessionRecord>,
    pub last_report: Option<PublishedReport>,
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            info!("No snapshot at {:?}, starting empty", self.path);
            return Ok(Snapshot::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot {:?}", self.path))?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).context("Failed to parse snapshot file")?;

        info!(
            "Loaded snapshot: {} events, {} history records",
            snapshot.events.len(),
            snapshot.session_history.len()
        );
        Ok(snapshot)
    }

    /// Atomic from the reader's perspective: the new content replaces the
    /// old in a single rename.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let parent = self
            .path
            .parent()
            .context("Snapshot path has no parent directory")?;
        std::fs::create_dir_all(parent).context("Failed to create snapshot directory")?;

        let content =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

        let tmp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create snapshot temp file")?;
        std::fs::write(tmp.path(), content).context("Failed to write snapshot temp file")?;
        tmp.persist(&self.path)
            .context("Failed to move snapshot into place")?;

        debug!("Snapshot saved to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::EventStatus;
    use chrono::{TimeZone, Utc};

    fn sample() -> Snapshot {
        Snapshot {
            events: vec![EventEntry {
                id: "ev1".into(),
                name: "Kutum".into(),
                spawn_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                status: EventStatus::Pending,
            }],
            session_history: vec![SessionRecord {
                identity: "u1".into(),
                display_name: "Jinshi".into(),
                joined_at: None,
                left_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
                duration_secs: None,
            }],
            last_report: Some(PublishedReport {
                content: "report".into(),
                pushed_at: Utc.timestamp_opt(1_700_000_200, 0).unwrap(),
            }),
        }
    }

    #[test]
    fn test_missing_file_loads_empty_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json"));
        let snapshot = store.load().unwrap();
        assert!(snapshot.events.is_empty());
        assert!(snapshot.session_history.is_empty());
        assert!(snapshot.last_report.is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("snapshot.json"));

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].name, "Kutum");
        assert_eq!(loaded.session_history[0].duration_secs, None);
        assert_eq!(loaded.last_report.unwrap().content, "report");
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json"));

        store.save(&sample()).unwrap();
        store.save(&Snapshot::default()).unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.events.is_empty());
    }
}
