//! Live voice-channel roster and per-identity session tracking.
//!
//! One `VoiceSession` covers a continuous join-to-leave interval. Leaving
//! finalizes the session into a `SessionRecord` appended to history. A leave
//! for an identity we never saw join (e.g. after a restart) is recorded as an
//! ambiguous stub with no join time and no duration. That is an explicit
//! policy, not a missing case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live entry: identity currently in the tracked channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSession {
    pub identity: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl VoiceSession {
    /// Canonical finalization transition: the session ends at `left_at` and
    /// becomes an immutable history record. Duration is clamped at zero so
    /// clock skew can never produce a negative session.
    fn finalize(self, left_at: DateTime<Utc>) -> SessionRecord {
        let duration = (left_at - self.joined_at).num_seconds().max(0);
        SessionRecord {
            identity: self.identity,
            display_name: self.display_name,
            joined_at: Some(self.joined_at),
            left_at,
            duration_secs: Some(duration),
        }
    }
}

/// A finalized join-to-leave interval, or an ambiguous stub for an unmatched
/// leave (`joined_at` and `duration_secs` both `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub identity: String,
    pub display_name: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: DateTime<Utc>,
    pub duration_secs: Option<i64>,
}

impl SessionRecord {
    fn ambiguous(identity: String, left_at: DateTime<Utc>) -> Self {
        Self {
            display_name: identity.clone(),
            identity,
            joined_at: None,
            left_at,
            duration_secs: None,
        }
    }
}

/// One row of the live-roster projection handed to the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub identity: String,
    pub display_name: String,
    pub duration_secs: i64,
}

/// A member reported by the presence source's one-shot listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub identity: String,
    pub display_name: String,
}

#[derive(Debug, Default)]
pub struct VoicePresenceTracker {
    live: BTreeMap<String, VoiceSession>,
    history: Vec<SessionRecord>,
}

impl VoicePresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore finalized history from a snapshot.
    pub fn with_history(history: Vec<SessionRecord>) -> Self {
        Self {
            live: BTreeMap::new(),
            history,
        }
    }

    pub fn on_join(&mut self, identity: &str, display_name: &str, at: DateTime<Utc>) {
        match self.live.get_mut(identity) {
            Some(session) => {
                // duplicate join while already live: refresh, keep joined_at
                session.last_seen_at = at;
                session.display_name = display_name.to_string();
            }
            None => {
                self.live.insert(
                    identity.to_string(),
                    VoiceSession {
                        identity: identity.to_string(),
                        display_name: display_name.to_string(),
                        joined_at: at,
                        last_seen_at: at,
                    },
                );
            }
        }
    }

    /// Finalize and return the session record (also appended to history).
    pub fn on_leave(&mut self, identity: &str, at: DateTime<Utc>) -> SessionRecord {
        let record = match self.live.remove(identity) {
            Some(session) => session.finalize(at),
            None => SessionRecord::ambiguous(identity.to_string(), at),
        };
        self.history.push(record.clone());
        record
    }

    pub fn on_heartbeat(&mut self, identity: &str, at: DateTime<Utc>) {
        if let Some(session) = self.live.get_mut(identity) {
            session.last_seen_at = at;
        }
    }

    /// Bulk-populate the roster from a one-shot channel listing. The real
    /// join instants are unknowable, so `now` stands in for them.
    pub fn populate(&mut self, members: &[ChannelMember], now: DateTime<Utc>) {
        for member in members {
            self.on_join(&member.identity, &member.display_name, now);
        }
    }

    /// Pure projection of the live roster, sorted by identity. Durations are
    /// clamped at zero against clock skew.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<RosterEntry> {
        self.live
            .values()
            .map(|session| RosterEntry {
                identity: session.identity.clone(),
                display_name: session.display_name.clone(),
                duration_secs: (now - session.joined_at).num_seconds().max(0),
            })
            .collect()
    }

    pub fn history(&self) -> &[SessionRecord] {
        &self.history
    }

    pub fn is_live(&self, identity: &str) -> bool {
        self.live.contains_key(identity)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_join_heartbeat_leave_durations() {
        let mut tracker = VoicePresenceTracker::new();
        tracker.on_join("u1", "Jinshi", t(0));

        tracker.on_heartbeat("u1", t(30));
        let snap = tracker.snapshot(t(30));
        assert_eq!(snap[0].duration_secs, 30);

        let record = tracker.on_leave("u1", t(45));
        assert_eq!(record.duration_secs, Some(45));
        assert!(!tracker.is_live("u1"));
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_ambiguous_leave_has_no_duration() {
        let mut tracker = VoicePresenceTracker::new();
        let record = tracker.on_leave("ghost", t(10));
        assert!(record.joined_at.is_none());
        assert_eq!(record.duration_secs, None);
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_rejoin_after_leave_resets_joined_at() {
        let mut tracker = VoicePresenceTracker::new();
        tracker.on_join("u1", "Jinshi", t(0));
        tracker.on_leave("u1", t(10));
        tracker.on_join("u1", "Jinshi", t(100));

        let snap = tracker.snapshot(t(130));
        assert_eq!(snap[0].duration_secs, 30);
    }

    #[test]
    fn test_duplicate_join_keeps_original_joined_at() {
        let mut tracker = VoicePresenceTracker::new();
        tracker.on_join("u1", "Jinshi", t(0));
        tracker.on_join("u1", "Jinshi the Great", t(20));

        let snap = tracker.snapshot(t(60));
        assert_eq!(snap[0].duration_secs, 60);
        assert_eq!(snap[0].display_name, "Jinshi the Great");
        assert_eq!(tracker.live_count(), 1);
    }

    #[test]
    fn test_duration_clamped_against_clock_skew() {
        let mut tracker = VoicePresenceTracker::new();
        tracker.on_join("u1", "Jinshi", t(100));
        // clock stepped backwards between join and projection
        let snap = tracker.snapshot(t(50));
        assert_eq!(snap[0].duration_secs, 0);

        tracker.on_join("u2", "Mori", t(100));
        let record = tracker.on_leave("u2", t(40));
        assert_eq!(record.duration_secs, Some(0));
    }

    #[test]
    fn test_heartbeat_for_untracked_identity_is_noop() {
        let mut tracker = VoicePresenceTracker::new();
        tracker.on_heartbeat("nobody", t(5));
        assert_eq!(tracker.live_count(), 0);
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn test_populate_lists_everyone_as_joined_now() {
        let mut tracker = VoicePresenceTracker::new();
        let members = vec![
            ChannelMember {
                identity: "u1".into(),
                display_name: "Jinshi".into(),
            },
            ChannelMember {
                identity: "u2".into(),
                display_name: "Mori".into(),
            },
        ];
        tracker.populate(&members, t(0));
        assert_eq!(tracker.live_count(), 2);
        assert_eq!(tracker.snapshot(t(10))[0].duration_secs, 10);
    }

    #[test]
    fn test_snapshot_sorted_by_identity() {
        let mut tracker = VoicePresenceTracker::new();
        tracker.on_join("zed", "Zed", t(0));
        tracker.on_join("abe", "Abe", t(0));
        let ids: Vec<_> = tracker
            .snapshot(t(1))
            .into_iter()
            .map(|e| e.identity)
            .collect();
        assert_eq!(ids, vec!["abe", "zed"]);
    }
}
