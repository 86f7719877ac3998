//! Voice-presence delivery from the chat platform.
//!
//! The platform gateway itself is an external collaborator; this module
//! defines the typed events the engine consumes and a polling source that
//! turns a members endpoint into join/leave/heartbeat deltas. Presence can
//! also be pushed straight into the engine via the HTTP API.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::presence::ChannelMember;

pub mod http_poll;

pub use http_poll::HttpPollingSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PresenceEvent {
    Join {
        identity: String,
        display_name: String,
        at: DateTime<Utc>,
    },
    Leave {
        identity: String,
        at: DateTime<Utc>,
    },
    Heartbeat {
        identity: String,
        at: DateTime<Utc>,
    },
}

/// A source of presence events for the tracked voice channel.
#[async_trait]
pub trait PresenceSource: Send + Sync {
    /// One-shot listing of current channel members, used to populate the
    /// roster at startup or after a reconnect.
    async fn list_members(&self) -> Result<Vec<ChannelMember>>;

    /// Wait for and return the next batch of presence events. An empty batch
    /// is a valid outcome (nothing changed).
    async fn next_events(&mut self) -> Result<Vec<PresenceEvent>>;
}
