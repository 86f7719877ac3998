//! Polling presence source.
//!
//! Fetches the channel's member list on an interval and diffs successive
//! rosters: newcomers become joins, missing members become leaves, everyone
//! still present gets a heartbeat. Join instants are therefore only as
//! precise as the poll interval, which is acceptable for attendance.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{PresenceEvent, PresenceSource};
use crate::presence::ChannelMember;

#[derive(Debug, Deserialize)]
struct MemberDto {
    id: String,
    display_name: Option<String>,
    username: Option<String>,
}

impl MemberDto {
    fn into_member(self) -> ChannelMember {
        let display_name = self
            .display_name
            .filter(|n| !n.is_empty())
            .or(self.username)
            .unwrap_or_else(|| self.id.clone());
        ChannelMember {
            identity: self.id,
            display_name,
        }
    }
}

pub struct HttpPollingSource {
    client: reqwest::Client,
    members_url: String,
    poll_interval: Duration,
    last_roster: Option<BTreeMap<String, String>>,
}

impl HttpPollingSource {
    pub fn new(members_url: String, poll_interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            members_url,
            poll_interval,
            last_roster: None,
        }
    }

    async fn fetch_members(&self) -> Result<Vec<ChannelMember>> {
        let response = self
            .client
            .get(&self.members_url)
            .send()
            .await
            .context("Failed to reach members endpoint")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Members endpoint returned status {status}");
        }

        let members: Vec<MemberDto> = response
            .json()
            .await
            .context("Failed to parse members response")?;

        Ok(members.into_iter().map(MemberDto::into_member).collect())
    }
}

#[async_trait]
impl PresenceSource for HttpPollingSource {
    async fn list_members(&self) -> Result<Vec<ChannelMember>> {
        self.fetch_members().await
    }

    async fn next_events(&mut self) -> Result<Vec<PresenceEvent>> {
        tokio::time::sleep(self.poll_interval).await;

        let members = self.fetch_members().await?;
        let current: BTreeMap<String, String> = members
            .into_iter()
            .map(|m| (m.identity, m.display_name))
            .collect();

        let now = Utc::now();
        let events = match &self.last_roster {
            Some(previous) => diff_rosters(previous, &current, now),
            // first poll: everyone present counts as joining now
            None => current
                .iter()
                .map(|(identity, display_name)| PresenceEvent::Join {
                    identity: identity.clone(),
                    display_name: display_name.clone(),
                    at: now,
                })
                .collect(),
        };

        debug!("Presence poll produced {} events", events.len());
        self.last_roster = Some(current);
        Ok(events)
    }
}

/// Turn two successive member maps into presence events. Pure, so the
/// diffing rules are testable without a server.
pub fn diff_rosters(
    previous: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
    at: DateTime<Utc>,
) -> Vec<PresenceEvent> {
    let mut events = Vec::new();

    for (identity, display_name) in current {
        if previous.contains_key(identity) {
            events.push(PresenceEvent::Heartbeat {
                identity: identity.clone(),
                at,
            });
        } else {
            events.push(PresenceEvent::Join {
                identity: identity.clone(),
                display_name: display_name.clone(),
                at,
            });
        }
    }

    for identity in previous.keys() {
        if !current.contains_key(identity) {
            events.push(PresenceEvent::Leave {
                identity: identity.clone(),
                at,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn roster(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect()
    }

    #[test]
    fn test_newcomer_is_join() {
        let events = diff_rosters(&roster(&[]), &roster(&[("u1", "Jinshi")]), at());
        assert_eq!(
            events,
            vec![PresenceEvent::Join {
                identity: "u1".into(),
                display_name: "Jinshi".into(),
                at: at(),
            }]
        );
    }

    #[test]
    fn test_missing_member_is_leave() {
        let events = diff_rosters(&roster(&[("u1", "Jinshi")]), &roster(&[]), at());
        assert_eq!(
            events,
            vec![PresenceEvent::Leave {
                identity: "u1".into(),
                at: at(),
            }]
        );
    }

    #[test]
    fn test_unchanged_member_is_heartbeat() {
        let events = diff_rosters(
            &roster(&[("u1", "Jinshi")]),
            &roster(&[("u1", "Jinshi")]),
            at(),
        );
        assert_eq!(
            events,
            vec![PresenceEvent::Heartbeat {
                identity: "u1".into(),
                at: at(),
            }]
        );
    }

    #[test]
    fn test_mixed_diff() {
        let events = diff_rosters(
            &roster(&[("u1", "Jinshi"), ("u2", "Mori")]),
            &roster(&[("u2", "Mori"), ("u3", "Talin")]),
            at(),
        );
        // BTreeMap keys iterate sorted, so the order is deterministic
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], PresenceEvent::Heartbeat { identity, .. } if identity == "u2"));
        assert!(matches!(&events[1], PresenceEvent::Join { identity, .. } if identity == "u3"));
        assert!(matches!(&events[2], PresenceEvent::Leave { identity, .. } if identity == "u1"));
    }

    #[test]
    fn test_member_dto_display_fallbacks() {
        let dto = MemberDto {
            id: "u1".into(),
            display_name: None,
            username: Some("jin".into()),
        };
        assert_eq!(dto.into_member().display_name, "jin");

        let dto = MemberDto {
            id: "u1".into(),
            display_name: Some(String::new()),
            username: None,
        };
        assert_eq!(dto.into_member().display_name, "u1");
    }
}
