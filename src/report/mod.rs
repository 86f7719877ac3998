//! Attendance report composition and rendering.
//!
//! `compose` is deterministic given identical inputs and makes no external
//! calls; publishing (and the advance-plus-buffer-clear that follows it) is
//! the engine's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::{self, DetectedNameToken, MatchVerdict, PresenceVerdict, Subject};
use crate::presence::RosterEntry;
use crate::rotation::EventEntry;

pub mod sink;

pub use sink::{DisabledSink, ReportSink, WebhookSink};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub event_id: Option<String>,
    pub event_name: String,
    pub generated_at: DateTime<Utc>,
    pub verdicts: Vec<MatchVerdict>,
    pub raw_tokens: Vec<String>,
}

/// The last successfully pushed report, kept for the UI and the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedReport {
    pub content: String,
    pub pushed_at: DateTime<Utc>,
}

pub fn compose(
    active: Option<&EventEntry>,
    tokens: &[DetectedNameToken],
    roster: &[RosterEntry],
    now: DateTime<Utc>,
) -> AttendanceReport {
    AttendanceReport {
        event_id: active.map(|e| e.id.clone()),
        event_name: active
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "No active boss".to_string()),
        generated_at: now,
        verdicts: matching::reconcile(tokens, roster),
        raw_tokens: tokens.iter().map(|t| t.raw_text.clone()).collect(),
    }
}

/// Render the report as the markdown message pushed to the sink.
pub fn render(report: &AttendanceReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "**Boss Attendance Report — {}**",
        report.event_name
    ));
    lines.push(format!(
        "Date: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(String::new());

    if report.raw_tokens.is_empty() {
        lines.push("_No attendance names detected_".to_string());
    } else {
        lines.push("**Detected from image:**".to_string());
        for (i, token) in report.raw_tokens.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, token));
        }
    }
    lines.push(String::new());

    let mut present = Vec::new();
    let mut absent = Vec::new();
    for verdict in &report.verdicts {
        match (&verdict.subject, verdict.presence) {
            (Subject::Identity { display_name, .. }, PresenceVerdict::Present) => {
                present.push(display_name.clone());
            }
            (Subject::Identity { display_name, .. }, _) => {
                absent.push(format!("{display_name} (in voice, not in image)"));
            }
            (Subject::Token { raw_text }, _) => {
                absent.push(format!("{raw_text} (detected, absent from voice)"));
            }
        }
    }

    lines.push("**Present (in voice & matched):**".to_string());
    if present.is_empty() {
        lines.push("_None_".to_string());
    } else {
        for (i, name) in present.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, name));
        }
    }

    lines.push(String::new());
    lines.push("**Absent / mismatches:**".to_string());
    if absent.is_empty() {
        lines.push("_None_".to_string());
    } else {
        for (i, name) in absent.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, name));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::EventStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 14, 30, 0).unwrap()
    }

    fn event() -> EventEntry {
        EventEntry {
            id: "ev1".into(),
            name: "Kutum".into(),
            spawn_at: now(),
            status: EventStatus::Active,
        }
    }

    fn roster_one(name: &str) -> Vec<RosterEntry> {
        vec![RosterEntry {
            identity: "u1".into(),
            display_name: name.into(),
            duration_secs: 120,
        }]
    }

    #[test]
    fn test_compose_is_deterministic() {
        let tokens = vec![DetectedNameToken::from_raw("Jin shi")];
        let roster = roster_one("Jinshi");
        let a = compose(Some(&event()), &tokens, &roster, now());
        let b = compose(Some(&event()), &tokens, &roster, now());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_compose_without_active_event() {
        let report = compose(None, &[], &[], now());
        assert!(report.event_id.is_none());
        assert_eq!(report.event_name, "No active boss");
    }

    #[test]
    fn test_render_sections() {
        let tokens = vec![
            DetectedNameToken::from_raw("Jin shi"),
            DetectedNameToken::from_raw("Ghost"),
        ];
        let roster = roster_one("Jinshi");
        let rendered = render(&compose(Some(&event()), &tokens, &roster, now()));

        assert!(rendered.contains("Boss Attendance Report — Kutum"));
        assert!(rendered.contains("1. Jin shi"));
        assert!(rendered.contains("1. Jinshi"));
        assert!(rendered.contains("Ghost (detected, absent from voice)"));
    }

    #[test]
    fn test_render_empty_report() {
        let rendered = render(&compose(None, &[], &[], now()));
        assert!(rendered.contains("_No attendance names detected_"));
        assert!(rendered.contains("_None_"));
    }
}
