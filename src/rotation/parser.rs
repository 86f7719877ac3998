//! Event-list line grammar.
//!
//! Uploaded boss lists are free text, one event per line:
//! `BossName - 2025-11-04 14:30`, `BossName 14:30`, or just `BossName`.
//! A line with no recognizable time token is kept, not dropped: it gets the
//! named fallback spawn (`now + offset`) and is flagged so callers can report
//! partial success instead of silently defaulting.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedEvent {
    pub name: String,
    pub spawn_at: DateTime<Utc>,
    /// True when no time token was found and the fallback policy applied.
    pub fallback: bool,
}

pub struct EventLineParser {
    datetime_re: Regex,
    time_re: Regex,
}

const UNNAMED_EVENT: &str = "Unknown Boss";

impl EventLineParser {
    pub fn new() -> Result<Self> {
        // Matches "2025-11-04 14:30", "2025/11/4T9:05" and friends
        let datetime_re =
            Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})[T ](\d{1,2}):(\d{2})")?;
        // Bare wall-clock time like "14:30"; hour 00-23, minutes 00-59
        let time_re = Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b")?;
        Ok(Self {
            datetime_re,
            time_re,
        })
    }

    /// Parse every non-empty line of `text`. Never fails the batch: a line
    /// whose time token is missing or invalid falls back to
    /// `now + fallback_offset` with `fallback: true`.
    pub fn parse(&self, text: &str, now: DateTime<Utc>, fallback_offset: Duration) -> Vec<ParsedEvent> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| self.parse_line(line, now, fallback_offset))
            .collect()
    }

    fn parse_line(&self, line: &str, now: DateTime<Utc>, fallback_offset: Duration) -> ParsedEvent {
        let (remainder, spawn_at) = self.extract_spawn(line, now);
        let fallback = spawn_at.is_none();
        let name = clean_name(&remainder);
        ParsedEvent {
            name: if name.is_empty() {
                UNNAMED_EVENT.to_string()
            } else {
                name
            },
            spawn_at: spawn_at.unwrap_or(now + fallback_offset),
            fallback,
        }
    }

    /// Returns the line minus any recognized time token, and the spawn
    /// instant if one parsed. Tried in order: full date-time, bare time on
    /// `now`'s date.
    fn extract_spawn(&self, line: &str, now: DateTime<Utc>) -> (String, Option<DateTime<Utc>>) {
        if let Some(caps) = self.datetime_re.captures(line) {
            let parsed = build_datetime(
                caps[1].parse().ok(),
                caps[2].parse().ok(),
                caps[3].parse().ok(),
                caps[4].parse().ok(),
                caps[5].parse().ok(),
            );
            if let Some(at) = parsed {
                return (line.replacen(&caps[0], "", 1), Some(at));
            }
        }

        if let Some(caps) = self.time_re.captures(line) {
            let time = NaiveTime::from_hms_opt(
                caps[1].parse().unwrap_or(0),
                caps[2].parse().unwrap_or(0),
                0,
            );
            if let Some(time) = time {
                return (line.replacen(&caps[0], "", 1), Some(time_on(now, time)));
            }
        }

        (line.to_string(), None)
    }
}

/// Bare wall-clock times are interpreted on `now`'s (UTC) date.
fn time_on(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    now.date_naive().and_time(time).and_utc()
}

fn build_datetime(
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year?, month?, day?)?;
    let time = NaiveTime::from_hms_opt(hour?, minute?, 0)?;
    Some(date.and_time(time).and_utc())
}

/// Strip separator punctuation left behind once the time token is removed.
fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '-' | '–' | '—' | ':' | ',' | '|'))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 12, 0, 0).unwrap()
    }

    fn offset() -> Duration {
        Duration::hours(1)
    }

    fn parser() -> EventLineParser {
        EventLineParser::new().unwrap()
    }

    #[test]
    fn test_full_datetime_line() {
        let events = parser().parse("Kutum - 2025-11-04 14:30", now(), offset());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Kutum");
        assert_eq!(
            events[0].spawn_at,
            Utc.with_ymd_and_hms(2025, 11, 4, 14, 30, 0).unwrap()
        );
        assert!(!events[0].fallback);
    }

    #[test]
    fn test_slash_separated_date() {
        let events = parser().parse("Karanda 2025/11/05 03:15", now(), offset());
        assert_eq!(
            events[0].spawn_at,
            Utc.with_ymd_and_hms(2025, 11, 5, 3, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_bare_time_uses_todays_date() {
        let events = parser().parse("Golmodu 14:30", now(), offset());
        assert_eq!(events[0].name, "Golmodu");
        assert_eq!(
            events[0].spawn_at,
            Utc.with_ymd_and_hms(2025, 11, 4, 14, 30, 0).unwrap()
        );
        assert!(!events[0].fallback);
    }

    #[test]
    fn test_no_time_token_applies_fallback_and_flags() {
        let events = parser().parse("Mysterious Boss", now(), offset());
        assert_eq!(events[0].name, "Mysterious Boss");
        assert_eq!(events[0].spawn_at, now() + Duration::hours(1));
        assert!(events[0].fallback);
    }

    #[test]
    fn test_invalid_calendar_date_degrades_to_bare_time() {
        // month 13 survives the regex but not the calendar; the bare-time
        // rule still salvages "10:00" on today's date
        let events = parser().parse("Vell 2025-13-01 10:00", now(), offset());
        assert!(!events[0].fallback);
        assert_eq!(
            events[0].spawn_at,
            Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_unparseable_time_falls_back() {
        let events = parser().parse("Vell 29:99", now(), offset());
        assert!(events[0].fallback);
        assert_eq!(events[0].spawn_at, now() + Duration::hours(1));
    }

    #[test]
    fn test_nameless_line_gets_placeholder() {
        let events = parser().parse("2025-11-04 14:30", now(), offset());
        assert_eq!(events[0].name, UNNAMED_EVENT);
    }

    #[test]
    fn test_batch_never_fails_and_keeps_order() {
        let text = "Kutum - 14:30\n\nNoTimeBoss\nKaranda 2025-11-05 03:15\n";
        let events = parser().parse(text, now(), offset());
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Kutum", "NoTimeBoss", "Karanda"]);
        let fallbacks: Vec<_> = events.iter().map(|e| e.fallback).collect();
        assert_eq!(fallbacks, vec![false, true, false]);
    }

    #[test]
    fn test_separator_punctuation_stripped_from_name() {
        let events = parser().parse("Nouver — 22:00", now(), offset());
        assert_eq!(events[0].name, "Nouver");
    }
}
