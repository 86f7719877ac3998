//! Attendance reconciliation: OCR tokens vs the live voice roster.
//!
//! `reconcile` is a pure function: no clock, no I/O, no state. Given the
//! same tokens and roster it always produces the same verdicts.

use serde::{Deserialize, Serialize};

use crate::normalizer;
use crate::presence::RosterEntry;

/// A free-text name pulled out of an OCR batch, with its candidate keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedNameToken {
    pub raw_text: String,
    pub keys: Vec<String>,
}

impl DetectedNameToken {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw_text = raw.into();
        let keys = normalizer::normalize(&raw_text);
        Self { raw_text, keys }
    }
}

/// Extract detected name tokens from a raw OCR text block, one per non-empty
/// line, deduplicated by raw text. Lines that normalize to nothing (pure
/// noise) are dropped.
pub fn tokens_from_text(text: &str) -> Vec<DetectedNameToken> {
    let mut seen: Vec<String> = Vec::new();
    let mut tokens = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || seen.iter().any(|s| s.as_str() == line) {
            continue;
        }
        seen.push(line.to_string());
        let token = DetectedNameToken::from_raw(line);
        if !token.keys.is_empty() {
            tokens.push(token);
        }
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceVerdict {
    Present,
    Absent,
    Unknown,
}

/// Who a verdict is about: a tracked roster identity, or a detected token
/// that matched nobody in voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Subject {
    Identity {
        identity: String,
        display_name: String,
    },
    Token {
        raw_text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub subject: Subject,
    pub presence: PresenceVerdict,
    /// What the subject matched against: the detected raw text for an
    /// identity, the display name for a token. None when unmatched.
    pub matched_against: Option<String>,
}

fn containment(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Reconcile detected tokens against the roster snapshot.
///
/// A roster identity is Present when any candidate key of any token is a
/// bidirectional-substring match against the identity's normalized display
/// key. The first containment match in token order wins; there is no scoring
/// beyond containment (deliberate simplification, kept from the original
/// behavior). Tokens that matched no identity are reported as detected but
/// not present; identities matched by no token as present but undetected.
pub fn reconcile(tokens: &[DetectedNameToken], roster: &[RosterEntry]) -> Vec<MatchVerdict> {
    let mut verdicts = Vec::with_capacity(roster.len() + tokens.len());
    let mut token_matched = vec![false; tokens.len()];

    for entry in roster {
        let roster_key = normalizer::normalize_key(&entry.display_name);
        let subject = Subject::Identity {
            identity: entry.identity.clone(),
            display_name: entry.display_name.clone(),
        };

        if roster_key.is_empty() {
            verdicts.push(MatchVerdict {
                subject,
                presence: PresenceVerdict::Unknown,
                matched_against: None,
            });
            continue;
        }

        let hit = tokens.iter().enumerate().find(|(_, token)| {
            token.keys.iter().any(|key| containment(key, &roster_key))
        });

        match hit {
            Some((idx, token)) => {
                token_matched[idx] = true;
                verdicts.push(MatchVerdict {
                    subject,
                    presence: PresenceVerdict::Present,
                    matched_against: Some(token.raw_text.clone()),
                });
            }
            None => verdicts.push(MatchVerdict {
                subject,
                presence: PresenceVerdict::Absent,
                matched_against: None,
            }),
        }
    }

    for (idx, token) in tokens.iter().enumerate() {
        if token_matched[idx] {
            continue;
        }
        verdicts.push(MatchVerdict {
            subject: Subject::Token {
                raw_text: token.raw_text.clone(),
            },
            presence: PresenceVerdict::Absent,
            matched_against: None,
        });
    }

    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[(&str, &str)]) -> Vec<RosterEntry> {
        names
            .iter()
            .map(|(id, name)| RosterEntry {
                identity: id.to_string(),
                display_name: name.to_string(),
                duration_secs: 0,
            })
            .collect()
    }

    fn tokens(raw: &[&str]) -> Vec<DetectedNameToken> {
        raw.iter().map(|r| DetectedNameToken::from_raw(*r)).collect()
    }

    #[test]
    fn test_spaced_ocr_token_matches_identity() {
        // "Jin shi" from OCR vs registered "Jinshi"
        let verdicts = reconcile(&tokens(&["Jin shi"]), &roster(&[("1", "Jinshi")]));
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].presence, PresenceVerdict::Present);
        assert_eq!(verdicts[0].matched_against.as_deref(), Some("Jin shi"));
    }

    #[test]
    fn test_containment_works_both_directions() {
        // detected key shorter than roster key
        let v = reconcile(&tokens(&["Drag"]), &roster(&[("1", "DragonSlayer")]));
        assert_eq!(v[0].presence, PresenceVerdict::Present);
        // detected key longer than roster key
        let v = reconcile(&tokens(&["DragonSlayerX"]), &roster(&[("1", "Dragon")]));
        assert_eq!(v[0].presence, PresenceVerdict::Present);
    }

    #[test]
    fn test_first_match_wins() {
        let v = reconcile(
            &tokens(&["Dragon", "DragonSlayer"]),
            &roster(&[("1", "DragonSlayer")]),
        );
        // both tokens contain-match; the earlier one is reported
        assert_eq!(v[0].matched_against.as_deref(), Some("Dragon"));
    }

    #[test]
    fn test_unmatched_sides_reported() {
        let v = reconcile(&tokens(&["Ghost"]), &roster(&[("1", "Jinshi")]));
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].presence, PresenceVerdict::Absent); // Jinshi undetected
        match &v[1].subject {
            Subject::Token { raw_text } => assert_eq!(raw_text, "Ghost"),
            other => panic!("expected token subject, got {other:?}"),
        }
    }

    #[test]
    fn test_pure_and_repeatable() {
        let t = tokens(&["Jin shi", "Ghost", "小龙Dragon"]);
        let r = roster(&[("1", "Jinshi"), ("2", "Mori"), ("3", "小龙王")]);
        let first = reconcile(&t, &r);
        for _ in 0..5 {
            let again = reconcile(&t, &r);
            assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&again).unwrap());
        }
    }

    #[test]
    fn test_mixed_script_fragment_matches() {
        // the CJK fragment of a glued token matches a CJK roster name
        let v = reconcile(&tokens(&["小龙Dragon"]), &roster(&[("1", "小龙王")]));
        assert_eq!(v[0].presence, PresenceVerdict::Present);
    }

    #[test]
    fn test_unnormalizable_display_name_is_unknown() {
        let v = reconcile(&tokens(&["Jinshi"]), &roster(&[("1", "!!!")]));
        assert_eq!(v[0].presence, PresenceVerdict::Unknown);
    }

    #[test]
    fn test_tokens_from_text_dedups_and_drops_noise() {
        let toks = tokens_from_text("Jinshi\n\nJinshi\n---\nMori\n");
        let raw: Vec<_> = toks.iter().map(|t| t.raw_text.as_str()).collect();
        assert_eq!(raw, vec!["Jinshi", "Mori"]);
    }
}
