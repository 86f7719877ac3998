//! Name normalization for OCR/roster reconciliation.
//!
//! OCR output and chat display names disagree on case, spacing, punctuation,
//! and width (game UIs love full-width Latin). Both sides are reduced to
//! comparable keys here before any matching happens.

use unicode_normalization::UnicodeNormalization;

/// Minimum length for a key fragment; shorter runs are OCR noise.
const MIN_FRAGMENT_LEN: usize = 2;

/// Script category of a single character, for run splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptClass {
    Han,
    Kana,
    Hangul,
    Digit,
    Alpha,
}

fn classify(c: char) -> Option<ScriptClass> {
    if c.is_numeric() {
        return Some(ScriptClass::Digit);
    }
    if !c.is_alphabetic() {
        return None;
    }
    let cp = c as u32;
    match cp {
        // CJK Unified Ideographs, extensions, and compatibility block
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2FA1F | 0xF900..=0xFAFF => {
            Some(ScriptClass::Han)
        }
        // Hiragana + Katakana (incl. phonetic extensions)
        0x3040..=0x30FF | 0x31F0..=0x31FF => Some(ScriptClass::Kana),
        // Hangul syllables and jamo
        0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F => Some(ScriptClass::Hangul),
        _ => Some(ScriptClass::Alpha),
    }
}

/// Reduce a raw name to a single comparable key: NFKC fold, lowercase, and
/// drop everything that is not alphanumeric. Used for the roster side, where
/// one display name yields exactly one key.
pub fn normalize_key(raw: &str) -> String {
    raw.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Canonicalize a free-text token into an ordered list of candidate keys.
///
/// A token in a single script yields one key. A token mixing script classes
/// (e.g. a CJK guild tag glued onto a Latin name) is split at the boundaries
/// between contiguous same-script runs. Fragments shorter than
/// `MIN_FRAGMENT_LEN` or consisting only of digits are discarded. All-symbol
/// or empty input yields an empty list, never an error.
///
/// Idempotent: every returned key is a single-script run, so re-normalizing
/// a key yields that key back.
pub fn normalize(raw: &str) -> Vec<String> {
    let cleaned = normalize_key(raw);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut runs: Vec<(ScriptClass, String)> = Vec::new();
    for c in cleaned.chars() {
        let class = match classify(c) {
            Some(class) => class,
            None => continue,
        };
        match runs.last_mut() {
            Some((last, run)) if *last == class => run.push(c),
            _ => runs.push((class, c.to_string())),
        }
    }

    let mut keys: Vec<String> = Vec::new();
    for (class, run) in runs {
        if class == ScriptClass::Digit {
            continue;
        }
        if run.chars().count() < MIN_FRAGMENT_LEN {
            continue;
        }
        if !keys.contains(&run) {
            keys.push(run);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips() {
        assert_eq!(normalize("Jin shi"), vec!["jinshi"]);
        assert_eq!(normalize("  Mori-gon  "), vec!["morigon"]);
        assert_eq!(normalize_key("Jin Shi!"), "jinshi");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Jin shi", "小龙Dragon", "カタカナ", "PlainName"] {
            for key in normalize(raw) {
                assert_eq!(normalize(&key), vec![key.clone()], "key {key:?} not stable");
            }
        }
    }

    #[test]
    fn test_mixed_script_splits_at_run_boundaries() {
        assert_eq!(normalize("小龙Dragon"), vec!["小龙", "dragon"]);
        assert_eq!(normalize("Dragon小龙王"), vec!["dragon", "小龙王"]);
    }

    #[test]
    fn test_short_and_digit_fragments_discarded() {
        // single trailing ideograph is below the fragment minimum
        assert_eq!(normalize("Dragon龙"), vec!["dragon"]);
        // digit run is dropped, alpha run survives
        assert_eq!(normalize("slayer99"), vec!["slayer"]);
        assert_eq!(normalize("99"), Vec::<String>::new());
    }

    #[test]
    fn test_symbols_and_empty_yield_empty() {
        assert_eq!(normalize(""), Vec::<String>::new());
        assert_eq!(normalize("___"), Vec::<String>::new());
        assert_eq!(normalize("!!! ---"), Vec::<String>::new());
    }

    #[test]
    fn test_fullwidth_folds_to_ascii() {
        // full-width Latin from OCR compares equal to the plain form
        assert_eq!(normalize("Ｊｉｎｓｈｉ"), vec!["jinshi"]);
    }

    #[test]
    fn test_kana_and_hangul_are_distinct_runs() {
        assert_eq!(normalize("田中たろう"), vec!["田中", "たろう"]);
        assert_eq!(normalize("김철수kim"), vec!["김철수", "kim"]);
    }
}
