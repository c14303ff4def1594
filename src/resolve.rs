//! Fuzzy matching of free-form values against a property's allowed options.
//!
//! Tiers, first match wins:
//! 1. Case-insensitive exact match
//! 2. Substring containment in either direction
//! 3. Whitespace-token overlap
//! 4. Synonym table for idiomatic phrasings substring logic cannot catch
//!
//! Exact and substring checks catch the overwhelming majority of real
//! inputs; the synonym table stays small on purpose.

/// Ordered synonym rows: phrasing contained in the candidate → canonical
/// token looked up in the allowed options. New phrasings are data changes.
const SYNONYMS: &[(&str, &str)] = &[
    ("on hold", "paused"),
    ("on hold", "hold"),
    ("hold", "paused"),
    ("paused", "on hold"),
    ("paused", "hold"),
    ("blocked", "paused"),
    ("blocked", "hold"),
    ("ready", "production"),
    ("ready", "ready"),
    ("done", "done"),
    ("done", "complete"),
    ("done", "published"),
    ("finished", "done"),
    ("finished", "complete"),
    ("complete", "done"),
    ("in progress", "progress"),
    ("in progress", "editing"),
    ("working", "progress"),
    ("working", "editing"),
    ("wip", "progress"),
    ("review", "review"),
];

/// Tokens shorter than this only count as overlap on exact equality, so
/// fragments like "on" cannot land inside unrelated options.
const MIN_CONTAINMENT_TOKEN: usize = 3;

/// Resolve a candidate value against the allowed options.
///
/// Returns `None` when no tier matches; the caller logs a warning and falls
/// back to writing the literal candidate rather than dropping the change.
pub fn resolve(candidate: &str, options: &[String]) -> Option<String> {
    let needle = normalize(candidate);
    if needle.is_empty() || options.is_empty() {
        return None;
    }

    // 1. Exact
    for option in options {
        if normalize(option) == needle {
            return Some(option.clone());
        }
    }

    // 2. Containment either direction
    for option in options {
        let normalized = normalize(option);
        if normalized.contains(&needle) || needle.contains(&normalized) {
            return Some(option.clone());
        }
    }

    // 3. Token overlap
    for option in options {
        let normalized = normalize(option);
        let option_tokens: Vec<&str> = normalized.split(' ').collect();
        for token in needle.split(' ') {
            let overlaps = option_tokens.iter().any(|other| {
                token == *other
                    || (token.len() >= MIN_CONTAINMENT_TOKEN
                        && other.len() >= MIN_CONTAINMENT_TOKEN
                        && (other.contains(token) || token.contains(other)))
            });
            if overlaps {
                return Some(option.clone());
            }
        }
    }

    // 4. Synonym table
    for (phrasing, canonical) in SYNONYMS {
        if !needle.contains(phrasing) {
            continue;
        }
        for option in options {
            if normalize(option).contains(canonical) {
                return Some(option.clone());
            }
        }
    }

    None
}

/// Lowercase, trim, collapse runs of whitespace to single spaces.
fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let opts = options(&["VA Render", "Editing"]);
        assert_eq!(resolve("va render", &opts).as_deref(), Some("VA Render"));
    }

    #[test]
    fn containment_matches_both_directions() {
        let opts = options(&["Ready For Captions", "Editing"]);
        assert_eq!(
            resolve("captions", &opts).as_deref(),
            Some("Ready For Captions")
        );
        assert_eq!(
            resolve("please move to editing now", &opts).as_deref(),
            Some("Editing")
        );
    }

    #[test]
    fn token_overlap_catches_shared_words() {
        let opts = options(&["Final Render Queue", "Scripting"]);
        assert_eq!(
            resolve("render pass", &opts).as_deref(),
            Some("Final Render Queue")
        );
    }

    #[test]
    fn synonym_table_maps_on_hold_to_paused() {
        let opts = options(&["Paused", "Active"]);
        assert_eq!(resolve("ON HOLD", &opts).as_deref(), Some("Paused"));
        assert_eq!(resolve("on   hold", &opts).as_deref(), Some("Paused"));
    }

    #[test]
    fn synonym_table_maps_done_to_completion_option() {
        let opts = options(&["Published", "Editing"]);
        assert_eq!(resolve("done", &opts).as_deref(), Some("Published"));
    }

    #[test]
    fn unmatched_candidate_returns_none() {
        let opts = options(&["Paused", "Active"]);
        assert_eq!(resolve("quantum flux", &opts), None);
    }

    #[test]
    fn short_token_fragments_do_not_false_match() {
        // "on" must not land inside "Production".
        let opts = options(&["Production", "Paused"]);
        assert_eq!(resolve("on hold", &opts).as_deref(), Some("Paused"));
    }

    #[test]
    fn empty_inputs_resolve_to_none() {
        assert_eq!(resolve("  ", &options(&["Paused"])), None);
        assert_eq!(resolve("paused", &[]), None);
    }
}
