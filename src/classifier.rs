//! Maps a raw fault to a `(kind, severity)` pair and computes the stable
//! key used for per-error rate limiting.
//!
//! See spec.md §4.1. `classify` itself is pure and depends only on the
//! fault and config, as required; the stable key is a function of the
//! *humanized* text and is therefore computed separately, once the
//! Humanizer has run (§4.1: "because it is computed from the final text,
//! two faults with different raw messages that humanize to the same
//! sentence share cooldowns — this is intentional").

use crate::config::Config;
use crate::fault::Fault;
use std::hash::{Hash, Hasher};

/// Case-insensitive substrings that cause an unconditional drop, checked
/// before the Humanizer ever runs.
pub const ALWAYS_IGNORE_PATTERNS: &[&str] = &[
    "ResizeObserver loop limit exceeded",
    "Non-Error promise rejection captured with value",
    "Loading chunk",
    "ChunkLoadError",
];

const CRITICAL_SUBSTRINGS: &[&str] = &["module not found", "failed to fetch"];
const CRITICAL_KINDS: &[&str] = &["ReferenceError", "SyntaxError"];

/// Severity bucket, assigned by the first matching rule in spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Normal,
}

/// `(kind, severity)` — the stable key is attached later by
/// [`finalize`] once the Humanizer has produced the utterance text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: String,
    pub severity: Severity,
}

/// Returns true if `text` contains any always-ignore pattern (case
/// insensitive substring match).
pub fn is_always_ignored(text: &str) -> bool {
    let lower = text.to_lowercase();
    ALWAYS_IGNORE_PATTERNS
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
}

/// Classify a fault. Pure: depends only on `fault` and `config`.
pub fn classify(fault: &Fault, _config: &Config) -> Classification {
    let kind = fault.kind.clone().unwrap_or_else(|| "Error".to_string());
    let message = fault.message_source();
    let lower = message.to_lowercase();

    let severity = if CRITICAL_KINDS.contains(&kind.as_str())
        || CRITICAL_SUBSTRINGS.iter().any(|s| lower.contains(s))
    {
        Severity::Critical
    } else if is_always_ignored(&message) {
        Severity::Warning
    } else {
        Severity::Normal
    };

    Classification { kind, severity }
}

/// A finalized classification, with the stable key computed from the
/// humanized text (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalClassification {
    pub kind: String,
    pub severity: Severity,
    pub stable_key: u64,
}

/// Attach a stable key to a provisional classification, once the final
/// (humanized) text is known.
pub fn finalize(classification: Classification, humanized_text: &str) -> FinalClassification {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    humanized_text.hash(&mut hasher);
    classification.kind.hash(&mut hasher);
    FinalClassification {
        kind: classification.kind,
        severity: classification.severity,
        stable_key: hasher.finish(),
    }
}
