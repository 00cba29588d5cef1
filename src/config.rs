//! Configuration snapshot for the narration engine.
//!
//! `Config` is held by the engine as an immutable snapshot and replaced
//! atomically via [`crate::engine::Engine::update_config`]. It is a plain
//! `serde`-deserializable struct (`#[serde(default)]` throughout) so a host
//! can load it from whatever format it likes; the core never reads or
//! writes a config file itself (§6: no on-disk format).

use serde::{Deserialize, Serialize};

/// Prosody parameters attached to an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prosody {
    /// Speech rate multiplier. 1.0 is the sink's default rate.
    pub rate: f32,
    /// Pitch multiplier. Sinks without pitch control may ignore this.
    pub pitch: f32,
    /// Volume, 0.0–1.0. Sinks without volume control may ignore this.
    pub volume: f32,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Admission filters (§3 `filters.*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// Case-insensitive substrings; any match on the utterance text causes
    /// a drop.
    pub ignore_patterns: Vec<String>,
    /// When non-empty, at least one must match the utterance text (case
    /// insensitive substring) or the fault is dropped.
    pub only_patterns: Vec<String>,
    /// When non-empty, the classification's `kind` must be a member.
    pub error_kinds: Vec<String>,
}

/// Immutable configuration snapshot. See spec.md §3 for the option table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master gate. When false, `handle_fault` short-circuits.
    pub enabled: bool,
    /// Preferred voice (name or language tag). Advisory; sinks may ignore it.
    pub voice: Option<String>,
    /// Base prosody applied to admitted utterances.
    pub prosody: Prosody,
    /// Hard upper bound on utterance text length, in code points.
    pub max_message_length: usize,
    /// Base cooldown window, used for both the global and per-key gates.
    pub cooldown_ms: u64,
    /// If false, skip the Humanizer and speak the raw message.
    pub humanize: bool,
    /// If humanization fails, fall back to the cleaned raw message rather
    /// than dropping the fault.
    pub fallback_to_raw: bool,
    /// Whether to append `" in <file> at line <n>"` from the top stack
    /// frame when no pattern rule matched (§4.2 step 3).
    pub include_location: bool,
    /// Admission filters.
    pub filters: Filters,
    /// Emit diagnostic traces to `tracing` at `trace` level.
    pub debug: bool,
    /// If true, the facade installs host-wide fault hooks on construction.
    pub auto_setup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            voice: None,
            prosody: Prosody::default(),
            max_message_length: 200,
            cooldown_ms: 5_000,
            humanize: true,
            fallback_to_raw: true,
            include_location: true,
            filters: Filters::default(),
            debug: false,
            auto_setup: false,
        }
    }
}

/// A partial config update, as passed to
/// [`crate::engine::Engine::update_config`]. Every field is optional; a
/// `None` leaves the corresponding `Config` field untouched. Unknown keys
/// (in whatever format a host deserializes this from) are ignored by
/// `serde`'s default behavior.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub voice: Option<Option<String>>,
    pub prosody: Option<Prosody>,
    pub max_message_length: Option<usize>,
    pub cooldown_ms: Option<u64>,
    pub humanize: Option<bool>,
    pub fallback_to_raw: Option<bool>,
    pub include_location: Option<bool>,
    pub filters: Option<Filters>,
    pub debug: Option<bool>,
    pub auto_setup: Option<bool>,
}

impl Config {
    /// Deep-merge a patch into a copy of this config and return the result.
    /// Never fails: a patch is always applicable, fields simply overwrite.
    #[must_use]
    pub fn merged(&self, patch: &ConfigPatch) -> Config {
        let mut next = self.clone();
        if let Some(v) = patch.enabled {
            next.enabled = v;
        }
        if let Some(v) = patch.voice.clone() {
            next.voice = v;
        }
        if let Some(v) = patch.prosody {
            next.prosody = v;
        }
        if let Some(v) = patch.max_message_length {
            next.max_message_length = v;
        }
        if let Some(v) = patch.cooldown_ms {
            next.cooldown_ms = v;
        }
        if let Some(v) = patch.humanize {
            next.humanize = v;
        }
        if let Some(v) = patch.fallback_to_raw {
            next.fallback_to_raw = v;
        }
        if let Some(v) = patch.include_location {
            next.include_location = v;
        }
        if let Some(v) = patch.filters.clone() {
            next.filters = v;
        }
        if let Some(v) = patch.debug {
            next.debug = v;
        }
        if let Some(v) = patch.auto_setup {
            next.auto_setup = v;
        }
        next
    }
}
