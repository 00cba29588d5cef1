//! The pluggable speech sink interface (§6) and two concrete adapters.
//!
//! Grounded on `fae::tts::ChatterboxTts`'s shape (`synthesize`,
//! `sample_rate`) generalized into a trait, per design note §9: "the core
//! is written against the abstract sink interface only... environment
//! selection becomes a... choice of adapter."

pub mod browser_bridge;
pub mod os_command;

use crate::error::Result;
use crate::utterance::Utterance;

/// One utterance handed to a sink. `on_complete` must be invoked exactly
/// once, whether delivery succeeded or failed (§6). Implementations must
/// not call back synchronously into the engine from within `on_complete`
/// (§5 reentrancy rule) — if a sink needs to raise a fault of its own, it
/// must defer at least one scheduler tick.
pub trait SinkAdapter: Send + Sync {
    /// Accept one utterance. Must invoke `on_complete` exactly once.
    fn deliver(&self, utterance: &Utterance, on_complete: Box<dyn FnOnce(Result<()>) + Send>);

    /// Best-effort abort of any in-flight utterance. No-op if nothing is
    /// in flight or the backend has no cancel affordance.
    fn cancel(&self);

    /// Enumerate available voice identifiers. Empty if the backend can't
    /// enumerate them.
    fn list_voices(&self) -> Vec<String>;

    /// Whether this sink can presently render speech. Defaults to `true`;
    /// a real backend only needs to override this if it has a genuine
    /// not-ready state (not yet connected, device unavailable, ...).
    /// `Engine::get_status` surfaces this as `sink_ready` (§4.5/§7: "sink
    /// absent / not ready").
    fn is_ready(&self) -> bool {
        true
    }
}

/// A sink that exists solely for tests and for "sink absent / not ready"
/// semantics (§7): it drops every utterance without delivering it, but
/// still lets `handle_fault` run classification, humanization, and
/// admission so the ledger records the attempt. Always reports
/// `is_ready() == false`, since it stands in for "no sink configured".
#[derive(Debug, Default)]
pub struct NullSink;

impl SinkAdapter for NullSink {
    fn deliver(&self, _utterance: &Utterance, on_complete: Box<dyn FnOnce(Result<()>) + Send>) {
        on_complete(Ok(()));
    }

    fn cancel(&self) {}

    fn list_voices(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_ready(&self) -> bool {
        false
    }
}
