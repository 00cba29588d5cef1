//! Engine facade: orchestrates Classifier → Humanizer → Policy → Queue
//! and exposes the public operations (§4.5).
//!
//! Grounded on `fae::pipeline::coordinator::PipelineCoordinator`: one
//! struct owning all stage state, a small set of control operations,
//! config held as an `Arc` snapshot swapped atomically under a short
//! lock rather than held across any suspension point.

use crate::classifier::{self, Classification, Severity};
use crate::config::{Config, ConfigPatch};
use crate::error::{NarratorError, Result};
use crate::fault::Fault;
use crate::hooks::{self, PanicHookGuard};
use crate::humanizer;
use crate::policy::{self, Candidate};
use crate::queue::Queue;
use crate::sink::SinkAdapter;
use crate::utterance::Utterance;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

/// Snapshot returned by [`Engine::get_status`]. Beyond the §4.5 table
/// (`enabled`, `sink_ready`, `in_flight`, `pending`, `config`), this
/// carries `ledger_size` and `debug` for host-side diagnostics surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub enabled: bool,
    pub sink_ready: bool,
    pub in_flight: bool,
    pub pending: usize,
    pub config: Config,
    pub ledger_size: usize,
    pub debug: bool,
}

/// The narration engine. Exclusively owned by whatever constructs it
/// (typically held in an `Arc`); fault-source hooks installed via
/// `auto_setup` hold only a `Weak` reference back, so the engine can
/// still be torn down by dropping its last strong handle.
pub struct Engine {
    config: Mutex<Arc<Config>>,
    ledger: Mutex<policy::PolicyLedger>,
    queue: Queue,
    sink: Arc<dyn SinkAdapter>,
    hook_guard: Mutex<Option<PanicHookGuard>>,
}

impl Engine {
    /// Construct the engine. Never fails: unknown or malformed config
    /// is simply ignored (the `Config` type only ever holds valid
    /// values once deserialized). If `config.auto_setup` is set,
    /// installs the process panic hook.
    pub fn construct(config: Config, sink: Arc<dyn SinkAdapter>) -> Arc<Self> {
        let auto_setup = config.auto_setup;
        let engine = Arc::new(Self {
            config: Mutex::new(Arc::new(config)),
            ledger: Mutex::new(policy::PolicyLedger::new()),
            queue: Queue::new(sink.clone()),
            sink,
            hook_guard: Mutex::new(None),
        });
        if auto_setup {
            engine.install_hooks();
        }
        engine
    }

    fn install_hooks(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let guard = hooks::install_panic_hook(move |fault| {
            if let Some(engine) = weak.upgrade() {
                engine.handle_fault(fault);
            }
        });
        *self.hook_guard.lock().expect("engine mutex poisoned") = Some(guard);
    }

    /// Detach any installed hooks without tearing down the engine
    /// itself. Idempotent.
    pub fn uninstall_hooks(&self) {
        self.hook_guard.lock().expect("engine mutex poisoned").take();
    }

    fn snapshot_config(&self) -> Arc<Config> {
        self.config.lock().expect("engine mutex poisoned").clone()
    }

    /// Classify, humanize, apply Policy, and enqueue on admit. Returns
    /// synchronously; never suspends, never panics, never propagates
    /// an internal error to the caller.
    pub fn handle_fault(&self, fault: Fault) {
        let config = self.snapshot_config();
        if !config.enabled {
            return;
        }

        let message_source = fault.message_source();
        if classifier::is_always_ignored(&message_source) {
            debug!(message = %message_source, "dropping always-ignored fault");
            return;
        }

        let classification = classifier::classify(&fault, &config);

        let text = if config.humanize {
            match std::panic::catch_unwind(AssertUnwindSafe(|| {
                humanizer::humanize(&fault, &classification, &config)
            })) {
                Ok(text) => text,
                Err(payload) => {
                    let err = NarratorError::Humanize(panic_payload_message(&payload));
                    debug!(error = %err, "humanizer panicked on this fault");
                    if !config.fallback_to_raw {
                        return;
                    }
                    humanizer::truncate(&humanizer::clean(&message_source), config.max_message_length)
                }
            }
        } else {
            humanizer::truncate(&humanizer::clean(&message_source), config.max_message_length)
        };

        self.admit_and_enqueue(text, classification, &config);
    }

    /// Treat `text` as already-humanized: bypasses Classifier and
    /// Humanizer, still subject to Policy.
    pub fn speak(&self, text: impl Into<String>) {
        self.speak_raw(text.into());
    }

    /// Like `speak`, with a default smoke-test message.
    pub fn test(&self, text: Option<String>) {
        let text = text.unwrap_or_else(|| {
            "This is a test announcement from the error narrator.".to_string()
        });
        self.speak_raw(text);
    }

    fn speak_raw(&self, text: String) {
        let config = self.snapshot_config();
        if !config.enabled {
            return;
        }
        if classifier::is_always_ignored(&text) {
            debug!(message = %text, "dropping always-ignored text passed to speak/test");
            return;
        }
        let cleaned = humanizer::truncate(&text, config.max_message_length);
        let classification = Classification {
            kind: "Error".to_string(),
            severity: Severity::Normal,
        };
        self.admit_and_enqueue(cleaned, classification, &config);
    }

    fn admit_and_enqueue(&self, text: String, classification: Classification, config: &Config) {
        let final_classification = classifier::finalize(classification, &text);
        let now = Instant::now();
        let candidate = Candidate {
            text: &text,
            classification: &final_classification,
        };

        let mut ledger = self.ledger.lock().expect("engine mutex poisoned");
        let pending_texts = self.queue.pending_texts();
        match policy::admit(&candidate, now, &mut ledger, config, &pending_texts) {
            Ok(()) => {
                drop(ledger);
                let utterance = Utterance::new(
                    text,
                    final_classification,
                    now,
                    config.voice.clone(),
                    config.prosody,
                );
                self.queue.enqueue(utterance);
            }
            Err(reason) => {
                debug!(?reason, "dropped candidate utterance");
            }
        }
    }

    /// Atomically set `config.enabled = true`. Idempotent.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Atomically set `config.enabled = false` and cancel the queue.
    /// Idempotent: repeated calls always leave the queue empty.
    pub fn disable(&self) {
        self.set_enabled(false);
        self.queue.cancel();
    }

    fn set_enabled(&self, enabled: bool) {
        let mut slot = self.config.lock().expect("engine mutex poisoned");
        let mut next = (**slot).clone();
        next.enabled = enabled;
        *slot = Arc::new(next);
    }

    /// Cancel the queue; leave the ledger intact.
    pub fn clear_queue(&self) {
        self.queue.cancel();
    }

    /// Deep-merge `patch` into the current config and replace it
    /// atomically. Never observed half-applied by Policy: readers take
    /// one `Arc` snapshot per admission decision.
    pub fn update_config(&self, patch: &ConfigPatch) {
        let mut slot = self.config.lock().expect("engine mutex poisoned");
        let merged = slot.merged(patch);
        *slot = Arc::new(merged);
    }

    /// Parse a host-supplied JSON config patch and merge it in. Errors
    /// only on malformed JSON; unknown keys are still ignored by `serde`.
    pub fn update_config_from_json(&self, json: &str) -> Result<()> {
        let patch: ConfigPatch =
            serde_json::from_str(json).map_err(|e| NarratorError::Config(e.to_string()))?;
        self.update_config(&patch);
        Ok(())
    }

    /// Current engine status.
    pub fn get_status(&self) -> Status {
        let config = self.snapshot_config();
        let ledger_size = self.ledger.lock().expect("engine mutex poisoned").len();
        Status {
            enabled: config.enabled,
            sink_ready: self.sink.is_ready(),
            in_flight: self.queue.is_in_flight(),
            pending: self.queue.pending_len(),
            ledger_size,
            debug: config.debug,
            config: (*config).clone(),
        }
    }

    /// Forward to the configured sink's voice enumeration.
    pub fn list_voices(&self) -> Vec<String> {
        self.sink.list_voices()
    }
}

/// Best-effort extraction of a message from a `catch_unwind` payload.
fn panic_payload_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "humanizer panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn disabled_engine_drops_without_enqueueing() {
        let engine = Engine::construct(
            Config {
                enabled: false,
                ..Config::default()
            },
            Arc::new(NullSink),
        );
        engine.handle_fault(Fault::from_message("boom"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.get_status().pending, 0);
        assert!(!engine.get_status().in_flight);
    }

    #[tokio::test]
    async fn always_ignored_fault_never_reaches_ledger() {
        let engine = Engine::construct(Config::default(), Arc::new(NullSink));
        engine.handle_fault(Fault::from_message("ResizeObserver loop limit exceeded"));
        assert_eq!(engine.get_status().ledger_size, 0);
    }

    #[tokio::test]
    async fn humanization_path_admits_and_records_ledger_entry() {
        let engine = Engine::construct(Config::default(), Arc::new(NullSink));
        let fault = Fault {
            message: Some("map is not a function".to_string()),
            kind: Some("TypeError".to_string()),
            stack: None,
            cause: None,
        };
        engine.handle_fault(fault);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.get_status().ledger_size, 1);
    }

    #[tokio::test]
    async fn disable_cancels_in_flight_and_pending() {
        struct BlockingSink {
            deliveries: AtomicUsize,
        }
        impl SinkAdapter for BlockingSink {
            fn deliver(
                &self,
                _utterance: &Utterance,
                _on_complete: Box<dyn FnOnce(crate::error::Result<()>) + Send>,
            ) {
                self.deliveries.fetch_add(1, Ordering::SeqCst);
                // never completes, simulating a wedged sink
            }
            fn cancel(&self) {}
            fn list_voices(&self) -> Vec<String> {
                vec![]
            }
        }

        let sink = Arc::new(BlockingSink {
            deliveries: AtomicUsize::new(0),
        });
        let engine = Engine::construct(Config::default(), sink);
        engine.speak("first fault");
        engine.speak("second fault");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.get_status().in_flight);

        engine.disable();
        let status = engine.get_status();
        assert!(!status.enabled);
        assert!(!status.in_flight);
        assert_eq!(status.pending, 0);

        // disabled engine drops subsequent faults before reaching Policy
        engine.handle_fault(Fault::from_message("third fault"));
        assert_eq!(engine.get_status().pending, 0);
    }
}
