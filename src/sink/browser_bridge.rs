//! Browser-bridge sink adapter.
//!
//! Forwards utterances to a host-embedded browser speech-synthesis
//! engine (the Web Speech API, typically) as newline-delimited JSON
//! envelopes over any `Write`r — usually the host process's stdout.
//! Completion is reported asynchronously: the host reads the browser's
//! `speechSynthesis.onend`/`onerror` events and calls
//! [`BrowserBridgeSink::handle_event`] with the corresponding JSON line.
//!
//! Grounded on `fae::host::stdio`/`fae::host::contract`'s versioned
//! command/event envelope pattern: one JSON object per line, tagged by
//! a `command`/`event` discriminant.

use super::SinkAdapter;
use crate::error::{NarratorError, Result};
use crate::utterance::Utterance;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Envelope schema version, bumped on breaking wire changes.
pub const ENVELOPE_VERSION: u32 = 1;

/// A command written to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SpeakCommand {
    Speak {
        version: u32,
        id: Uuid,
        text: String,
        voice: Option<String>,
        rate: f32,
        pitch: f32,
        volume: f32,
    },
    Cancel {
        version: u32,
    },
}

/// An event read back from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpeakEvent {
    Complete { id: Uuid, error: Option<String> },
    VoicesChanged { voices: Vec<String> },
}

struct PendingDelivery {
    id: Uuid,
    on_complete: Box<dyn FnOnce(Result<()>) + Send>,
}

/// Sink that bridges to a browser's speech synthesis engine over a
/// newline-delimited JSON channel.
pub struct BrowserBridgeSink<W: Write + Send> {
    writer: Mutex<W>,
    pending: Mutex<Option<PendingDelivery>>,
    voices: Mutex<Vec<String>>,
}

impl<W: Write + Send> BrowserBridgeSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            pending: Mutex::new(None),
            voices: Mutex::new(Vec::new()),
        }
    }

    fn write_command(&self, command: &SpeakCommand) -> std::io::Result<()> {
        let line = serde_json::to_string(command)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut w = self.writer.lock().expect("sink mutex poisoned");
        writeln!(w, "{line}")?;
        w.flush()
    }

    /// Feed one line read back from the host. Unrecognized or malformed
    /// lines are traced at `warn` and otherwise ignored — the host side
    /// of this bridge is not part of the core's stability contract.
    pub fn handle_event(&self, line: &str) {
        let event: SpeakEvent = match serde_json::from_str(line.trim()) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, raw_line = %line, "failed to parse browser-bridge event");
                return;
            }
        };
        match event {
            SpeakEvent::Complete { id, error } => self.complete(id, error),
            SpeakEvent::VoicesChanged { voices } => {
                *self.voices.lock().expect("sink mutex poisoned") = voices;
            }
        }
    }

    fn complete(&self, id: Uuid, error: Option<String>) {
        let pending = {
            let mut slot = self.pending.lock().expect("sink mutex poisoned");
            match slot.take() {
                Some(p) if p.id == id => Some(p),
                Some(p) => {
                    // Stale event for an utterance we're no longer tracking
                    // (e.g. cancelled); put the current one back untouched.
                    *slot = Some(p);
                    None
                }
                None => None,
            }
        };
        if let Some(p) = pending {
            match error {
                None => (p.on_complete)(Ok(())),
                Some(msg) => (p.on_complete)(Err(NarratorError::Sink(msg))),
            }
        }
    }
}

impl<W: Write + Send> SinkAdapter for BrowserBridgeSink<W> {
    fn deliver(&self, utterance: &Utterance, on_complete: Box<dyn FnOnce(Result<()>) + Send>) {
        let command = SpeakCommand::Speak {
            version: ENVELOPE_VERSION,
            id: utterance.id,
            text: utterance.text.clone(),
            voice: utterance.voice_hint.clone(),
            rate: utterance.prosody.rate,
            pitch: utterance.prosody.pitch,
            volume: utterance.prosody.volume,
        };
        *self.pending.lock().expect("sink mutex poisoned") = Some(PendingDelivery {
            id: utterance.id,
            on_complete,
        });
        if let Err(e) = self.write_command(&command) {
            warn!(error = %e, "failed to write speak command to browser bridge");
            if let Some(p) = self.pending.lock().expect("sink mutex poisoned").take() {
                (p.on_complete)(Err(NarratorError::Io(e)));
            }
        }
    }

    fn cancel(&self) {
        // Drop the pending callback without invoking it; `Queue::cancel`
        // clears in-flight state directly and a late `Complete` event for
        // this id will simply find nothing pending (see `complete`).
        self.pending.lock().expect("sink mutex poisoned").take();
        if let Err(e) = self.write_command(&SpeakCommand::Cancel {
            version: ENVELOPE_VERSION,
        }) {
            warn!(error = %e, "failed to write cancel command to browser bridge");
        }
    }

    fn list_voices(&self) -> Vec<String> {
        self.voices.lock().expect("sink mutex poisoned").clone()
    }
}
