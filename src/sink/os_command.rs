//! OS-command-style sink adapter.
//!
//! Delivers utterances by shelling out to a platform speech command
//! (`say` on macOS, `spd-say` or `espeak-ng` elsewhere), in the manner
//! `fae::tts::mod.rs` shells out to download/build external TTS
//! resources: wrap the external call in `Result<_, NarratorError>`,
//! `tracing::info!` around the invocation, `map_err` for context.

use super::SinkAdapter;
use crate::error::{NarratorError, Result};
use crate::utterance::Utterance;
use std::process::{Child, Command};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Candidate command names tried in order, first one found on `PATH` wins.
/// Overridable via [`OsCommandSink::with_command`] for hosts that know
/// their platform's tool up front.
const CANDIDATES: &[&str] = &["say", "spd-say", "espeak-ng", "espeak"];

/// Speaks utterances via a platform command-line speech tool.
pub struct OsCommandSink {
    command: String,
    current_child: Arc<Mutex<Option<Child>>>,
}

impl OsCommandSink {
    /// Probe `PATH` for the first available candidate command.
    pub fn detect() -> Result<Self> {
        for candidate in CANDIDATES {
            if command_exists(candidate) {
                info!(command = candidate, "using OS speech command");
                return Ok(Self::with_command(candidate));
            }
        }
        Err(NarratorError::Sink(
            "no OS speech command found (tried say, spd-say, espeak-ng, espeak)".to_string(),
        ))
    }

    /// Use an explicit command name, bypassing detection.
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            current_child: Arc::new(Mutex::new(None)),
        }
    }
}

impl SinkAdapter for OsCommandSink {
    fn deliver(&self, utterance: &Utterance, on_complete: Box<dyn FnOnce(Result<()>) + Send>) {
        // `deliver` itself must return immediately (§5: enqueue is
        // non-blocking); the blocking `Command::spawn`/`wait` pair runs on
        // a dedicated blocking thread, with `on_complete` invoked from
        // there once the process exits.
        let command = self.command.clone();
        let text = utterance.text.clone();
        let rate = utterance.prosody.rate;

        info!(text = %text, "delivering utterance via OS speech command");

        match spawn(&command, &text, rate) {
            Ok(child) => {
                let slot = self.current_child.clone();
                *slot.lock().expect("sink mutex poisoned") = Some(child);
                tokio::task::spawn_blocking(move || {
                    let wait_result = slot
                        .lock()
                        .expect("sink mutex poisoned")
                        .as_mut()
                        .map(Child::wait);
                    *slot.lock().expect("sink mutex poisoned") = None;
                    match wait_result {
                        Some(Ok(status)) if status.success() => on_complete(Ok(())),
                        Some(Ok(status)) => on_complete(Err(NarratorError::Sink(format!(
                            "speech command exited with {status}"
                        )))),
                        Some(Err(e)) => on_complete(Err(NarratorError::Io(e))),
                        None => on_complete(Err(NarratorError::Sink(
                            "speech command was cancelled before it could be awaited".to_string(),
                        ))),
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to spawn OS speech command");
                on_complete(Err(NarratorError::Io(e)));
            }
        }
    }

    fn cancel(&self) {
        if let Some(mut child) = self.current_child.lock().expect("sink mutex poisoned").take() {
            let _ = child.kill();
        }
    }

    fn list_voices(&self) -> Vec<String> {
        // `say -v ?` enumerates voices on macOS; other backends don't
        // expose a stable listing format, so we only support it there.
        if self.command == "say" {
            if let Ok(output) = Command::new("say").arg("-v").arg("?").output() {
                return String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .filter_map(|line| line.split_whitespace().next())
                    .map(str::to_string)
                    .collect();
            }
        }
        Vec::new()
    }
}

fn spawn(command: &str, text: &str, rate: f32) -> std::io::Result<Child> {
    let mut cmd = Command::new(command);
    match command {
        "say" => {
            // `say` takes words-per-minute; 175 is its own default, scale
            // by our prosody rate multiplier.
            let wpm = (175.0 * rate).round().max(1.0) as u32;
            cmd.arg("-r").arg(wpm.to_string()).arg(text);
        }
        "espeak-ng" | "espeak" => {
            let wpm = (175.0 * rate).round().max(1.0) as u32;
            cmd.arg("-s").arg(wpm.to_string()).arg(text);
        }
        _ => {
            // spd-say and anything else: pass text verbatim.
            cmd.arg(text);
        }
    }
    cmd.spawn()
}

fn command_exists(name: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).is_file())
}
