//! Error types for the error-narration engine.

/// Top-level error type for the narration engine.
///
/// Most of these never propagate out of the public engine operations
/// (`handle_fault`, `speak`, `test`, `enable`, `disable`, `clear_queue`,
/// `update_config`) — they are only ever traced, since those calls have
/// no caller-facing failure mode to report. `Config` is the exception:
/// `update_config_from_json` returns it directly when the supplied JSON
/// doesn't parse.
#[derive(Debug, thiserror::Error)]
pub enum NarratorError {
    /// A sink's `deliver` call failed or its `onComplete` fired with an error.
    #[error("sink delivery error: {0}")]
    Sink(String),

    /// A host fault-source hook could not be installed.
    #[error("hook installation error: {0}")]
    Hook(String),

    /// A config value could not be applied (unknown options are ignored,
    /// not an error; this is reserved for malformed patch values).
    #[error("config error: {0}")]
    Config(String),

    /// The Humanizer panicked or otherwise failed to produce text.
    #[error("humanization error: {0}")]
    Humanize(String),

    /// I/O error from a sink adapter (e.g. spawning an OS speech command).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NarratorError>;
