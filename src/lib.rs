//! error_narrator: a runtime error-narration engine.
//!
//! Intercepts program faults (thrown errors, rejected futures,
//! host-reported build/compile diagnostics) and converts them into
//! short, humanized sentences, routed through a rate-limiting policy
//! layer and a single-consumer queue to a pluggable speech sink.
//!
//! # Architecture
//!
//! Dependency order, leaves first:
//! - [`classifier`]: maps a raw fault to `(kind, severity)`
//! - [`humanizer`]: rewrites a fault into a short display sentence
//! - [`policy`]: admits or drops a candidate utterance
//! - [`queue`]: serializes delivery to the sink, at most one in flight
//! - [`sink`]: the pluggable speech backend interface, plus two adapters
//! - [`engine`]: orchestrates the above behind a small public API
//!
//! [`hooks`] and [`global`] are optional convenience layers; neither is
//! required to drive the engine manually via [`engine::Engine::handle_fault`].

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod fault;
pub mod global;
pub mod hooks;
pub mod humanizer;
pub mod policy;
pub mod queue;
pub mod sink;
pub mod utterance;

pub use config::{Config, ConfigPatch};
pub use engine::{Engine, Status};
pub use error::{NarratorError, Result};
pub use fault::{Cause, Fault};
pub use global::{global, init_global, shutdown_global};
pub use utterance::Utterance;
