//! The admitted, speakable unit that flows through the queue.

use crate::classifier::FinalClassification;
use crate::config::Prosody;
use std::time::Instant;

/// An utterance admitted by Policy, waiting for or undergoing delivery to
/// a [`crate::sink::SinkAdapter`].
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Unique id, used to ignore stale completion callbacks after cancellation.
    pub id: uuid::Uuid,
    /// Final text. Bounded length (§6), no control characters, no line breaks.
    pub text: String,
    pub classification: FinalClassification,
    pub admitted_at: Instant,
    /// Preferred voice (name or language tag), if any.
    pub voice_hint: Option<String>,
    pub prosody: Prosody,
}

impl Utterance {
    pub fn new(
        text: String,
        classification: FinalClassification,
        admitted_at: Instant,
        voice_hint: Option<String>,
        prosody: Prosody,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            text,
            classification,
            admitted_at,
            voice_hint,
            prosody,
        }
    }
}
