//! The raw fault type consumed by the engine.

use std::fmt;

/// A raw program fault: a thrown error, a rejected promise/future, or a
/// host-reported build/compile diagnostic.
///
/// The engine consumes a `Fault` immediately — it never retains it past
/// the `handle_fault` call that received it.
#[derive(Debug, Clone, Default)]
pub struct Fault {
    /// Human-readable message, if the source provided one.
    pub message: Option<String>,
    /// Short kind tag (`TypeError`, `ReferenceError`, `SyntaxError`,
    /// `ModuleError`, `Error`, or any other identifier the source uses).
    pub kind: Option<String>,
    /// Stack trace text, if available. Used by the Humanizer to extract a
    /// top-frame file/line when no pattern rule matches.
    pub stack: Option<String>,
    /// The fault that caused this one, if any.
    pub cause: Option<Box<Cause>>,
}

/// A fault's cause: either another structured `Fault`, or an opaque value
/// the source could only render as text.
#[derive(Debug, Clone)]
pub enum Cause {
    Fault(Fault),
    Opaque(String),
}

impl Fault {
    /// Build a fault from a bare message, as `speak`/`test` do internally
    /// before running it through Policy (bypassing Classifier/Humanizer).
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            kind: None,
            stack: None,
            cause: None,
        }
    }

    /// The message source per spec.md §4.2 step 1: the fault's own message
    /// if non-empty, else a string rendering of the fault.
    pub fn message_source(&self) -> String {
        match &self.message {
            Some(m) if !m.is_empty() => m.clone(),
            _ => self.render(),
        }
    }

    fn render(&self) -> String {
        format!("{self}")
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.as_deref().unwrap_or("Error");
        match &self.cause {
            Some(cause) => write!(f, "{kind}: {cause}"),
            None => write!(f, "{kind}"),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Fault(fault) => write!(f, "{fault}"),
            Cause::Opaque(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_source_prefers_message() {
        let fault = Fault {
            message: Some("map is not a function".to_string()),
            kind: Some("TypeError".to_string()),
            stack: None,
            cause: None,
        };
        assert_eq!(fault.message_source(), "map is not a function");
    }

    #[test]
    fn message_source_falls_back_to_render() {
        let fault = Fault {
            message: None,
            kind: Some("ModuleError".to_string()),
            stack: None,
            cause: Some(Box::new(Cause::Opaque("missing dependency".to_string()))),
        };
        assert_eq!(fault.message_source(), "ModuleError: missing dependency");
    }

    #[test]
    fn message_source_empty_message_falls_back() {
        let fault = Fault {
            message: Some(String::new()),
            kind: Some("Error".to_string()),
            stack: None,
            cause: None,
        };
        assert_eq!(fault.message_source(), "Error");
    }
}
