//! Rewrites a fault + classification into a short display sentence.
//!
//! See spec.md §4.2. The pattern-rule registry is the main extensibility
//! seam (design note §9): an ordered `Vec<Rule>`, each a `(matcher,
//! renderer)` pair, checked in registration order. The built-in set below
//! is the minimum table spec.md requires.

use crate::classifier::Classification;
use crate::config::Config;
use crate::fault::Fault;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// One entry in the pattern-rule registry.
struct Rule {
    /// If set, the fault's `kind` must equal this for the rule to apply.
    kind: Option<&'static str>,
    /// If set, this regex must match the message for the rule to apply.
    /// When `kind` is set and `regex` is `None`, the rule is a catch-all
    /// for that kind (e.g. the `TypeError`/`RangeError` fallbacks).
    regex: Option<Regex>,
    render: fn(Option<&Captures>) -> String,
}

impl Rule {
    fn matches(&self, kind: &str, message: &str) -> Option<String> {
        let kind_ok = self.kind.is_none_or(|k| k == kind);
        if !kind_ok {
            return None;
        }
        match &self.regex {
            Some(re) => re.captures(message).map(|caps| (self.render)(Some(&caps))),
            None => Some((self.render)(None)),
        }
    }
}

fn rules() -> &'static [Rule] {
    static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
        vec![
            Rule {
                kind: None,
                regex: Some(Regex::new(r"(.+) is not a function").unwrap()),
                render: |caps| {
                    let x = caps.unwrap().get(1).unwrap().as_str().trim();
                    format!("{x} is not a function. Check if it's properly imported or defined.")
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"Cannot read property '([^']+)' of (.+)").unwrap()),
                render: |caps| {
                    let caps = caps.unwrap();
                    let p = caps.get(1).unwrap().as_str();
                    let o = caps.get(2).unwrap().as_str().trim();
                    format!("Cannot read property {p}. The {o} might be null or undefined.")
                },
            },
            Rule {
                kind: None,
                regex: Some(
                    Regex::new(r"Cannot read properties of (.+?) \(reading '([^']+)'\)").unwrap(),
                ),
                render: |caps| {
                    let caps = caps.unwrap();
                    let o = caps.get(1).unwrap().as_str().trim();
                    let p = caps.get(2).unwrap().as_str();
                    format!("Cannot read property {p} of {o}. Check if the object exists.")
                },
            },
            Rule {
                kind: None,
                regex: Some(
                    Regex::new(r"Unexpected token (.+?) in JSON at position (\d+)").unwrap(),
                ),
                render: |caps| {
                    let caps = caps.unwrap();
                    let t = caps.get(1).unwrap().as_str();
                    let n = caps.get(2).unwrap().as_str();
                    format!("JSON syntax error at position {n}. Unexpected {t}.")
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"Unexpected token (.+)").unwrap()),
                render: |caps| {
                    let t = caps.unwrap().get(1).unwrap().as_str().trim();
                    format!(
                        "Syntax error: unexpected {t}. Check for missing brackets, commas, or quotes."
                    )
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"(?i)Module not found").unwrap()),
                render: |_| {
                    "Module not found. Check your import path and make sure the package is installed."
                        .to_string()
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"(?i)Failed to fetch").unwrap()),
                render: |_| {
                    "Network error: Failed to fetch data. Check your internet connection or API endpoint."
                        .to_string()
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"Objects are not valid as a React child").unwrap()),
                render: |_| {
                    "React error: Cannot render an object directly. Use JSON.stringify or render object properties individually."
                        .to_string()
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"Invalid hook call").unwrap()),
                render: |_| {
                    "React hook error: Hooks can only be called at the top level of function components."
                        .to_string()
                },
            },
            Rule {
                kind: None,
                regex: Some(Regex::new(r"Assignment to constant variable").unwrap()),
                render: |_| {
                    "Cannot reassign a constant variable. Use let or var for variables that need to change."
                        .to_string()
                },
            },
            Rule {
                kind: Some("ReferenceError"),
                regex: Some(Regex::new(r"(.+) is not defined").unwrap()),
                render: |caps| {
                    let x = caps.unwrap().get(1).unwrap().as_str().trim();
                    format!("Reference error: {x} is not defined. Check spelling and scope.")
                },
            },
            Rule {
                kind: Some("TypeError"),
                regex: None,
                render: |_| {
                    "Type error: Operation performed on wrong data type. Check your variable types."
                        .to_string()
                },
            },
            Rule {
                kind: Some("RangeError"),
                regex: None,
                render: |_| "Range error: Value is outside the allowed range.".to_string(),
            },
        ]
    });
    &RULES
}

/// Humanize a fault. Deterministic for a given input.
///
/// # Panics
///
/// Never panics by construction, but `catch_unwind` is used by callers
/// (e.g. [`crate::engine::Engine`]) to honor `fallback_to_raw` against a
/// pattern renderer that misbehaves, per spec.md §4.2's "if humanization
/// throws" clause.
pub fn humanize(fault: &Fault, classification: &Classification, config: &Config) -> String {
    let message = fault.message_source();

    let rendered = rules()
        .iter()
        .find_map(|rule| rule.matches(&classification.kind, &message));

    let text = if let Some(rendered) = rendered {
        rendered
    } else if config.include_location && fault.stack.is_some() {
        let cleaned = clean(&message);
        match top_frame(fault.stack.as_deref().unwrap_or_default()) {
            Some((file, line)) => format!("{cleaned} in {file} at line {line}"),
            None => cleaned,
        }
    } else {
        clean(&message)
    };

    truncate(&text, config.max_message_length)
}

/// Extract the top stack frame's basename and line number, per spec.md
/// §4.2 step 3. Recognizes the common `at <fn> (<file>:<line>:<col>)` and
/// bare `<file>:<line>:<col>` frame shapes.
fn top_frame(stack: &str) -> Option<(String, u32)> {
    static FRAME_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([^\s(:/\\]+):(\d+):\d+\)?").unwrap());

    stack.lines().find_map(|line| {
        let caps = FRAME_RE.captures(line)?;
        let file = caps.get(1)?.as_str().to_string();
        let line_no: u32 = caps.get(2)?.as_str().parse().ok()?;
        Some((file, line_no))
    })
}

/// Clean a raw/fallback message per spec.md §4.2 step 4.
pub fn clean(message: &str) -> String {
    static SCHEME_PREFIX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[a-zA-Z][a-zA-Z0-9+.\-]*:///[^!]*!").unwrap());
    static DOT_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\./").unwrap());
    static NODE_MODULES: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\S*node_modules\S*").unwrap());
    static NON_WORD_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
    static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

    // NODE_MODULES must run first: a bundler scheme-prefix commonly wraps
    // a node_modules path (e.g. `webpack:///./node_modules/foo/bar.js!`),
    // and SCHEME_PREFIX would otherwise swallow that whole span — dependency
    // token and all — before this substitution ever got to see it.
    let s = NODE_MODULES.replace_all(message, "dependency");
    let s = SCHEME_PREFIX.replace_all(&s, "");
    let s = DOT_SLASH.replace_all(&s, "");
    let s = NON_WORD_PUNCT.replace_all(&s, " ");
    let s = WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

/// Truncate to `max_len` code points, appending `...` within the budget
/// when truncation occurs. Never exceeds `max_len`.
pub fn truncate(text: &str, max_len: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_len {
        return text.to_string();
    }
    if max_len == 0 {
        return String::new();
    }
    if max_len <= 3 {
        return text.chars().take(max_len).collect();
    }
    let keep = max_len - 3;
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
