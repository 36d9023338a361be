//! Placeholder token syntax shared by the whole pipeline.
//!
//! A placeholder is the shortest match of `{{` followed by any characters
//! other than `}` followed by `}}`. Whitespace around the key inside the
//! braces is permitted and trimmed on extraction. A nested `{{` inside a
//! token is not supported; the first `}}` terminates the match.
//!
//! The defragmenter, renderer and sweeper all rely on this exact pattern, so
//! it is compiled once here and reused everywhere.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// The one placeholder pattern: `{{` + anything but `}` + `}}`.
    pub static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{[^}]*\}\}").unwrap();
}

/// A matched placeholder token, in byte offsets of the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte offset of the leading `{`.
    pub start: usize,
    /// Byte offset one past the trailing `}`.
    pub end: usize,
    /// The raw matched text, braces included.
    pub raw: String,
}

impl Token {
    /// The key inside the braces, inner whitespace trimmed.
    pub fn key(&self) -> &str {
        token_key(&self.raw)
    }
}

/// Find every placeholder token in `text`, in document order.
pub fn find_tokens(text: &str) -> Vec<Token> {
    PLACEHOLDER_RE
        .find_iter(text)
        .map(|m| Token {
            start: m.start(),
            end: m.end(),
            raw: m.as_str().to_string(),
        })
        .collect()
}

/// Extract the trimmed key from a raw `{{ key }}` token.
///
/// Callers must pass a full token as matched by [`PLACEHOLDER_RE`].
pub fn token_key(raw: &str) -> &str {
    raw.trim_start_matches('{').trim_end_matches('}').trim()
}

/// Collect the distinct placeholder keys present in a template, sorted.
///
/// Used by coverage reporting and exposed for tooling that wants to inspect
/// what a template asks for.
pub fn extract_keys(markup: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .find_iter(markup)
        .map(|m| token_key(m.as_str()).to_string())
        .collect()
}
