//! Residual placeholder sweep.
//!
//! Last pass over the fully assembled document: any `{{...}}` token still
//! present after rendering, in the body or in any sub-part (headers,
//! footers), is removed so it never surfaces to the reader. The sweep is
//! syntactic and unconditional; it does not distinguish an intentionally
//! deferred optional token from a bug. A fragment whose markup cannot be
//! parsed is returned unmodified rather than aborting the document.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defrag::map_run_contents;
use crate::placeholder::PLACEHOLDER_RE;

lazy_static! {
    /// Any tag, open or close. Text between tags is where tokens can hide
    /// in markup that carries no `<t>`/`<w:t>` runs.
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// One textual part of the packaged document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPart {
    /// Part name, e.g. `body`, `header1`, `footer1`.
    pub name: String,
    /// The part's markup.
    pub markup: String,
}

impl DocumentPart {
    pub fn new(name: &str, markup: &str) -> Self {
        Self {
            name: name.to_string(),
            markup: markup.to_string(),
        }
    }
}

/// The assembled document: main body plus embedded sub-parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPackage {
    pub parts: Vec<DocumentPart>,
}

impl DocumentPackage {
    /// Package with a single body part.
    pub fn body(markup: &str) -> Self {
        Self {
            parts: vec![DocumentPart::new("body", markup)],
        }
    }

    pub fn with_part(mut self, name: &str, markup: &str) -> Self {
        self.parts.push(DocumentPart::new(name, markup));
        self
    }

    pub fn part(&self, name: &str) -> Option<&DocumentPart> {
        self.parts.iter().find(|p| p.name == name)
    }
}

/// Remove leftover placeholder tokens from one part's markup.
///
/// Text-run contents are cleaned individually. A fragment with no text runs
/// is still swept: plain text as a whole, other markup (rendered rich HTML,
/// structural-only parts) in the text between its tags. Only a fragment
/// whose tags do not parse is returned unmodified; corrupt packaging is not
/// this pass's problem to fix. Lone `{` or `}` characters are never touched.
pub fn sweep_markup(markup: &str) -> String {
    if let Some(cleaned) = map_run_contents(markup, |content| {
        PLACEHOLDER_RE.replace_all(content, "").into_owned()
    }) {
        return cleaned;
    }
    if !markup.contains('<') {
        return PLACEHOLDER_RE.replace_all(markup, "").into_owned();
    }
    sweep_between_tags(markup).unwrap_or_else(|| markup.to_string())
}

/// Sweep the text segments between tags. `None` when a `<` never closes,
/// which marks the fragment as unparseable.
fn sweep_between_tags(markup: &str) -> Option<String> {
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0usize;
    for m in TAG_RE.find_iter(markup) {
        let text = &markup[cursor..m.start()];
        if text.contains('<') {
            return None;
        }
        out.push_str(&PLACEHOLDER_RE.replace_all(text, ""));
        out.push_str(m.as_str());
        cursor = m.end();
    }
    let tail = &markup[cursor..];
    if tail.contains('<') {
        return None;
    }
    out.push_str(&PLACEHOLDER_RE.replace_all(tail, ""));
    Some(out)
}

/// Sweep every part of the package.
pub fn sweep_package(package: DocumentPackage) -> DocumentPackage {
    let parts = package
        .parts
        .into_iter()
        .map(|part| {
            let swept = sweep_markup(&part.markup);
            if swept.len() != part.markup.len() {
                tracing::debug!(part = %part.name, "removed residual placeholders");
            }
            DocumentPart {
                name: part.name,
                markup: swept,
            }
        })
        .collect();
    DocumentPackage { parts }
}
