//! Placeholder defragmentation for run-based word-processing markup.
//!
//! Authoring tools routinely split a `{{placeholder}}` across several text
//! runs (spell-check boundaries, formatting changes, revision marks), which
//! makes the token invisible to substitution. This module repairs one
//! paragraph at a time:
//!
//! - Runs are collected into an arena of [`TextRun`] records with byte
//!   ranges computed once against the paragraph's immutable combined text.
//! - Fragmented tokens are merged into their first run, in reverse discovery
//!   order, through a per-run [`Rewrite`] state rather than in-place string
//!   edits, so no rewrite ever invalidates another token's offsets.
//! - The paragraph markup is reassembled with every byte outside run
//!   contents preserved verbatim. Content is copied, never re-encoded, so
//!   escaped entities keep exactly one level of escaping.
//!
//! Paragraphs are the scope boundary: a token split across two paragraphs is
//! never reconstructed. Unterminated tokens simply do not match and pass
//! through unchanged; the defragmenter never fails.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use smallvec::SmallVec;

use crate::placeholder::{find_tokens, Token};

lazy_static! {
    /// A text element inside a run: `<t>`/`<w:t>` with optional attributes.
    /// Content cannot contain a raw `<`, so `[^<]*` is exact.
    static ref TEXT_RUN_RE: Regex = Regex::new(
        r"(?P<open><(?:w:)?t(?:\s[^>]*)?>)(?P<text>[^<]*)(?P<close></(?:w:)?t>)"
    )
    .unwrap();

    /// A paragraph block: `<p>`/`<w:p>` with optional attributes.
    static ref PARAGRAPH_RE: Regex =
        Regex::new(r"(?s)<(?:w:)?p(?:\s[^>]*)?>.*?</(?:w:)?p>").unwrap();
}

/// Pending rewrite for one run, expressed against the original combined-text
/// offsets. Offsets stay valid for the whole pass because nothing mutates the
/// original content.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rewrite {
    /// Run is untouched by any fragmented token.
    Untouched,
    /// Run lies strictly inside a fragmented token; its content is dropped.
    Cleared,
    /// Run is the last run of a fragmented token; keep original content from
    /// `keep_from` (combined offset) to the end of the run.
    Tail { keep_from: usize },
    /// Run is the first run of a fragmented token; keep original content in
    /// `[keep_from, keep_to)` followed by the full token text. `keep_from`
    /// is narrowed when an earlier token also ends in this run.
    Merged {
        keep_from: usize,
        keep_to: usize,
        token: String,
    },
}

/// One text run: literal content plus the wrapper markup around it.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Opening wrapper markup, e.g. `<w:t xml:space="preserve">`.
    pub wrapper_open: String,
    /// Closing wrapper markup, e.g. `</w:t>`.
    pub wrapper_close: String,
    /// Original content, copied verbatim from the paragraph markup.
    pub content: String,
    /// Byte range of `content` within the paragraph markup.
    markup_span: Range<usize>,
    /// Half-open byte range this run occupies in the combined text.
    pub start: usize,
    /// End of the combined-text range (exclusive).
    pub end: usize,
    rewrite: Rewrite,
}

impl TextRun {
    /// Content after applying the pending rewrite.
    fn rewritten(&self) -> String {
        match &self.rewrite {
            Rewrite::Untouched => self.content.clone(),
            Rewrite::Cleared => String::new(),
            Rewrite::Tail { keep_from } => self.content[keep_from - self.start..].to_string(),
            Rewrite::Merged {
                keep_from,
                keep_to,
                token,
            } => {
                let head = &self.content[keep_from - self.start..keep_to - self.start];
                format!("{}{}", head, token)
            }
        }
    }
}

/// One paragraph under defragmentation: the raw markup plus its run arena.
#[derive(Debug)]
pub struct Paragraph<'a> {
    markup: &'a str,
    runs: Vec<TextRun>,
}

impl<'a> Paragraph<'a> {
    /// Scan a paragraph's markup for its ordered text runs.
    pub fn scan(markup: &'a str) -> Self {
        let mut runs = Vec::new();
        let mut offset = 0usize;
        for caps in TEXT_RUN_RE.captures_iter(markup) {
            let open = caps.name("open").unwrap();
            let text = caps.name("text").unwrap();
            let close = caps.name("close").unwrap();
            let len = text.as_str().len();
            runs.push(TextRun {
                wrapper_open: open.as_str().to_string(),
                wrapper_close: close.as_str().to_string(),
                content: text.as_str().to_string(),
                markup_span: text.start()..text.end(),
                start: offset,
                end: offset + len,
                rewrite: Rewrite::Untouched,
            });
            offset += len;
        }
        Self { markup, runs }
    }

    /// The paragraph's text with all run contents concatenated in order.
    pub fn combined_text(&self) -> String {
        self.runs.iter().map(|r| r.content.as_str()).collect()
    }

    /// Number of runs in the arena.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Index of the run whose combined-text range contains byte `pos`.
    /// Empty runs have `start == end` and can never contain a position.
    fn run_at(&self, pos: usize) -> Option<usize> {
        self.runs
            .iter()
            .position(|r| r.start <= pos && pos < r.end)
    }

    /// Merge every fragmented token into its first run. Returns the number
    /// of tokens that were fragmented.
    ///
    /// Tokens are processed in reverse discovery order. All offsets refer to
    /// the original combined text, so earlier tokens keep computing against
    /// unmodified ranges; the only interaction between tokens is a boundary
    /// run shared by one token's tail and the next token's head, which is
    /// resolved by narrowing the head's kept range instead of overwriting it.
    fn merge_fragmented(&mut self, tokens: &[Token]) -> usize {
        // Fragmented spans are resolved once, against immutable offsets,
        // before any rewrite is recorded.
        let fragmented: SmallVec<[(&Token, usize, usize); 8]> = tokens
            .iter()
            .filter_map(|token| {
                let (first, last) = self.span_of(token)?;
                (first != last).then_some((token, first, last))
            })
            .collect();

        for &(token, first, last) in fragmented.iter().rev() {
            for run in &mut self.runs[first + 1..last] {
                run.rewrite = Rewrite::Cleared;
            }

            // Matched tokens are disjoint, so the last run either is still
            // untouched or holds the merged head of the following token.
            match &mut self.runs[last].rewrite {
                state @ Rewrite::Untouched => {
                    *state = Rewrite::Tail {
                        keep_from: token.end,
                    }
                }
                Rewrite::Merged { keep_from, .. } => *keep_from = token.end,
                Rewrite::Tail { keep_from } => *keep_from = (*keep_from).max(token.end),
                Rewrite::Cleared => {}
            }

            // A token's first run is always ahead of every previously
            // processed token, so it cannot have been rewritten yet.
            self.runs[first].rewrite = Rewrite::Merged {
                keep_from: self.runs[first].start,
                keep_to: token.start,
                token: token.raw.clone(),
            };
        }
        fragmented.len()
    }

    /// The inclusive run-index span `[first, last]` covering a token, or
    /// `None` when the token falls outside every run (cannot happen for
    /// tokens found in the combined text, kept as a guard).
    fn span_of(&self, token: &Token) -> Option<(usize, usize)> {
        let first = self.run_at(token.start)?;
        let last = self.run_at(token.end - 1)?;
        Some((first, last))
    }

    /// Emit the paragraph markup with rewritten run contents spliced in.
    /// Every byte outside the run contents is copied verbatim.
    fn reassemble(&self) -> String {
        let mut out = String::with_capacity(self.markup.len());
        let mut cursor = 0usize;
        for run in &self.runs {
            out.push_str(&self.markup[cursor..run.markup_span.start]);
            out.push_str(&run.rewritten());
            cursor = run.markup_span.end;
        }
        out.push_str(&self.markup[cursor..]);
        out
    }
}

/// Apply `rewrite` to every text-run content in `markup`, preserving all
/// other bytes. Returns `None` when the markup contains no text runs.
/// Shared with the residual sweep, which edits run contents in place without
/// needing the paragraph arena.
pub(crate) fn map_run_contents(
    markup: &str,
    mut rewrite: impl FnMut(&str) -> String,
) -> Option<String> {
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0usize;
    let mut seen = false;
    for caps in TEXT_RUN_RE.captures_iter(markup) {
        seen = true;
        let text = caps.name("text").unwrap();
        out.push_str(&markup[cursor..text.start()]);
        out.push_str(&rewrite(text.as_str()));
        cursor = text.end();
    }
    if !seen {
        return None;
    }
    out.push_str(&markup[cursor..]);
    Some(out)
}

/// Defragment one paragraph's markup.
///
/// Returns the markup unchanged (byte-identical) when the paragraph contains
/// no fragmented placeholder, which also makes the operation idempotent: a
/// merged token lives in a single run and is classified as contained on the
/// next pass.
pub fn defragment_paragraph(markup: &str) -> String {
    let mut paragraph = Paragraph::scan(markup);
    if paragraph.run_count() == 0 {
        return markup.to_string();
    }

    let combined = paragraph.combined_text();
    let tokens = find_tokens(&combined);
    if tokens.is_empty() {
        return markup.to_string();
    }

    let merged = paragraph.merge_fragmented(&tokens);
    if merged == 0 {
        return markup.to_string();
    }
    tracing::debug!(merged, runs = paragraph.run_count(), "merged fragmented placeholders");
    paragraph.reassemble()
}

/// Defragment a whole document part, paragraph by paragraph.
///
/// Markup without paragraph wrappers is treated as a single paragraph.
/// Placeholders are never reconstructed across a paragraph boundary.
pub fn defragment_document(markup: &str) -> String {
    if !PARAGRAPH_RE.is_match(markup) {
        return defragment_paragraph(markup);
    }
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0usize;
    for m in PARAGRAPH_RE.find_iter(markup) {
        out.push_str(&markup[cursor..m.start()]);
        out.push_str(&defragment_paragraph(m.as_str()));
        cursor = m.end();
    }
    out.push_str(&markup[cursor..]);
    out
}
