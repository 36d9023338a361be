//! Template substitution rendering.
//!
//! Expands every `{{ key }}` token in a markup string from a resolved value
//! map. Rendering is total by design: a key absent from the map substitutes
//! the empty string, so missing-data policy lives entirely in the mapping
//! resolver.
//!
//! Two rendering modes, selected per key by a fixed membership list:
//! - plain fields are markup-escaped, with newlines converted to the target
//!   line-break element
//! - rich fields (the AI-generated narrative sections) go through a
//!   lightweight markdown dialect: headers, bold/italic emphasis, bullet
//!   lists and paragraph breaks become structural elements

use std::collections::{BTreeMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::placeholder::{token_key, PLACEHOLDER_RE};

/// Narrative sections produced by the language model; everything else is a
/// plain field.
pub const RICH_FIELDS: [&str; 5] = [
    "contexte",
    "objectifs",
    "methodologie",
    "perimetre",
    "livrables",
];

lazy_static! {
    static ref BOLD_RE: Regex = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    static ref ITALIC_RE: Regex = Regex::new(r"\*([^*]+)\*").unwrap();
}

/// Rendering options; [`Default`] matches the HTML-based packaging backend.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Line-break element emitted for newlines in plain fields.
    pub line_break: String,
    /// Keys rendered through the rich-text converter.
    pub rich_fields: HashSet<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            line_break: "<br/>".to_string(),
            rich_fields: RICH_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Expand every placeholder in `markup` from the resolved map.
///
/// Never fails; unknown keys render as the empty string.
pub fn render(markup: &str, values: &BTreeMap<String, String>, options: &RenderOptions) -> String {
    PLACEHOLDER_RE
        .replace_all(markup, |caps: &regex::Captures<'_>| {
            let key = token_key(caps.get(0).unwrap().as_str());
            let value = match values.get(key) {
                Some(value) => value.as_str(),
                None => {
                    tracing::debug!(key, "unmapped placeholder rendered empty");
                    ""
                }
            };
            if options.rich_fields.contains(key) {
                render_rich(value)
            } else {
                render_plain(value, &options.line_break)
            }
        })
        .into_owned()
}

/// Escape markup-significant characters. One level only; values are treated
/// as raw text regardless of what they contain.
pub fn escape_markup(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_plain(value: &str, line_break: &str) -> String {
    escape_markup(value).replace("\r\n", line_break).replace('\n', line_break)
}

/// Convert the narrative markdown dialect to structural HTML.
///
/// Escapes first, then applies structure, so model output can never inject
/// raw markup.
fn render_rich(value: &str) -> String {
    let escaped = escape_markup(value);
    let mut blocks: Vec<String> = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut bullets: Vec<&str> = Vec::new();

    fn flush_paragraph(blocks: &mut Vec<String>, paragraph: &mut Vec<&str>) {
        if !paragraph.is_empty() {
            blocks.push(format!("<p>{}</p>", inline_emphasis(&paragraph.join("<br/>"))));
            paragraph.clear();
        }
    }

    fn flush_bullets(blocks: &mut Vec<String>, bullets: &mut Vec<&str>) {
        if !bullets.is_empty() {
            let items: Vec<String> = bullets
                .iter()
                .map(|item| format!("<li>{}</li>", inline_emphasis(item)))
                .collect();
            blocks.push(format!("<ul>{}</ul>", items.join("")));
            bullets.clear();
        }
    }

    for line in escaped.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_bullets(&mut blocks, &mut bullets);
            flush_paragraph(&mut blocks, &mut paragraph);
        } else if let Some(rest) = trimmed.strip_prefix("### ") {
            flush_bullets(&mut blocks, &mut bullets);
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(format!("<h3>{}</h3>", inline_emphasis(rest)));
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            flush_bullets(&mut blocks, &mut bullets);
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(format!("<h2>{}</h2>", inline_emphasis(rest)));
        } else if let Some(rest) = trimmed.strip_prefix("# ") {
            flush_bullets(&mut blocks, &mut bullets);
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(format!("<h1>{}</h1>", inline_emphasis(rest)));
        } else if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "))
        {
            flush_paragraph(&mut blocks, &mut paragraph);
            bullets.push(rest);
        } else {
            flush_bullets(&mut blocks, &mut bullets);
            paragraph.push(trimmed);
        }
    }
    flush_bullets(&mut blocks, &mut bullets);
    flush_paragraph(&mut blocks, &mut paragraph);
    blocks.join("")
}

fn inline_emphasis(text: &str) -> String {
    let bold = BOLD_RE.replace_all(text, "<strong>$1</strong>");
    ITALIC_RE.replace_all(&bold, "<em>$1</em>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_substitution() {
        let out = render(
            "Bonjour {{nom}} !",
            &values(&[("nom", "Acme")]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "Bonjour Acme !");
    }

    #[test]
    fn test_whitespace_inside_braces_tolerated() {
        let out = render(
            "{{  nom  }}",
            &values(&[("nom", "Acme")]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "Acme");
    }

    #[test]
    fn test_unknown_key_renders_empty() {
        let out = render(
            "avant {{inconnu}} après",
            &values(&[]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "avant  après");
    }

    #[test]
    fn test_plain_field_is_escaped() {
        let out = render(
            "{{nom}}",
            &values(&[("nom", "A & B <SARL>")]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "A &amp; B &lt;SARL&gt;");
    }

    #[test]
    fn test_plain_newlines_become_line_breaks() {
        let out = render(
            "{{adresse}}",
            &values(&[("adresse", "1 rue de la Paix\r\n75002 Paris")]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "1 rue de la Paix<br/>75002 Paris");
    }

    #[test]
    fn test_rich_field_headers_and_paragraphs() {
        let out = render(
            "{{contexte}}",
            &values(&[("contexte", "## Contexte\nPremière ligne.\n\nSeconde partie.")]),
            &RenderOptions::default(),
        );
        assert_eq!(
            out,
            "<h2>Contexte</h2><p>Première ligne.</p><p>Seconde partie.</p>"
        );
    }

    #[test]
    fn test_rich_field_bullets_and_emphasis() {
        let out = render(
            "{{objectifs}}",
            &values(&[("objectifs", "- Réduire les **coûts**\n- Gagner du *temps*")]),
            &RenderOptions::default(),
        );
        assert_eq!(
            out,
            "<ul><li>Réduire les <strong>coûts</strong></li><li>Gagner du <em>temps</em></li></ul>"
        );
    }

    #[test]
    fn test_rich_field_still_escapes_raw_markup() {
        let out = render(
            "{{contexte}}",
            &values(&[("contexte", "<script>alert(1)</script>")]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>");
    }

    #[test]
    fn test_rendering_is_total() {
        // Every placeholder disappears, mapped or not.
        let out = render(
            "{{a}}{{b}}{{c}}",
            &values(&[("b", "x")]),
            &RenderOptions::default(),
        );
        assert_eq!(out, "x");
    }
}
