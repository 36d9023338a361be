//! Declarative placeholder mapping.
//!
//! This module provides:
//! - [`MappingEntry`]: one schema row binding a placeholder key to a
//!   dot-notation path into the request's data sources
//! - [`ValueType`]: the closed set of value renderings (text, number,
//!   currency, email, date, bullet list), one handler per variant
//! - [`MappingRegistry`]: the schema registry, built at startup, extended
//!   through [`MappingRegistry::extend`], and read concurrently by request
//!   handlers
//! - [`default_registry`]: the built-in commercial-proposal schema
//!
//! Resolution itself lives in [`resolver`]; the data-source object in
//! [`sources`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod resolver;
pub mod sources;

pub use resolver::{
    CoverageReport, MappingResolver, ResolveMode, ResolveOptions, Resolution,
};
pub use sources::DataSources;

/// Mapping-specific error type
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Invalid mapping entry: {0}")]
    InvalidEntry(String),

    #[error("Required values missing: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Result type for mapping operations
pub type MappingResult<T> = Result<T, MappingError>;

/// A custom per-entry transform applied after the type handler.
pub type Transform = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Locale constants consumed by the currency and date handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Currency symbol appended to formatted amounts.
    pub currency_symbol: String,
    /// chrono format string for rendered calendar dates.
    pub date_format: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "€".to_string(),
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

/// How a resolved value is rendered before substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// Trimmed, stringified as-is.
    Text,
    /// Numeric coercion; anything unparseable becomes 0.
    Number,
    /// Locale-formatted amount, unless the value is already formatted.
    Currency,
    /// Lower-cased; anything without an `@` renders empty.
    Email,
    /// Literal calendar date; blank values render today.
    Date,
    /// An array rendered as `- item` lines joined by newlines.
    BulletList,
}

impl ValueType {
    /// Apply the handler for this variant. The match is the lookup table;
    /// adding a variant without a handler is a compile error.
    pub fn apply(&self, raw: &Value, formats: &FormatOptions) -> Result<String, String> {
        match self {
            ValueType::Text => Ok(stringify(raw).trim().to_string()),
            ValueType::Number => Ok(coerce_number(raw)
                .map(format_number)
                .unwrap_or_else(|| "0".to_string())),
            ValueType::Currency => format_currency(raw, formats),
            ValueType::Email => Ok(format_email(raw)),
            ValueType::Date => Ok(format_date(raw, formats)),
            ValueType::BulletList => format_bullet_list(raw),
        }
    }
}

/// Scalar rendering shared by the handlers. Arrays and objects fall back to
/// their JSON representation.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric coercion: JSON numbers pass through; strings tolerate French
/// comma decimals and grouping spaces. `None` means unparseable.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let normalized: String = s
                .trim()
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '\u{00a0}' && *c != '\u{202f}')
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            normalized.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Symbols that mark a value as already formatted by an upstream helper.
const CURRENCY_SYMBOLS: [char; 4] = ['€', '$', '£', '¥'];

fn format_currency(value: &Value, formats: &FormatOptions) -> Result<String, String> {
    if let Value::String(s) = value {
        // Derived-value collaborators send pre-formatted amounts; pass
        // those through untouched.
        if s.chars().any(|c| CURRENCY_SYMBOLS.contains(&c)) {
            return Ok(s.trim().to_string());
        }
    }
    let amount =
        coerce_number(value).ok_or_else(|| format!("not a numeric amount: {}", stringify(value)))?;
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let units = cents / 100;
    let rest = cents % 100;
    let mut grouped = String::new();
    let digits = units.to_string();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\u{00a0}');
        }
        grouped.push(c);
    }
    Ok(format!(
        "{}{},{:02}\u{00a0}{}",
        if negative { "-" } else { "" },
        grouped,
        rest,
        formats.currency_symbol
    ))
}

fn format_email(value: &Value) -> String {
    let s = stringify(value).trim().to_lowercase();
    if s.contains('@') {
        s
    } else {
        String::new()
    }
}

fn format_date(value: &Value, formats: &FormatOptions) -> String {
    let s = stringify(value).trim().to_string();
    if s.is_empty() {
        return Local::now().format(&formats.date_format).to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return d.format(&formats.date_format).to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return dt.date_naive().format(&formats.date_format).to_string();
    }
    // Anything else is a pre-formatted literal from a date helper.
    s
}

fn format_bullet_list(value: &Value) -> Result<String, String> {
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| format!("- {}", stringify(item).trim()))
            .collect::<Vec<_>>()
            .join("\n")),
        Value::String(s) => Ok(s
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let line = line.trim();
                if line.starts_with("- ") {
                    line.to_string()
                } else {
                    format!("- {}", line.trim_start_matches(['-', '*']).trim())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")),
        other => Err(format!("expected an array of items, got {}", other)),
    }
}

/// One schema row: how a placeholder's value is sourced, typed and defaulted.
#[derive(Clone, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Placeholder key, unique within the registry.
    pub key: String,

    /// Dot-notation path into the category-partitioned data sources,
    /// e.g. `form.entrepriseNom`.
    pub source_path: String,

    /// Rendering applied to a present value.
    pub value_type: ValueType,

    /// Substituted when the source value is missing.
    #[serde(default)]
    pub fallback: String,

    /// Whether a missing value is a validation error in strict mode.
    #[serde(default)]
    pub required: bool,

    /// Optional custom transform applied after the type handler.
    #[serde(skip)]
    pub transform: Option<Transform>,
}

impl fmt::Debug for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingEntry")
            .field("key", &self.key)
            .field("source_path", &self.source_path)
            .field("value_type", &self.value_type)
            .field("fallback", &self.fallback)
            .field("required", &self.required)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl MappingEntry {
    /// Plain entry with no fallback, not required.
    pub fn new(key: &str, source_path: &str, value_type: ValueType) -> Self {
        Self {
            key: key.to_string(),
            source_path: source_path.to_string(),
            value_type,
            fallback: String::new(),
            required: false,
            transform: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Validate the entry before it enters the registry.
    pub fn validate(&self) -> MappingResult<()> {
        if self.key.is_empty() || self.key.len() > 64 {
            return Err(MappingError::InvalidEntry(
                "key must be 1-64 characters".to_string(),
            ));
        }
        if !self
            .key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(MappingError::InvalidEntry(format!(
                "key '{}' must contain only alphanumeric, dash, or underscore",
                self.key
            )));
        }
        if self.source_path.is_empty() || self.source_path.split('.').any(|seg| seg.is_empty()) {
            return Err(MappingError::InvalidEntry(format!(
                "source path '{}' must be a non-empty dot path",
                self.source_path
            )));
        }
        Ok(())
    }
}

/// The schema registry. Built once at startup, extended through
/// [`extend`](Self::extend), then treated as read-only; concurrent reads
/// during request processing need no locking.
pub struct MappingRegistry {
    entries: DashMap<String, MappingEntry>,
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register additional entries. Entries are validated; a duplicate key
    /// replaces the existing row (last write wins).
    pub fn extend(
        &self,
        entries: impl IntoIterator<Item = MappingEntry>,
    ) -> MappingResult<usize> {
        let mut added = 0usize;
        for entry in entries {
            entry.validate()?;
            let key = entry.key.clone();
            if self.entries.insert(key.clone(), entry).is_some() {
                tracing::debug!(%key, "mapping entry replaced");
            }
            added += 1;
        }
        Ok(added)
    }

    /// Get one entry by placeholder key.
    pub fn get(&self, key: &str) -> Option<MappingEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    /// Whether a key is mapped.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All entries, sorted by key for deterministic iteration.
    pub fn entries(&self) -> Vec<MappingEntry> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// All mapped keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The built-in commercial-proposal schema.
///
/// Categories: `generated` (language-model narrative), `form` (submitted
/// fields), `computed` (financial figures), `derived` (pre-formatted
/// helpers).
pub fn default_registry() -> MappingRegistry {
    let registry = MappingRegistry::new();
    registry
        .extend([
            MappingEntry::new("titre", "generated.titre", ValueType::Text)
                .with_fallback("Proposition commerciale")
                .required(),
            MappingEntry::new("entrepriseNom", "form.entrepriseNom", ValueType::Text).required(),
            MappingEntry::new("contactNom", "form.contactNom", ValueType::Text),
            MappingEntry::new("contactEmail", "form.contactEmail", ValueType::Email),
            MappingEntry::new("contexte", "generated.contexte", ValueType::Text).required(),
            MappingEntry::new("objectifs", "generated.objectifs", ValueType::Text).required(),
            MappingEntry::new("methodologie", "generated.methodologie", ValueType::Text),
            MappingEntry::new("livrables", "generated.livrables", ValueType::BulletList),
            MappingEntry::new("montantTotal", "computed.montantTotal", ValueType::Currency)
                .required(),
            MappingEntry::new("montantLettres", "derived.montantLettres", ValueType::Text),
            MappingEntry::new("dateProposition", "derived.dateProposition", ValueType::Date),
            MappingEntry::new("delaiRealisation", "form.delaiRealisation", ValueType::Text),
            MappingEntry::new("validiteOffre", "derived.validiteOffre", ValueType::Date),
        ])
        .expect("built-in schema entries are valid");
    registry
}

/// Create an Arc-wrapped registry pre-loaded with the proposal schema.
pub fn create_registry() -> Arc<MappingRegistry> {
    Arc::new(default_registry())
}
