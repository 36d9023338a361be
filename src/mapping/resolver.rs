//! Schema resolution: from data sources to a flat substitution map.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::sources::DataSources;
use super::{FormatOptions, MappingError, MappingRegistry, MappingResult, ValueType};

/// Missing-value policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Missing required values are aggregated into one validation error.
    Strict,
    /// Missing required values fall back with a warning; never fails.
    #[default]
    Lenient,
}

/// Per-request resolution options.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub mode: ResolveMode,
    /// When set, only these keys are resolved.
    pub include: Option<Vec<String>>,
    /// Keys skipped even when mapped.
    pub exclude: Vec<String>,
}

impl ResolveOptions {
    pub fn strict() -> Self {
        Self {
            mode: ResolveMode::Strict,
            ..Self::default()
        }
    }

    pub fn lenient() -> Self {
        Self::default()
    }

    fn selects(&self, key: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|k| k == key) {
                return false;
            }
        }
        !self.exclude.iter().any(|k| k == key)
    }
}

/// The flat `key -> value` result of one resolution, with its diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub data: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Partition of schema keys against the keys a template actually uses.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    /// Schema entries the template uses.
    pub covered: Vec<String>,
    /// Template keys with no schema entry; a configuration bug.
    pub missing: Vec<String>,
    /// Schema entries this template does not use; informational.
    pub extra: Vec<String>,
    pub coverage_percent: f64,
}

/// Resolves the mapping schema for one request's data sources.
///
/// Holds a shared reference to the registry; construct once at startup and
/// pass into request handlers.
pub struct MappingResolver {
    registry: Arc<MappingRegistry>,
    formats: FormatOptions,
}

impl MappingResolver {
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self {
            registry,
            formats: FormatOptions::default(),
        }
    }

    pub fn with_formats(mut self, formats: FormatOptions) -> Self {
        self.formats = formats;
        self
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Resolve every selected schema entry.
    ///
    /// Per-field failures degrade to the entry's fallback and are recorded
    /// as warnings. In strict mode, missing required values are collected
    /// and surfaced once as [`MappingError::Validation`]; lenient mode never
    /// fails.
    pub fn resolve(
        &self,
        sources: &DataSources,
        options: &ResolveOptions,
    ) -> MappingResult<Resolution> {
        let mut resolution = Resolution::default();

        for entry in self.registry.entries() {
            if !options.selects(&entry.key) {
                continue;
            }

            let raw = match sources.lookup(&entry.source_path) {
                Some(value) if !is_missing(value) => value,
                _ => {
                    if entry.required {
                        match options.mode {
                            ResolveMode::Strict => {
                                resolution.errors.push(format!(
                                    "required value missing: {} (source: {})",
                                    entry.key, entry.source_path
                                ));
                                continue;
                            }
                            ResolveMode::Lenient => {
                                let warning = format!(
                                    "required value missing: {} (source: {}), using fallback",
                                    entry.key, entry.source_path
                                );
                                tracing::warn!(key = %entry.key, "missing required value");
                                resolution.warnings.push(warning);
                            }
                        }
                    }
                    // Date entries with no fallback of their own render the
                    // current date, like the date handler does for blank
                    // input.
                    let substituted = if entry.value_type == ValueType::Date
                        && entry.fallback.is_empty()
                    {
                        entry
                            .value_type
                            .apply(&Value::String(String::new()), &self.formats)
                            .unwrap_or_default()
                    } else {
                        entry.fallback.clone()
                    };
                    resolution.data.insert(entry.key.clone(), substituted);
                    continue;
                }
            };

            let mut value = match entry.value_type.apply(raw, &self.formats) {
                Ok(value) => value,
                Err(reason) => {
                    tracing::warn!(key = %entry.key, %reason, "type conversion failed");
                    resolution.warnings.push(format!(
                        "type conversion failed for {}: {}, using fallback",
                        entry.key, reason
                    ));
                    entry.fallback.clone()
                }
            };

            if let Some(transform) = &entry.transform {
                match transform(&value) {
                    Ok(transformed) => value = transformed,
                    Err(reason) => {
                        // Keep the pre-transform value.
                        resolution.warnings.push(format!(
                            "transform failed for {}: {}",
                            entry.key, reason
                        ));
                    }
                }
            }

            resolution.data.insert(entry.key.clone(), value);
        }

        if options.mode == ResolveMode::Strict && !resolution.errors.is_empty() {
            return Err(MappingError::Validation(resolution.errors));
        }
        Ok(resolution)
    }

    /// Partition schema keys against the placeholder keys present in a
    /// template. An empty template is 100% covered.
    pub fn coverage_report(&self, template_keys: &BTreeSet<String>) -> CoverageReport {
        let mut covered = Vec::new();
        let mut missing = Vec::new();
        for key in template_keys {
            if self.registry.contains(key) {
                covered.push(key.clone());
            } else {
                missing.push(key.clone());
            }
        }
        let extra: Vec<String> = self
            .registry
            .keys()
            .into_iter()
            .filter(|key| !template_keys.contains(key))
            .collect();
        let coverage_percent = if template_keys.is_empty() {
            100.0
        } else {
            covered.len() as f64 / template_keys.len() as f64 * 100.0
        };
        CoverageReport {
            covered,
            missing,
            extra,
            coverage_percent,
        }
    }
}

/// A present value still counts as missing when it is null or an empty
/// string; an unresolved path is missing by definition.
fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
