use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::mapping::{FormatOptions, ResolveMode};
use crate::render::{RenderOptions, RICH_FIELDS};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mapping: MappingSettings,
    #[serde(default)]
    pub rendering: RenderingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingSettings {
    /// Whether missing required values abort generation.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderingSettings {
    /// Line-break element emitted for newlines in plain fields.
    #[serde(default = "default_line_break")]
    pub line_break: String,
    /// Keys rendered through the rich-text converter.
    #[serde(default = "default_rich_fields")]
    pub rich_fields: Vec<String>,
    /// Currency symbol for formatted amounts.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// chrono format string for rendered calendar dates.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_line_break() -> String {
    "<br/>".to_string()
}

fn default_rich_fields() -> Vec<String> {
    RICH_FIELDS.iter().map(|s| s.to_string()).collect()
}

fn default_currency_symbol() -> String {
    "€".to_string()
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("mapping.strict", false)?
            .set_default("rendering.line_break", default_line_break())?
            .set_default("rendering.currency_symbol", default_currency_symbol())?
            .set_default("rendering.date_format", default_date_format())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // MAPPING_STRICT, RENDERING_LINE_BREAK, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    /// The resolution mode configured for this process.
    pub fn resolve_mode(&self) -> ResolveMode {
        if self.mapping.strict {
            ResolveMode::Strict
        } else {
            ResolveMode::Lenient
        }
    }
}

impl RenderingSettings {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            line_break: self.line_break.clone(),
            rich_fields: self.rich_fields.iter().cloned().collect(),
        }
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            currency_symbol: self.currency_symbol.clone(),
            date_format: self.date_format.clone(),
        }
    }
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self { strict: false }
    }
}

impl Default for RenderingSettings {
    fn default() -> Self {
        Self {
            line_break: default_line_break(),
            rich_fields: default_rich_fields(),
            currency_symbol: default_currency_symbol(),
            date_format: default_date_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let rendering = RenderingSettings::default();
        assert_eq!(rendering.line_break, "<br/>");
        assert_eq!(rendering.currency_symbol, "€");
        assert!(rendering.rich_fields.contains(&"contexte".to_string()));
        assert!(!MappingSettings::default().strict);
    }

    #[test]
    fn test_render_options_from_settings() {
        let rendering = RenderingSettings::default();
        let options = rendering.render_options();
        assert!(options.rich_fields.contains("objectifs"));
    }
}
