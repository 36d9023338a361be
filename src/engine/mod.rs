//! Pipeline orchestration.
//!
//! One [`TemplateEngine`] is built at startup around the mapping registry
//! and handed to request handlers. Per request: every template part is
//! defragmented, rendered against the resolved value map, then the whole
//! package is swept of residual tokens.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Settings;
use crate::defrag::defragment_document;
use crate::error::EngineResult;
use crate::mapping::{
    CoverageReport, DataSources, MappingRegistry, MappingResolver, ResolveOptions, Resolution,
};
use crate::placeholder::extract_keys;
use crate::render::{render, RenderOptions};
use crate::sweep::{sweep_package, DocumentPackage, DocumentPart};

/// The final package plus the diagnostics gathered along the way.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub package: DocumentPackage,
    pub warnings: Vec<String>,
}

/// Placeholder resolution pipeline: defragment, resolve, render, sweep.
pub struct TemplateEngine {
    resolver: MappingResolver,
    render_options: RenderOptions,
}

impl TemplateEngine {
    /// Engine with default rendering and locale options.
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self {
            resolver: MappingResolver::new(registry),
            render_options: RenderOptions::default(),
        }
    }

    /// Engine configured from loaded [`Settings`].
    pub fn from_settings(registry: Arc<MappingRegistry>, settings: &Settings) -> Self {
        Self {
            resolver: MappingResolver::new(registry)
                .with_formats(settings.rendering.format_options()),
            render_options: settings.rendering.render_options(),
        }
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn resolver(&self) -> &MappingResolver {
        &self.resolver
    }

    /// Run the full pipeline over a template package.
    ///
    /// Fails only on strict-mode validation; everything else degrades to
    /// warnings carried on the result.
    pub fn generate(
        &self,
        template: &DocumentPackage,
        sources: &DataSources,
        options: &ResolveOptions,
    ) -> EngineResult<GeneratedDocument> {
        let resolution = self.resolver.resolve(sources, options)?;
        Ok(self.assemble(template, &resolution))
    }

    /// Defragment, render and sweep with an already-resolved map.
    pub fn assemble(
        &self,
        template: &DocumentPackage,
        resolution: &Resolution,
    ) -> GeneratedDocument {
        let parts: Vec<DocumentPart> = template
            .parts
            .iter()
            .map(|part| {
                let repaired = defragment_document(&part.markup);
                let rendered = render(&repaired, &resolution.data, &self.render_options);
                DocumentPart {
                    name: part.name.clone(),
                    markup: rendered,
                }
            })
            .collect();
        let package = sweep_package(DocumentPackage { parts });
        tracing::info!(
            parts = package.parts.len(),
            values = resolution.data.len(),
            warnings = resolution.warnings.len(),
            "document assembled"
        );
        GeneratedDocument {
            package,
            warnings: resolution.warnings.clone(),
        }
    }

    /// Coverage diagnostic over every part of a template package; callable
    /// by tooling without a live generation request.
    pub fn coverage(&self, template: &DocumentPackage) -> CoverageReport {
        let mut keys = BTreeSet::new();
        for part in &template.parts {
            keys.extend(extract_keys(&part.markup));
        }
        self.resolver.coverage_report(&keys)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapping::{create_registry, MappingEntry, MappingRegistry, ValueType};

    fn engine_with(entries: Vec<MappingEntry>) -> TemplateEngine {
        let registry = MappingRegistry::new();
        registry.extend(entries).unwrap();
        TemplateEngine::new(Arc::new(registry))
    }

    #[test]
    fn test_generate_renders_and_sweeps() {
        let engine = engine_with(vec![MappingEntry::new("nom", "form.nom", ValueType::Text)]);
        let template = DocumentPackage::body(
            "<w:p><w:r><w:t>Client : {{nom}}, ref {{inconnue}}</w:t></w:r></w:p>",
        );
        let sources = DataSources::new().with_category("form", json!({"nom": "Acme"}));
        let out = engine
            .generate(&template, &sources, &ResolveOptions::lenient())
            .unwrap();
        assert_eq!(
            out.package.part("body").unwrap().markup,
            "<w:p><w:r><w:t>Client : Acme, ref </w:t></w:r></w:p>"
        );
    }

    #[test]
    fn test_generate_repairs_fragmented_tokens() {
        let engine = engine_with(vec![MappingEntry::new("nom", "form.nom", ValueType::Text)]);
        let template =
            DocumentPackage::body("<w:p><w:r><w:t>{{n</w:t></w:r><w:r><w:t>om}}</w:t></w:r></w:p>");
        let sources = DataSources::new().with_category("form", json!({"nom": "Acme"}));
        let out = engine
            .generate(&template, &sources, &ResolveOptions::lenient())
            .unwrap();
        assert_eq!(
            out.package.part("body").unwrap().markup,
            "<w:p><w:r><w:t>Acme</w:t></w:r><w:r><w:t></w:t></w:r></w:p>"
        );
    }

    #[test]
    fn test_strict_mode_propagates_validation() {
        let engine = engine_with(vec![
            MappingEntry::new("nom", "form.nom", ValueType::Text).required()
        ]);
        let template = DocumentPackage::body("<w:r><w:t>{{nom}}</w:t></w:r>");
        let result = engine.generate(&template, &DataSources::new(), &ResolveOptions::strict());
        assert!(result.is_err());
    }

    #[test]
    fn test_coverage_over_all_parts() {
        let registry = create_registry();
        let engine = TemplateEngine::new(registry);
        let template = DocumentPackage::body("<w:r><w:t>{{titre}}</w:t></w:r>")
            .with_part("header1", "<w:r><w:t>{{clefInconnue}}</w:t></w:r>");
        let report = engine.coverage(&template);
        assert!(report.covered.contains(&"titre".to_string()));
        assert_eq!(report.missing, vec!["clefInconnue"]);
    }
}
