//! Cross-component integration tests
//!
//! These tests exercise the full pipeline (defragmentation, mapping
//! resolution, rendering and the residual sweep) through the public API,
//! without any surrounding HTTP or packaging layer.

use std::sync::Arc;

use serde_json::json;

use propale_template_engine::defrag::Paragraph;
use propale_template_engine::mapping::sources::{
    CATEGORY_COMPUTED, CATEGORY_DERIVED, CATEGORY_FORM, CATEGORY_GENERATED,
};
use propale_template_engine::{
    create_registry, DataSources, DocumentPackage, MappingEntry, MappingRegistry, ResolveOptions,
    TemplateEngine, ValueType,
};

/// Text content of a rendered part, wrappers stripped.
fn part_text(package: &DocumentPackage, name: &str) -> String {
    Paragraph::scan(&package.part(name).unwrap().markup).combined_text()
}

fn proposal_sources() -> DataSources {
    DataSources::new()
        .with_category(
            CATEGORY_GENERATED,
            json!({
                "titre": "Audit Lean",
                "contexte": "## Contexte\nAcme souhaite **réduire** ses délais.",
                "objectifs": "- Cartographier les flux\n- Prioriser les chantiers",
                "methodologie": "Entretiens puis observation terrain.",
                "livrables": ["Rapport d'audit", "Plan d'action"],
            }),
        )
        .with_category(
            CATEGORY_FORM,
            json!({
                "entrepriseNom": "Acme",
                "contactNom": "Jeanne Martin",
                "contactEmail": "Jeanne.Martin@Acme.FR",
                "delaiRealisation": "6 semaines",
            }),
        )
        .with_category(CATEGORY_COMPUTED, json!({"montantTotal": 12500}))
        .with_category(
            CATEGORY_DERIVED,
            json!({
                "montantLettres": "douze mille cinq cents euros",
                "dateProposition": "2026-08-26",
                "validiteOffre": "25/09/2026",
            }),
        )
}

#[test]
fn test_fragmented_french_paragraph_renders() {
    let registry = MappingRegistry::new();
    registry
        .extend([
            MappingEntry::new("titre", "generated.titre", ValueType::Text),
            MappingEntry::new("entrepriseNom", "form.entrepriseNom", ValueType::Text),
        ])
        .unwrap();
    let engine = TemplateEngine::new(Arc::new(registry));

    let template = DocumentPackage::body(
        "<r><t>:  {</t></r><r><t>{titre}} lié à {{</t></r>\
         <r><t>entrepriseNom</t></r><r><t>}}.</t></r>",
    );
    let sources = DataSources::new()
        .with_category(CATEGORY_GENERATED, json!({"titre": "Audit Lean"}))
        .with_category(CATEGORY_FORM, json!({"entrepriseNom": "Acme"}));

    let out = engine
        .generate(&template, &sources, &ResolveOptions::lenient())
        .unwrap();
    assert_eq!(part_text(&out.package, "body"), ":  Audit Lean lié à Acme.");
}

#[test]
fn test_full_proposal_generation() {
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body(
        "<w:p><w:r><w:t>{{titre}} — {{entrepriseNom}}</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Montant : {{mon</w:t></w:r><w:r><w:t>tantTotal}} \
         ({{montantLettres}})</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Contact : {{contactEmail}}</w:t></w:r></w:p>",
    )
    .with_part(
        "header1",
        "<w:r><w:t>Proposition du {{dateProposition}}</w:t></w:r>",
    )
    .with_part("footer1", "<w:r><w:t>{{mentionLegale}}</w:t></w:r>");

    let out = engine
        .generate(&template, &proposal_sources(), &ResolveOptions::strict())
        .unwrap();

    let body = part_text(&out.package, "body");
    assert!(body.contains("Audit Lean — Acme"));
    assert!(body.contains("Montant : 12\u{a0}500,00\u{a0}€"));
    assert!(body.contains("(douze mille cinq cents euros)"));
    assert!(body.contains("Contact : jeanne.martin@acme.fr"));

    assert_eq!(
        part_text(&out.package, "header1"),
        "Proposition du 26/08/2026"
    );
    // The unmapped footer token never reaches the reader.
    assert_eq!(part_text(&out.package, "footer1"), "");
}

#[test]
fn test_strict_mode_aggregates_missing_fields() {
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body("<w:r><w:t>{{titre}}</w:t></w:r>");
    let err = engine
        .generate(&template, &DataSources::new(), &ResolveOptions::strict())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("titre"));
    assert!(message.contains("entrepriseNom"));
    assert!(message.contains("montantTotal"));
}

#[test]
fn test_lenient_mode_falls_back_and_warns() {
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body("<w:r><w:t>{{titre}}</w:t></w:r>");
    let out = engine
        .generate(&template, &DataSources::new(), &ResolveOptions::lenient())
        .unwrap();
    assert_eq!(part_text(&out.package, "body"), "Proposition commerciale");
    assert!(!out.warnings.is_empty());
}

#[test]
fn test_sweep_removes_leftovers_in_sub_parts() {
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body("<w:r><w:t>corps</w:t></w:r>")
        .with_part("header1", "<w:r><w:t>{{leftover}} titre {ok} fin</w:t></w:r>");
    let out = engine
        .generate(&template, &proposal_sources(), &ResolveOptions::lenient())
        .unwrap();
    // Full token removed, lone braces untouched.
    assert_eq!(part_text(&out.package, "header1"), " titre {ok} fin");
}

#[test]
fn test_sweep_cleans_tokens_inside_rich_sections() {
    // A literal token in a narrative value renders into rich HTML, where
    // there are no text runs; the sweep must still remove it.
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body("{{contexte}}");
    let sources = proposal_sources().with_category(
        CATEGORY_GENERATED,
        json!({
            "titre": "Audit Lean",
            "contexte": "voir {{annexe}} fin",
            "objectifs": "- ok",
        }),
    );
    let out = engine
        .generate(&template, &sources, &ResolveOptions::lenient())
        .unwrap();
    let body = &out.package.part("body").unwrap().markup;
    assert!(!body.contains("{{annexe}}"));
    assert_eq!(body, "<p>voir  fin</p>");
}

#[test]
fn test_rich_field_renders_structure() {
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body("{{contexte}}");
    let out = engine
        .generate(&template, &proposal_sources(), &ResolveOptions::lenient())
        .unwrap();
    let body = &out.package.part("body").unwrap().markup;
    assert!(body.contains("<h2>Contexte</h2>"));
    assert!(body.contains("<strong>réduire</strong>"));
}

#[test]
fn test_coverage_report_diagnostic() {
    let engine = TemplateEngine::new(create_registry());
    let template = DocumentPackage::body(
        "<w:r><w:t>{{titre}} {{entrepriseNom}} {{clefAbsente}}</w:t></w:r>",
    );
    let report = engine.coverage(&template);
    assert_eq!(report.missing, vec!["clefAbsente"]);
    assert!(report.covered.contains(&"titre".to_string()));
    assert!(report.extra.contains(&"montantTotal".to_string()));
    assert!((report.coverage_percent - 66.666).abs() < 0.01);
}

#[test]
fn test_registry_extension_at_startup() {
    let registry = create_registry();
    registry
        .extend([MappingEntry::new(
            "referenceDossier",
            "form.referenceDossier",
            ValueType::Text,
        )])
        .unwrap();
    let engine = TemplateEngine::new(registry);
    let template = DocumentPackage::body("<w:r><w:t>Réf. {{referenceDossier}}</w:t></w:r>");
    let sources = proposal_sources().with_category(
        CATEGORY_FORM,
        json!({"entrepriseNom": "Acme", "referenceDossier": "PR-2026-042"}),
    );
    let out = engine
        .generate(&template, &sources, &ResolveOptions::lenient())
        .unwrap();
    assert_eq!(part_text(&out.package, "body"), "Réf. PR-2026-042");
}
