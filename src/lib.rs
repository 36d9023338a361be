//! Template placeholder resolution engine for commercial proposal
//! generation.
//!
//! Pipeline: raw template package → placeholder defragmentation → mapping
//! resolution → substitution rendering → residual sweep → final package.
//! Everything is synchronous and side-effect-free over in-memory strings;
//! the HTTP layer, language-model adapters and packaging backends live in
//! the surrounding application.

// Shared infrastructure
pub mod config;
pub mod error;
pub mod telemetry;

// Pipeline components
pub mod defrag;
pub mod mapping;
pub mod placeholder;
pub mod render;
pub mod sweep;

// Orchestration
pub mod engine;

pub use engine::{GeneratedDocument, TemplateEngine};
pub use error::{EngineError, EngineResult};
pub use mapping::{
    create_registry, default_registry, DataSources, MappingEntry, MappingRegistry,
    MappingResolver, ResolveMode, ResolveOptions, ValueType,
};
pub use sweep::{DocumentPackage, DocumentPart};
