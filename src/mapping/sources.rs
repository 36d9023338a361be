//! Request-scoped data sources.
//!
//! One [`DataSources`] object is built per generation request from the
//! external collaborators (language-model output, submitted form fields,
//! financial helpers), partitioned by category, and stays immutable for the
//! duration of resolution.

use serde_json::Value;

/// Category names used by the built-in proposal schema.
pub const CATEGORY_GENERATED: &str = "generated";
pub const CATEGORY_FORM: &str = "form";
pub const CATEGORY_COMPUTED: &str = "computed";
pub const CATEGORY_DERIVED: &str = "derived";

/// The category-partitioned value tree a schema's source paths resolve
/// against.
#[derive(Debug, Clone)]
pub struct DataSources {
    root: Value,
}

impl Default for DataSources {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSources {
    /// Empty sources; every lookup misses.
    pub fn new() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
        }
    }

    /// Wrap an already-assembled category tree.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Attach one category's values, replacing any existing category of the
    /// same name.
    pub fn with_category(mut self, category: &str, values: Value) -> Self {
        if let Value::Object(map) = &mut self.root {
            map.insert(category.to_string(), values);
        }
        self
    }

    /// Walk a dot-separated path through the tree. A missing intermediate or
    /// terminal key yields `None`; an explicit JSON null is returned as-is
    /// (the resolver classifies both as missing).
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}
