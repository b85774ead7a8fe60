//! Tool loading for leaf units
//!
//! Each declared tool names a source, and each source has a pluggable
//! [`ToolLoader`]:
//! - `registry`: lookup in a [`ToolCatalog`]
//! - `inline`: declared in the unit itself, gated by configuration
//! - `import`: a module and function pair, through an [`ImportResolver`]

pub mod import;
pub mod inline;
pub mod registry;

pub use import::{ExportedFunction, ImportResolver, ImportToolLoader, ModuleTable};
pub use inline::InlineToolLoader;
pub use registry::{InMemoryToolCatalog, RegistryToolLoader, SpecToolCatalog, ToolCatalog};

use crate::body::{ToolDecl, ToolSource};
use crate::error::{BuildError, BuildResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Where a loaded tool came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolOrigin {
    /// Tool catalog
    Registry,
    /// Unit declaration
    Inline,
    /// Module function
    Import {
        /// Module path
        module: String,
        /// Function name
        function: String,
    },
}

/// A loaded tool, as handed to the runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRef {
    /// Tool name
    pub name: String,
    /// Source
    pub origin: ToolOrigin,
    /// Description shown to the model
    pub description: Option<String>,
    /// Parameter schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolRef {
    /// Create tool reference
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, origin: ToolOrigin) -> Self {
        Self {
            name: name.into(),
            origin,
            description: None,
            parameters: None,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With parameter schema
    #[inline]
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Loader for one tool source
pub trait ToolLoader: Send + Sync {
    /// Source this loader handles
    fn source(&self) -> ToolSource;

    /// Load the tool declared by `unit`
    fn load(&self, unit: &str, decl: &ToolDecl) -> BuildResult<ToolRef>;
}

/// Tool loaders keyed by source
#[derive(Default, Clone)]
pub struct ToolLoaderRegistry {
    loaders: HashMap<ToolSource, Arc<dyn ToolLoader>>,
}

impl ToolLoaderRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader, replacing any loader for the same source
    pub fn register(&mut self, loader: Arc<dyn ToolLoader>) {
        self.loaders.insert(loader.source(), loader);
    }

    /// Loader for `source`
    #[inline]
    #[must_use]
    pub fn get(&self, source: ToolSource) -> Option<&Arc<dyn ToolLoader>> {
        self.loaders.get(&source)
    }

    /// Load one declaration
    pub fn load(&self, unit: &str, decl: &ToolDecl) -> BuildResult<ToolRef> {
        let loader = self.get(decl.source).ok_or_else(|| {
            BuildError::specification(
                unit,
                format!("no loader for {} tool '{}'", decl.source.as_str(), decl.name),
            )
        })?;
        let tool = loader.load(unit, decl)?;
        tracing::debug!(unit, tool = %tool.name, source = decl.source.as_str(), "tool loaded");
        Ok(tool)
    }

    /// Load every declaration, stopping at the first failure
    pub fn load_all(&self, unit: &str, decls: &[ToolDecl]) -> BuildResult<Vec<ToolRef>> {
        decls.iter().map(|decl| self.load(unit, decl)).collect()
    }

    /// Sources with a loader
    #[must_use]
    pub fn sources(&self) -> Vec<ToolSource> {
        let mut sources: Vec<_> = self.loaders.keys().copied().collect();
        sources.sort_by_key(|s| s.as_str());
        sources
    }
}

impl fmt::Debug for ToolLoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolLoaderRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_dispatches_by_source() {
        let catalog = Arc::new(InMemoryToolCatalog::new());
        catalog.register(ToolRef::new("search", ToolOrigin::Registry).with_description("web search"));

        let mut loaders = ToolLoaderRegistry::new();
        loaders.register(Arc::new(RegistryToolLoader::new(catalog)));
        loaders.register(Arc::new(InlineToolLoader::new(true)));

        let inline: ToolDecl = serde_json::from_value(json!({
            "name": "calc", "source": "inline", "description": "adds numbers"
        }))
        .unwrap();
        let tools = loaders
            .load_all("u", &[ToolDecl::registry("search"), inline])
            .unwrap();

        assert_eq!(tools[0].description.as_deref(), Some("web search"));
        assert_eq!(tools[1].origin, ToolOrigin::Inline);
        assert_eq!(loaders.sources(), vec![ToolSource::Inline, ToolSource::Registry]);
    }

    #[test]
    fn missing_loader_is_a_build_error() {
        let decl: ToolDecl = serde_json::from_value(json!({
            "name": "f", "source": "import", "module": "m", "function": "f"
        }))
        .unwrap();
        let err = ToolLoaderRegistry::new().load("u", &decl).unwrap_err();
        assert!(err.to_string().contains("no loader for import tool 'f'"));
    }
}
