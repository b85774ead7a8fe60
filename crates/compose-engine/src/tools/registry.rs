//! Registry-backed tools

use super::{ToolLoader, ToolOrigin, ToolRef};
use crate::body::{ToolDecl, ToolSource};
use crate::error::{BuildError, BuildResult};
use compose_spec::{SpecKind, SpecStore, SpecValidator};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Externally owned tool catalog
pub trait ToolCatalog: Send + Sync {
    /// Look up a tool by name; `Ok(None)` when the catalog has no such tool
    fn lookup(&self, name: &str) -> BuildResult<Option<ToolRef>>;
}

/// Catalog filled programmatically
#[derive(Debug, Default)]
pub struct InMemoryToolCatalog {
    tools: RwLock<HashMap<String, ToolRef>>,
}

impl InMemoryToolCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tool
    pub fn register(&self, tool: ToolRef) {
        self.tools.write().insert(tool.name.clone(), tool);
    }

    /// Remove a tool
    pub fn remove(&self, name: &str) -> Option<ToolRef> {
        self.tools.write().remove(name)
    }

    /// Number of tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

impl ToolCatalog for InMemoryToolCatalog {
    fn lookup(&self, name: &str) -> BuildResult<Option<ToolRef>> {
        Ok(self.tools.read().get(name).cloned())
    }
}

/// Catalog of `ToolSpec` documents in the store's `tools/` directory
#[derive(Debug, Clone)]
pub struct SpecToolCatalog {
    store: SpecStore,
    validator: SpecValidator,
}

impl SpecToolCatalog {
    /// Create catalog over `store`
    #[inline]
    #[must_use]
    pub fn new(store: SpecStore, validator: SpecValidator) -> Self {
        Self { store, validator }
    }
}

impl ToolCatalog for SpecToolCatalog {
    fn lookup(&self, name: &str) -> BuildResult<Option<ToolRef>> {
        let document = match self.store.load_kind(SpecKind::ToolSpec, name) {
            Ok(document) => document,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let spec = self.validator.validate(&document)?.specification;
        if spec.kind() != SpecKind::ToolSpec {
            return Err(BuildError::specification(
                name,
                format!("expected a ToolSpec document, found {}", spec.kind()),
            ));
        }

        let mut tool = ToolRef::new(spec.name(), ToolOrigin::Registry);
        if let Some(description) = spec.body_field("description").and_then(Value::as_str) {
            tool = tool.with_description(description);
        }
        if let Some(parameters) = spec.body_field("parameters") {
            tool = tool.with_parameters(parameters.clone());
        }
        Ok(Some(tool))
    }
}

/// Loader for `registry` tools
#[derive(Clone)]
pub struct RegistryToolLoader {
    catalog: Arc<dyn ToolCatalog>,
}

impl RegistryToolLoader {
    /// Create loader over `catalog`
    #[inline]
    #[must_use]
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self { catalog }
    }
}

impl ToolLoader for RegistryToolLoader {
    fn source(&self) -> ToolSource {
        ToolSource::Registry
    }

    fn load(&self, _unit: &str, decl: &ToolDecl) -> BuildResult<ToolRef> {
        self.catalog
            .lookup(&decl.name)?
            .ok_or_else(|| BuildError::not_found("tool", &decl.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;

    #[test]
    fn in_memory_catalog() {
        let catalog = InMemoryToolCatalog::new();
        assert!(catalog.is_empty());
        catalog.register(ToolRef::new("search", ToolOrigin::Registry));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup("search").unwrap().is_some());
        assert!(catalog.lookup("other").unwrap().is_none());
        assert!(catalog.remove("search").is_some());
    }

    #[test]
    fn spec_catalog_reads_tool_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tools")).unwrap();
        fs::write(
            dir.path().join("tools/web-search.yaml"),
            r"
apiVersion: compose.dev/v1
kind: ToolSpec
metadata: {name: web-search}
body:
  description: Search the web
  parameters: {type: object}
",
        )
        .unwrap();

        let catalog = SpecToolCatalog::new(SpecStore::new(dir.path()), SpecValidator::new());
        let tool = catalog.lookup("web-search").unwrap().unwrap();
        assert_eq!(tool.name, "web-search");
        assert_eq!(tool.description.as_deref(), Some("Search the web"));
        assert!(tool.parameters.is_some());

        assert!(catalog.lookup("absent").unwrap().is_none());
    }

    #[test]
    fn unknown_registry_tool_is_not_found() {
        let loader = RegistryToolLoader::new(Arc::new(InMemoryToolCatalog::new()));
        let err = loader.load("u", &ToolDecl::registry("ghost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
