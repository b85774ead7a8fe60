//! Import tools: a module and function pair resolved by an [`ImportResolver`]

use super::{ToolLoader, ToolOrigin, ToolRef};
use crate::body::{ToolDecl, ToolSource};
use crate::error::{BuildError, BuildResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Exported function metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportedFunction {
    /// Description shown to the model
    pub description: Option<String>,
    /// Parameter schema
    pub parameters: Option<Value>,
}

/// Resolves `module:function` pairs
pub trait ImportResolver: Send + Sync {
    /// Function metadata, or `None` when the module or function is unknown
    fn resolve(&self, module: &str, function: &str) -> Option<ExportedFunction>;
}

/// In-memory module table
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: RwLock<HashMap<String, HashMap<String, ExportedFunction>>>,
}

impl ModuleTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `function` from `module`
    pub fn export(&self, module: impl Into<String>, function: impl Into<String>, meta: ExportedFunction) {
        self.modules
            .write()
            .entry(module.into())
            .or_default()
            .insert(function.into(), meta);
    }

    /// Known module names, sorted
    #[must_use]
    pub fn modules(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ImportResolver for ModuleTable {
    fn resolve(&self, module: &str, function: &str) -> Option<ExportedFunction> {
        self.modules.read().get(module)?.get(function).cloned()
    }
}

/// Loader for `import` tools
#[derive(Clone)]
pub struct ImportToolLoader {
    resolver: Arc<dyn ImportResolver>,
}

impl ImportToolLoader {
    /// Create loader over `resolver`
    #[inline]
    #[must_use]
    pub fn new(resolver: Arc<dyn ImportResolver>) -> Self {
        Self { resolver }
    }
}

impl ToolLoader for ImportToolLoader {
    fn source(&self) -> ToolSource {
        ToolSource::Import
    }

    fn load(&self, unit: &str, decl: &ToolDecl) -> BuildResult<ToolRef> {
        let (Some(module), Some(function)) = (decl.module.as_deref(), decl.function.as_deref()) else {
            return Err(BuildError::specification(
                unit,
                format!("import tool '{}' needs both 'module' and 'function'", decl.name),
            ));
        };
        let exported = self
            .resolver
            .resolve(module, function)
            .ok_or_else(|| BuildError::not_found("imported function", format!("{module}:{function}")))?;

        let mut tool = ToolRef::new(
            &decl.name,
            ToolOrigin::Import {
                module: module.to_string(),
                function: function.to_string(),
            },
        );
        if let Some(description) = decl.description.clone().or(exported.description) {
            tool = tool.with_description(description);
        }
        if let Some(parameters) = decl.parameters.clone().or(exported.parameters) {
            tool = tool.with_parameters(parameters);
        }
        Ok(tool)
    }
}
