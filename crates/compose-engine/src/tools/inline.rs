//! Inline tool declarations
//!
//! Only the declarative part of an inline tool is accepted: name,
//! description and parameter schema. Source text is refused whether or not
//! inline tools are enabled.

use super::{ToolLoader, ToolOrigin, ToolRef};
use crate::body::{ToolDecl, ToolSource};
use crate::error::{BuildError, BuildResult};

/// Loader for `inline` tools
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineToolLoader {
    allowed: bool,
}

impl InlineToolLoader {
    /// Create loader; `allowed` mirrors `security.allow_inline_tools`
    #[inline]
    #[must_use]
    pub fn new(allowed: bool) -> Self {
        Self { allowed }
    }
}

impl ToolLoader for InlineToolLoader {
    fn source(&self) -> ToolSource {
        ToolSource::Inline
    }

    fn load(&self, unit: &str, decl: &ToolDecl) -> BuildResult<ToolRef> {
        if decl.code.is_some() {
            return Err(BuildError::security(
                unit,
                format!("inline tool '{}' carries source code, which is never executed", decl.name),
            ));
        }
        if !self.allowed {
            return Err(BuildError::security(
                unit,
                format!("inline tool '{}' refused: inline tools are disabled", decl.name),
            ));
        }
        let description = decl.description.as_deref().ok_or_else(|| {
            BuildError::specification(unit, format!("inline tool '{}' needs a description", decl.name))
        })?;

        let mut tool = ToolRef::new(&decl.name, ToolOrigin::Inline).with_description(description);
        if let Some(parameters) = &decl.parameters {
            tool = tool.with_parameters(parameters.clone());
        }
        Ok(tool)
    }
}
