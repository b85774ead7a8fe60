//! Specification documents
//!
//! Two stages of the same document:
//! - [`SpecDocument`]: what the store hands out, a resolved JSON tree with origin
//! - [`Specification`]: what the validator hands out, typed and checked

use crate::naming::normalize_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Document kinds, each stored in its own directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecKind {
    /// A single composable unit
    UnitSpec,
    /// A composite workflow
    WorkflowTemplate,
    /// A tool made available to leaf units
    ToolSpec,
    /// A model configuration
    ModelConfig,
}

impl SpecKind {
    /// All kinds, in store search order
    pub const ALL: [SpecKind; 4] = [
        SpecKind::UnitSpec,
        SpecKind::WorkflowTemplate,
        SpecKind::ToolSpec,
        SpecKind::ModelConfig,
    ];

    /// Directory holding documents of this kind
    #[inline]
    #[must_use]
    pub fn directory(self) -> &'static str {
        match self {
            Self::UnitSpec => "units",
            Self::WorkflowTemplate => "workflows",
            Self::ToolSpec => "tools",
            Self::ModelConfig => "models",
        }
    }

    /// Wire name of the kind
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnitSpec => "UnitSpec",
            Self::WorkflowTemplate => "WorkflowTemplate",
            Self::ToolSpec => "ToolSpec",
            Self::ModelConfig => "ModelConfig",
        }
    }

    /// Whether documents of this kind can be built into execution units
    #[inline]
    #[must_use]
    pub fn is_composable(self) -> bool {
        matches!(self, Self::UnitSpec | Self::WorkflowTemplate)
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown kind '{s}'"))
    }
}

/// Document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Declared name
    pub name: String,
    /// Document version
    #[serde(default)]
    pub version: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Metadata {
    /// Create metadata with a name only
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
            tags: Vec::new(),
        }
    }
}

/// A loaded document with every `$ref` resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument {
    /// Name the document was requested under
    pub name: String,
    /// File the document came from (`None` for inline documents)
    pub path: Option<PathBuf>,
    /// Document tree
    pub value: Value,
}

impl SpecDocument {
    /// Create document from an in-memory value
    #[inline]
    #[must_use]
    pub fn inline(value: Value) -> Self {
        let name = value
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("<inline>")
            .to_string();
        Self {
            name,
            path: None,
            value,
        }
    }

    /// Declared `metadata.name`, if present
    #[inline]
    #[must_use]
    pub fn declared_name(&self) -> Option<&str> {
        self.value.pointer("/metadata/name").and_then(Value::as_str)
    }

    /// Name to report in diagnostics: declared name, else request name
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.declared_name().unwrap_or(&self.name)
    }

    /// Get value at a dotted path (`body.children`)
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        get_path(&self.value, path)
    }
}

/// Get value at a dotted path inside a JSON tree
#[must_use]
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// A validated specification
///
/// Only [`SpecValidator`](crate::SpecValidator) constructs these, so every
/// instance has passed structural validation for its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    api_version: String,
    kind: SpecKind,
    metadata: Metadata,
    body: Map<String, Value>,
    #[serde(skip)]
    origin: Option<PathBuf>,
}

impl Specification {
    pub(crate) fn new(
        api_version: String,
        kind: SpecKind,
        metadata: Metadata,
        body: Map<String, Value>,
        origin: Option<PathBuf>,
    ) -> Self {
        Self {
            api_version,
            kind,
            metadata,
            body,
            origin,
        }
    }

    /// Declared `apiVersion`
    #[inline]
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Document kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SpecKind {
        self.kind
    }

    /// Document metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Declared name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Declared name in identifier-safe form
    #[inline]
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.metadata.name)
    }

    /// Kind-specific body
    #[inline]
    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Body field by key
    #[inline]
    #[must_use]
    pub fn body_field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Declared unit type tag (`body.type`)
    #[inline]
    #[must_use]
    pub fn unit_type(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    /// File the specification was loaded from
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_directories() {
        assert_eq!(SpecKind::UnitSpec.directory(), "units");
        assert_eq!(SpecKind::WorkflowTemplate.directory(), "workflows");
        assert_eq!(SpecKind::ToolSpec.directory(), "tools");
        assert_eq!(SpecKind::ModelConfig.directory(), "models");
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("ToolSpec".parse::<SpecKind>(), Ok(SpecKind::ToolSpec));
        assert!("Agent".parse::<SpecKind>().is_err());
    }

    #[test]
    fn only_units_and_workflows_compose() {
        assert!(SpecKind::UnitSpec.is_composable());
        assert!(SpecKind::WorkflowTemplate.is_composable());
        assert!(!SpecKind::ToolSpec.is_composable());
        assert!(!SpecKind::ModelConfig.is_composable());
    }

    #[test]
    fn inline_document_takes_declared_name() {
        let doc = SpecDocument::inline(json!({"metadata": {"name": "preview"}}));
        assert_eq!(doc.name, "preview");
        assert_eq!(doc.display_name(), "preview");
        assert!(doc.path.is_none());
    }

    #[test]
    fn inline_document_without_name() {
        let doc = SpecDocument::inline(json!({"body": {}}));
        assert_eq!(doc.display_name(), "<inline>");
        assert!(doc.declared_name().is_none());
    }

    #[test]
    fn dotted_path_lookup() {
        let value = json!({"body": {"model": {"primary": "m1"}}});
        assert_eq!(get_path(&value, "body.model.primary"), Some(&json!("m1")));
        assert_eq!(get_path(&value, "body.missing"), None);
        assert_eq!(get_path(&value, "body.model.primary.deeper"), None);
    }
}
