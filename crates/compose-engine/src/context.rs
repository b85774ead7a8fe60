//! Build context threaded through recursive builds
//!
//! Contexts are values: deriving a child context copies the parent's
//! variables and overlays the child's overrides, so a child build never
//! changes what its parent or siblings see.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Variable and environment bindings for one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
    /// Deployment environment ("development", "production", ...)
    pub environment: String,
    /// Requesting user
    pub user_id: Option<String>,
    /// Session identifier
    pub session_id: String,
    /// Template and condition variables
    pub variables: Map<String, Value>,
    /// Declared name of the unit whose child is being built
    pub parent_unit_name: Option<String>,
    /// Normalized names of the units under construction, outermost first
    #[serde(default)]
    lineage: Vec<String>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            user_id: None,
            session_id: Ulid::new().to_string(),
            variables: Map::new(),
            parent_unit_name: None,
            lineage: Vec::new(),
        }
    }
}

impl BuildContext {
    /// Create context with a fresh session id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With environment
    #[inline]
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// With user id
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// With session id
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// With one variable bound
    #[inline]
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// With a set of variables bound
    #[must_use]
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Look up a variable
    #[inline]
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Documents under construction, outermost first
    #[inline]
    #[must_use]
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Current nesting depth
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lineage.len()
    }

    /// Whether `name` is already under construction
    #[inline]
    #[must_use]
    pub fn is_building(&self, name: &str) -> bool {
        self.lineage.iter().any(|n| n == name)
    }

    /// Context for building the unit `name` itself
    #[must_use]
    pub fn enter(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.lineage.push(name.into());
        next
    }

    /// Context for a child of `parent`, with `overrides` laid over the
    /// inherited variables
    #[must_use]
    pub fn child_context(&self, parent: &str, overrides: &Map<String, Value>) -> Self {
        let mut child = self.clone();
        child.parent_unit_name = Some(parent.to_string());
        for (key, value) in overrides {
            child.variables.insert(key.clone(), value.clone());
        }
        child
    }
}
