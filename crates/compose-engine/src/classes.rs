//! Custom unit classes
//!
//! A class is accepted into the [`ClassRegistry`] only if its reflected
//! [`ClassSignature`] shows an async `run_async` entrypoint taking exactly
//! one parameter. The check runs once, at registration.
//!
//! Classes declared in specification content (`implementation.class_definition`)
//! go through a [`ClassDefinitionLoader`]. The built-in loader accepts only a
//! declarative mapping and never executes source text.

use crate::error::{BuildError, BuildResult};
use crate::template;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Entrypoint every custom class must expose
pub const RUN_ENTRYPOINT: &str = "run_async";

/// Parameter count of [`RUN_ENTRYPOINT`]
pub const RUN_ARITY: usize = 1;

/// One reflected entrypoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointSignature {
    /// Method name
    pub name: String,
    /// Whether the method is async
    pub is_async: bool,
    /// Parameter names
    pub params: Vec<String>,
}

impl EntrypointSignature {
    /// Async entrypoint
    #[must_use]
    pub fn asynchronous(name: impl Into<String>, params: &[&str]) -> Self {
        Self {
            name: name.into(),
            is_async: true,
            params: params.iter().map(ToString::to_string).collect(),
        }
    }

    /// Blocking entrypoint
    #[must_use]
    pub fn blocking(name: impl Into<String>, params: &[&str]) -> Self {
        Self {
            is_async: false,
            ..Self::asynchronous(name, params)
        }
    }
}

/// Reflection metadata of a class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSignature {
    /// Exposed entrypoints
    pub entrypoints: Vec<EntrypointSignature>,
}

impl ClassSignature {
    /// Signature of a class implementing the run contract
    #[must_use]
    pub fn runnable() -> Self {
        Self {
            entrypoints: vec![EntrypointSignature::asynchronous(RUN_ENTRYPOINT, &["invocation"])],
        }
    }

    /// With entrypoint
    #[must_use]
    pub fn with_entrypoint(mut self, entrypoint: EntrypointSignature) -> Self {
        self.entrypoints.push(entrypoint);
        self
    }

    /// Entrypoint by name
    #[must_use]
    pub fn entrypoint(&self, name: &str) -> Option<&EntrypointSignature> {
        self.entrypoints.iter().find(|e| e.name == name)
    }
}

/// Input handed to a class entrypoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// Name of the unit being run
    pub unit_name: String,
    /// Merged unit parameters
    pub parameters: Map<String, Value>,
    /// Runtime input
    pub input: Value,
}

/// Failure inside a class entrypoint
#[derive(Debug, thiserror::Error)]
pub enum ClassError {
    /// The class does not implement the entrypoint
    #[error("entrypoint '{0}' is not implemented")]
    NotImplemented(&'static str),

    /// The entrypoint ran and failed
    #[error("{0}")]
    Failed(String),
}

/// Custom unit class
#[async_trait]
pub trait UnitClass: Send + Sync {
    /// Reflected entrypoints; a class that does not list `run_async` is
    /// rejected at registration
    fn signature(&self) -> ClassSignature {
        ClassSignature::default()
    }

    /// Run the unit
    async fn run_async(&self, _invocation: Invocation) -> Result<Value, ClassError> {
        Err(ClassError::NotImplemented(RUN_ENTRYPOINT))
    }
}

/// Check the run contract against a class signature
pub fn check_contract(name: &str, signature: &ClassSignature) -> BuildResult<()> {
    let Some(entry) = signature.entrypoint(RUN_ENTRYPOINT) else {
        return Err(BuildError::specification(
            name,
            format!("class does not implement '{RUN_ENTRYPOINT}'"),
        ));
    };
    if !entry.is_async {
        return Err(BuildError::specification(
            name,
            format!("'{RUN_ENTRYPOINT}' must be async"),
        ));
    }
    if entry.params.len() != RUN_ARITY {
        return Err(BuildError::specification(
            name,
            format!(
                "'{RUN_ENTRYPOINT}' takes {} parameters, expected {RUN_ARITY}",
                entry.params.len()
            ),
        ));
    }
    Ok(())
}

/// Registered custom classes by name
#[derive(Default)]
pub struct ClassRegistry {
    classes: DashMap<String, Arc<dyn UnitClass>>,
}

impl ClassRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class` under `name`, replacing any earlier registration
    ///
    /// Fails when the class does not satisfy the run contract.
    pub fn register(&self, name: impl Into<String>, class: Arc<dyn UnitClass>) -> BuildResult<()> {
        let name = name.into();
        check_contract(&name, &class.signature())?;
        if self.classes.insert(name.clone(), class).is_some() {
            tracing::debug!(class = %name, "custom class replaced");
        } else {
            tracing::debug!(class = %name, "custom class registered");
        }
        Ok(())
    }

    /// Class by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn UnitClass>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Remove a class
    pub fn remove(&self, name: &str) -> bool {
        self.classes.remove(name).is_some()
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.classes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered classes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.names())
            .finish()
    }
}

/// Turns a `class_definition` into a class
pub trait ClassDefinitionLoader: Send + Sync {
    /// Compile the definition found in `unit`
    fn load(&self, unit: &str, definition: &Value) -> BuildResult<Arc<dyn UnitClass>>;
}

/// Declarative class definition
///
/// ```yaml
/// class_definition:
///   entrypoint: run_async
///   params: [invocation]
///   respond: "Hello ${name}, you said ${input}"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeClass {
    /// Entrypoint name
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    /// Entrypoint parameters
    #[serde(default = "default_params")]
    pub params: Vec<String>,
    /// Response template, rendered against the parameters and `input`
    pub respond: String,
}

fn default_entrypoint() -> String {
    RUN_ENTRYPOINT.to_string()
}

fn default_params() -> Vec<String> {
    vec!["invocation".to_string()]
}

#[async_trait]
impl UnitClass for DeclarativeClass {
    fn signature(&self) -> ClassSignature {
        ClassSignature::default().with_entrypoint(EntrypointSignature {
            name: self.entrypoint.clone(),
            is_async: true,
            params: self.params.clone(),
        })
    }

    async fn run_async(&self, invocation: Invocation) -> Result<Value, ClassError> {
        let mut variables = invocation.parameters;
        variables.insert("input".to_string(), invocation.input);
        template::render(&invocation.unit_name, &self.respond, &variables)
            .map(Value::String)
            .map_err(|e| ClassError::Failed(e.to_string()))
    }
}

/// Loader accepting only [`DeclarativeClass`] mappings
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeClassLoader;

impl DeclarativeClassLoader {
    /// Create loader
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClassDefinitionLoader for DeclarativeClassLoader {
    fn load(&self, unit: &str, definition: &Value) -> BuildResult<Arc<dyn UnitClass>> {
        let Value::Object(map) = definition else {
            return Err(BuildError::security(
                unit,
                "class_definition is source text; only declarative definitions are accepted",
            ));
        };
        if map.contains_key("source") || map.contains_key("code") {
            return Err(BuildError::security(
                unit,
                "class_definition carries source code, which is never executed",
            ));
        }
        let class: DeclarativeClass = serde_json::from_value(definition.clone())
            .map_err(|e| BuildError::specification(unit, format!("invalid class_definition: {e}")))?;
        Ok(Arc::new(class))
    }
}
