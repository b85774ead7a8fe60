//! Typed view of a unit body
//!
//! The validator has already checked the fields each built-in type needs;
//! this layer only gives them Rust types. Keys are camelCase with the
//! snake_case spellings accepted as aliases.

use crate::error::{BuildError, BuildResult};
use crate::unit::ModelRef;
use compose_spec::Specification;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Body of a `UnitSpec` or `WorkflowTemplate`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBody {
    /// Unit type tag
    #[serde(rename = "type")]
    pub unit_type: String,
    /// Model reference (leaf)
    pub model: Option<ModelRef>,
    /// Instruction template (leaf)
    pub instruction: Option<String>,
    /// Key the runtime stores the unit's output under
    #[serde(alias = "output_key")]
    pub output_key: Option<String>,
    /// Tool declarations
    #[serde(default)]
    pub tools: Vec<ToolDecl>,
    /// Child references
    #[serde(default)]
    pub children: Vec<ChildRef>,
    /// Loop bound
    #[serde(alias = "max_iterations")]
    pub max_iterations: Option<u64>,
    /// Custom class name
    pub class: Option<String>,
    /// Custom class parameters
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Dynamic class source
    pub implementation: Option<Implementation>,
}

impl UnitBody {
    /// Read the body of a validated specification
    pub fn from_spec(spec: &Specification) -> BuildResult<Self> {
        serde_json::from_value(Value::Object(spec.body().clone()))
            .map_err(|e| BuildError::specification(spec.name(), format!("malformed body: {e}")))
    }

    /// Dynamic class definition, if declared
    #[inline]
    #[must_use]
    pub fn class_definition(&self) -> Option<&Value> {
        self.implementation.as_ref()?.class_definition.as_ref()
    }
}

/// `implementation` block of a custom unit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Implementation {
    /// Class definition, compiled only when dynamic classes are enabled
    pub class_definition: Option<Value>,
}

/// Child inclusion condition: a literal boolean or an expression
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConditionExpr {
    /// `condition: true`
    Literal(bool),
    /// `condition: "input.enabled"`
    Expr(String),
}

/// Reference to a child specification
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawChildRef")]
pub struct ChildRef {
    /// Name or path of the child specification
    pub spec_ref: String,
    /// Inclusion condition; absent means always included
    pub condition: Option<ConditionExpr>,
    /// Variable overrides for the child's context
    pub variables: Map<String, Value>,
}

impl ChildRef {
    /// Unconditional child without overrides
    #[inline]
    #[must_use]
    pub fn named(spec_ref: impl Into<String>) -> Self {
        Self {
            spec_ref: spec_ref.into(),
            condition: None,
            variables: Map::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChildRef {
    Name(String),
    Entry {
        #[serde(rename = "specRef", alias = "spec_ref")]
        spec_ref: String,
        #[serde(default)]
        condition: Option<ConditionExpr>,
        #[serde(default)]
        variables: Map<String, Value>,
    },
}

impl From<RawChildRef> for ChildRef {
    fn from(raw: RawChildRef) -> Self {
        match raw {
            RawChildRef::Name(spec_ref) => Self::named(spec_ref),
            RawChildRef::Entry {
                spec_ref,
                condition,
                variables,
            } => Self {
                spec_ref,
                condition,
                variables,
            },
        }
    }
}

/// Where a tool comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
    /// Looked up by name in a tool catalog
    #[default]
    Registry,
    /// Declared in the unit itself
    Inline,
    /// Resolved from a module and function pair
    Import,
}

impl ToolSource {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Inline => "inline",
            Self::Import => "import",
        }
    }
}

/// Tool declaration in a unit body
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawToolDecl")]
pub struct ToolDecl {
    /// Tool name
    pub name: String,
    /// Loader to use
    pub source: ToolSource,
    /// Description (inline tools)
    pub description: Option<String>,
    /// Parameter schema (inline tools)
    pub parameters: Option<Value>,
    /// Module (import tools)
    pub module: Option<String>,
    /// Function (import tools)
    pub function: Option<String>,
    /// Source text; never executed
    pub code: Option<String>,
}

impl ToolDecl {
    /// Registry tool by name
    #[inline]
    #[must_use]
    pub fn registry(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ToolSource::Registry,
            description: None,
            parameters: None,
            module: None,
            function: None,
            code: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawToolDecl {
    Name(String),
    Declared {
        name: String,
        #[serde(default, alias = "type")]
        source: ToolSource,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        parameters: Option<Value>,
        #[serde(default)]
        module: Option<String>,
        #[serde(default)]
        function: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
}

impl From<RawToolDecl> for ToolDecl {
    fn from(raw: RawToolDecl) -> Self {
        match raw {
            RawToolDecl::Name(name) => Self::registry(name),
            RawToolDecl::Declared {
                name,
                source,
                description,
                parameters,
                module,
                function,
                code,
            } => Self {
                name,
                source,
                description,
                parameters,
                module,
                function,
                code,
            },
        }
    }
}
