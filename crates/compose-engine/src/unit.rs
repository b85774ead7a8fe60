//! Execution unit tree
//!
//! The result of a build: a static tree the runtime collaborator walks.
//! Constructors enforce the structural invariants, so a unit that exists
//! is well-formed:
//! - leaf units have a non-empty instruction
//! - composite units have at least one child
//! - loop bounds are finite and positive

use crate::classes::{ClassError, Invocation, UnitClass};
use crate::error::{BuildError, BuildResult};
use crate::tools::ToolRef;
use compose_spec::normalize_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Model reference with ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ModelDecl")]
pub struct ModelRef {
    /// Preferred model
    pub primary: String,
    /// Models to try when the primary is unavailable
    pub fallbacks: Vec<String>,
}

impl ModelRef {
    /// Model reference without fallbacks
    #[inline]
    #[must_use]
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks: Vec::new(),
        }
    }

    /// With fallback appended
    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, model: impl Into<String>) -> Self {
        self.fallbacks.push(model.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelDecl {
    Name(String),
    Full {
        primary: String,
        #[serde(default)]
        fallbacks: Vec<String>,
    },
}

impl From<ModelDecl> for ModelRef {
    fn from(decl: ModelDecl) -> Self {
        match decl {
            ModelDecl::Name(primary) => Self::new(primary),
            ModelDecl::Full { primary, fallbacks } => Self { primary, fallbacks },
        }
    }
}

/// How the runtime is expected to drive a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Invoke once
    Single,
    /// Children one at a time, in declared order
    InOrder,
    /// All children concurrently, then join
    Concurrent,
    /// Children re-run up to the bound
    Repeat(NonZeroU32),
    /// Delegate to the custom class
    Custom,
}

/// Single model-invocation unit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafUnit {
    name: String,
    description: Option<String>,
    model: ModelRef,
    instruction: String,
    tools: Vec<ToolRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ExecutionUnit>,
}

impl LeafUnit {
    /// Create leaf unit
    ///
    /// Fails when the rendered instruction is blank.
    pub fn new(
        name: impl Into<String>,
        model: ModelRef,
        instruction: impl Into<String>,
    ) -> BuildResult<Self> {
        let name = name.into();
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(BuildError::specification(name, "rendered instruction is empty"));
        }
        Ok(Self {
            name,
            description: None,
            model,
            instruction,
            tools: Vec::new(),
            output_key: None,
            children: Vec::new(),
        })
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// With loaded tools
    #[inline]
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolRef>) -> Self {
        self.tools = tools;
        self
    }

    /// With output key
    #[inline]
    #[must_use]
    pub fn with_output_key(mut self, key: Option<String>) -> Self {
        self.output_key = key;
        self
    }

    /// With children
    #[inline]
    #[must_use]
    pub fn with_children(mut self, children: Vec<ExecutionUnit>) -> Self {
        self.children = children;
        self
    }

    /// Model reference
    #[inline]
    #[must_use]
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Rendered instruction
    #[inline]
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Loaded tools
    #[inline]
    #[must_use]
    pub fn tools(&self) -> &[ToolRef] {
        &self.tools
    }

    /// Output key
    #[inline]
    #[must_use]
    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }
}

/// Composite run discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompositeMode {
    /// Children in declared order
    Sequential,
    /// Children concurrently
    Parallel,
    /// Children repeated up to the bound
    Loop {
        /// Iteration bound
        #[serde(rename = "maxIterations")]
        max_iterations: NonZeroU32,
    },
}

impl CompositeMode {
    /// Type tag of the mode
    #[inline]
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Loop { .. } => "loop",
        }
    }
}

/// Unit owning ordered children
#[derive(Debug, Clone, Serialize)]
pub struct CompositeUnit {
    name: String,
    description: Option<String>,
    mode: CompositeMode,
    children: Vec<ExecutionUnit>,
}

impl CompositeUnit {
    /// Create composite unit
    ///
    /// Fails when `children` is empty.
    pub fn new(
        name: impl Into<String>,
        mode: CompositeMode,
        children: Vec<ExecutionUnit>,
    ) -> BuildResult<Self> {
        let name = name.into();
        if children.is_empty() {
            return Err(BuildError::specification(
                name,
                format!("{} unit has no children after build", mode.tag()),
            ));
        }
        Ok(Self {
            name,
            description: None,
            mode,
            children,
        })
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Run discriminator
    #[inline]
    #[must_use]
    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    /// Loop bound, for loop composites
    #[inline]
    #[must_use]
    pub fn max_iterations(&self) -> Option<NonZeroU32> {
        match self.mode {
            CompositeMode::Loop { max_iterations } => Some(max_iterations),
            _ => None,
        }
    }
}

/// Unit backed by a registered custom class
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomUnit {
    name: String,
    description: Option<String>,
    class_name: String,
    #[serde(skip)]
    class: Arc<dyn UnitClass>,
    parameters: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ExecutionUnit>,
}

impl CustomUnit {
    /// Create custom unit
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        class_name: impl Into<String>,
        class: Arc<dyn UnitClass>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            class_name: class_name.into(),
            class,
            parameters,
            children: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// With children
    #[inline]
    #[must_use]
    pub fn with_children(mut self, children: Vec<ExecutionUnit>) -> Self {
        self.children = children;
        self
    }

    /// Registered class name
    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Merged parameters
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Invoke the class entrypoint with `input`
    pub async fn run(&self, input: Value) -> Result<Value, ClassError> {
        let invocation = Invocation {
            unit_name: self.name.clone(),
            parameters: self.parameters.clone(),
            input,
        };
        self.class.run_async(invocation).await
    }
}

impl fmt::Debug for CustomUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomUnit")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("parameters", &self.parameters)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// A built unit
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionUnit {
    /// Model invocation
    Leaf(LeafUnit),
    /// Sequential, parallel or loop composite
    Composite(CompositeUnit),
    /// Custom class
    Custom(CustomUnit),
}

impl ExecutionUnit {
    /// Unit name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(u) => &u.name,
            Self::Composite(u) => &u.name,
            Self::Custom(u) => &u.name,
        }
    }

    /// Unit description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Leaf(u) => u.description.as_deref(),
            Self::Composite(u) => u.description.as_deref(),
            Self::Custom(u) => u.description.as_deref(),
        }
    }

    /// Type tag of the built unit
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Leaf(_) => "leaf",
            Self::Composite(u) => u.mode.tag(),
            Self::Custom(_) => "custom",
        }
    }

    /// Direct children
    #[must_use]
    pub fn children(&self) -> &[ExecutionUnit] {
        match self {
            Self::Leaf(u) => &u.children,
            Self::Composite(u) => &u.children,
            Self::Custom(u) => &u.children,
        }
    }

    /// What the runtime does with this unit
    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        match self {
            Self::Leaf(_) => RunMode::Single,
            Self::Composite(u) => match u.mode {
                CompositeMode::Sequential => RunMode::InOrder,
                CompositeMode::Parallel => RunMode::Concurrent,
                CompositeMode::Loop { max_iterations } => RunMode::Repeat(max_iterations),
            },
            Self::Custom(_) => RunMode::Custom,
        }
    }

    /// Depth-first, pre-order walk over this unit and its descendants
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Number of units in the tree
    #[must_use]
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    /// First unit in the tree with `name`
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ExecutionUnit> {
        self.iter().find(|u| u.name() == name)
    }

    /// Leaf payload
    #[must_use]
    pub fn as_leaf(&self) -> Option<&LeafUnit> {
        match self {
            Self::Leaf(u) => Some(u),
            _ => None,
        }
    }

    /// Composite payload
    #[must_use]
    pub fn as_composite(&self) -> Option<&CompositeUnit> {
        match self {
            Self::Composite(u) => Some(u),
            _ => None,
        }
    }

    /// Custom payload
    #[must_use]
    pub fn as_custom(&self) -> Option<&CustomUnit> {
        match self {
            Self::Custom(u) => Some(u),
            _ => None,
        }
    }

    /// Same unit with its name in identifier-safe form
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let name = match &mut self {
            Self::Leaf(u) => &mut u.name,
            Self::Composite(u) => &mut u.name,
            Self::Custom(u) => &mut u.name,
        };
        *name = normalize_name(name);
        self
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{} ({}", "", self.name(), self.type_tag(), indent = depth * 2)?;
        match self {
            Self::Leaf(u) => write!(f, ", model {}", u.model.primary)?,
            Self::Composite(u) => {
                if let Some(n) = u.max_iterations() {
                    write!(f, " x{n}")?;
                }
            }
            Self::Custom(u) => write!(f, " {}", u.class_name)?,
        }
        writeln!(f, ")")?;
        for child in self.children() {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Depth-first iterator over a unit tree
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<&'a ExecutionUnit>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ExecutionUnit;

    fn next(&mut self) -> Option<Self::Item> {
        let unit = self.stack.pop()?;
        self.stack.extend(unit.children().iter().rev());
        Some(unit)
    }
}
