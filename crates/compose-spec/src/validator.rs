//! Specification validation
//!
//! Three layers, run in order by [`SpecValidator::validate`]:
//! 1. Structure: `apiVersion`, `kind`, `metadata.name`, `body` present and typed
//! 2. Kind rules: per unit type for `UnitSpec`/`WorkflowTemplate`, required
//!    body fields for `ToolSpec`/`ModelConfig`
//! 3. Compliance: naming convention and deprecated patterns, reported as
//!    warnings that never fail validation

use crate::document::{Metadata, SpecDocument, SpecKind, Specification};
use crate::error::ValidationError;
use crate::naming::disallowed_separators;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Built-in unit type tags
pub mod unit_types {
    /// Single model-invocation unit
    pub const LEAF: &str = "leaf";
    /// Deprecated alias of [`LEAF`]
    pub const LLM: &str = "llm";
    /// Children run one at a time in declared order
    pub const SEQUENTIAL: &str = "sequential";
    /// Children run concurrently
    pub const PARALLEL: &str = "parallel";
    /// Children re-run up to an iteration bound
    pub const LOOP: &str = "loop";
    /// Registered custom class
    pub const CUSTOM: &str = "custom";
}

/// Body keys with a deprecated snake_case spelling, as (deprecated, preferred)
const DEPRECATED_BODY_KEYS: &[(&str, &str)] = &[
    ("max_iterations", "maxIterations"),
    ("output_key", "outputKey"),
];

/// Validator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Accepted `apiVersion` namespace prefixes
    pub api_prefixes: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            api_prefixes: vec!["compose.dev/".to_string()],
        }
    }
}

/// Category of a compliance warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// Name uses a disallowed separator; the factory normalizes it
    Naming,
    /// Loop without an explicit iteration bound
    UnboundedLoop,
    /// Deprecated spelling or alias
    Deprecated,
}

/// Non-fatal finding about a specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceWarning {
    /// Category
    pub kind: WarningKind,
    /// Unit the warning belongs to
    pub unit: String,
    /// Dotted path of the field concerned
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl ComplianceWarning {
    fn new(
        kind: WarningKind,
        unit: &str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            unit: unit.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ComplianceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} warning in '{}' at '{}': {}", self.kind, self.unit, self.field, self.message)
    }
}

/// Successful validation outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// The typed specification
    pub specification: Specification,
    /// Advisory findings
    pub warnings: Vec<ComplianceWarning>,
}

/// Structural and semantic specification validator
#[derive(Debug, Clone, Default)]
pub struct SpecValidator {
    config: ValidatorConfig,
}

impl SpecValidator {
    /// Create validator with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create validator with custom configuration
    #[inline]
    #[must_use]
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Run every validation layer
    ///
    /// Warnings are logged and returned; only violations fail.
    pub fn validate(&self, document: &SpecDocument) -> Result<ValidationReport, ValidationError> {
        let specification = self.validate_structure(document)?;

        let mut warnings = match specification.kind() {
            SpecKind::UnitSpec | SpecKind::WorkflowTemplate => {
                self.validate_unit_spec(&specification)?
            }
            SpecKind::ToolSpec => {
                require_string(&specification, "description")?;
                Vec::new()
            }
            SpecKind::ModelConfig => {
                require_string(&specification, "model")?;
                Vec::new()
            }
        };
        warnings.extend(self.check_naming_convention(&specification));

        for warning in &warnings {
            tracing::warn!(unit = %warning.unit, field = %warning.field, "{}", warning.message);
        }

        Ok(ValidationReport {
            specification,
            warnings,
        })
    }

    /// Check the fields every specification must carry
    ///
    /// # Errors
    /// [`ValidationError`] naming the first missing or mistyped field
    pub fn validate_structure(&self, document: &SpecDocument) -> Result<Specification, ValidationError> {
        let unit = document.display_name().to_string();
        let Some(root) = document.value.as_object() else {
            return Err(ValidationError::new(unit, "<root>", "must be a mapping"));
        };

        let api_version = root
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::missing(&unit, "apiVersion"))?;
        if !self
            .config
            .api_prefixes
            .iter()
            .any(|prefix| api_version.starts_with(prefix.as_str()))
        {
            return Err(ValidationError::new(
                &unit,
                "apiVersion",
                format!(
                    "'{api_version}' is not in a recognized namespace ({})",
                    self.config.api_prefixes.join(", ")
                ),
            ));
        }

        let kind = root
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::missing(&unit, "kind"))?
            .parse::<SpecKind>()
            .map_err(|e| ValidationError::new(&unit, "kind", e))?;

        let metadata = root
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or_else(|| ValidationError::missing(&unit, "metadata"))?;
        match metadata.get("name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => {}
            _ => return Err(ValidationError::missing(&unit, "metadata.name")),
        }
        let metadata: Metadata = serde_json::from_value(Value::Object(metadata.clone()))
            .map_err(|e| ValidationError::new(&unit, "metadata", e.to_string()))?;

        let body = match root.get("body") {
            Some(Value::Object(body)) => body.clone(),
            Some(_) => return Err(ValidationError::new(&metadata.name, "body", "must be a mapping")),
            None => return Err(ValidationError::missing(&metadata.name, "body")),
        };

        Ok(Specification::new(
            api_version.to_string(),
            kind,
            metadata,
            body,
            document.path.clone(),
        ))
    }

    /// Check unit-type specific rules
    ///
    /// Unknown type tags pass: whether they can be built is up to the
    /// builders registered with the factory.
    pub fn validate_unit_spec(&self, spec: &Specification) -> Result<Vec<ComplianceWarning>, ValidationError> {
        let unit = spec.name();
        let Some(unit_type) = spec.unit_type() else {
            return Err(ValidationError::missing(unit, "body.type"));
        };

        let mut warnings = deprecated_keys(spec);
        match unit_type {
            unit_types::LEAF | unit_types::LLM => {
                if unit_type == unit_types::LLM {
                    warnings.push(ComplianceWarning::new(
                        WarningKind::Deprecated,
                        unit,
                        "body.type",
                        format!("type '{}' is deprecated, use '{}'", unit_types::LLM, unit_types::LEAF),
                    ));
                }
                require_string(spec, "instruction")?;
                require_model(spec)?;
                if spec.body_field("children").is_some() {
                    warnings.extend(check_children(spec, false)?);
                }
            }
            unit_types::SEQUENTIAL | unit_types::PARALLEL => {
                warnings.extend(check_children(spec, true)?);
            }
            unit_types::LOOP => {
                warnings.extend(check_children(spec, true)?);
                match iteration_bound(spec) {
                    Some((field, value)) => check_iteration_bound(unit, field, value)?,
                    None => warnings.push(ComplianceWarning::new(
                        WarningKind::UnboundedLoop,
                        unit,
                        "body.maxIterations",
                        "loop has no iteration bound; the default bound applies",
                    )),
                }
            }
            unit_types::CUSTOM => {
                let has_definition = spec
                    .body_field("implementation")
                    .and_then(|i| i.get("class_definition"))
                    .is_some();
                if !has_definition {
                    require_string(spec, "class")?;
                }
                if spec.body_field("children").is_some() {
                    warnings.extend(check_children(spec, false)?);
                }
            }
            other => {
                tracing::debug!(unit, unit_type = other, "no built-in rules for unit type");
            }
        }

        if let Some(tools) = spec.body_field("tools") {
            if !tools.is_array() {
                return Err(ValidationError::new(unit, "body.tools", "must be a list"));
            }
        }

        Ok(warnings)
    }

    /// Report names using disallowed separators
    ///
    /// Advisory only: the factory normalizes names before building.
    #[must_use]
    pub fn check_naming_convention(&self, spec: &Specification) -> Vec<ComplianceWarning> {
        let unit = spec.name();
        let mut warnings = Vec::new();

        let found = disallowed_separators(unit);
        if !found.is_empty() {
            warnings.push(ComplianceWarning::new(
                WarningKind::Naming,
                unit,
                "metadata.name",
                format!("name uses disallowed separators {found:?}; it will be normalized"),
            ));
        }

        if let Some(children) = spec.body_field("children").and_then(Value::as_array) {
            for (i, child) in children.iter().enumerate() {
                let Some(spec_ref) = child_spec_ref(child) else {
                    continue;
                };
                let found = disallowed_separators(spec_ref);
                if !found.is_empty() {
                    warnings.push(ComplianceWarning::new(
                        WarningKind::Naming,
                        unit,
                        format!("body.children[{i}].specRef"),
                        format!("reference '{spec_ref}' uses disallowed separators {found:?}"),
                    ));
                }
            }
        }

        warnings
    }
}

fn require_string(spec: &Specification, key: &str) -> Result<(), ValidationError> {
    match spec.body_field(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::new(
            spec.name(),
            format!("body.{key}"),
            "is required and must be a non-empty string",
        )),
    }
}

fn require_model(spec: &Specification) -> Result<(), ValidationError> {
    let primary = match spec.body_field("model") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Object(m)) => m.get("primary").and_then(Value::as_str),
        _ => None,
    };
    match primary {
        Some(p) if !p.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::new(
            spec.name(),
            "body.model",
            "requires a primary model reference",
        )),
    }
}

/// Child entries are either a bare reference or a mapping with `specRef`
fn child_spec_ref(child: &Value) -> Option<&str> {
    match child {
        Value::String(s) => Some(s),
        Value::Object(m) => m
            .get("specRef")
            .or_else(|| m.get("spec_ref"))
            .and_then(Value::as_str),
        _ => None,
    }
}

fn check_children(spec: &Specification, required: bool) -> Result<Vec<ComplianceWarning>, ValidationError> {
    let unit = spec.name();
    let children = match spec.body_field("children") {
        Some(Value::Array(children)) => children,
        Some(_) => return Err(ValidationError::new(unit, "body.children", "must be a list")),
        None if required => return Err(ValidationError::missing(unit, "body.children")),
        None => return Ok(Vec::new()),
    };
    if required && children.is_empty() {
        return Err(ValidationError::new(unit, "body.children", "must not be empty"));
    }

    let mut warnings = Vec::new();
    for (i, child) in children.iter().enumerate() {
        match child_spec_ref(child) {
            Some(r) if !r.trim().is_empty() => {}
            _ => return Err(ValidationError::missing(unit, format!("body.children[{i}].specRef"))),
        }
        if let Some(m) = child.as_object() {
            if m.contains_key("spec_ref") && !m.contains_key("specRef") {
                warnings.push(ComplianceWarning::new(
                    WarningKind::Deprecated,
                    unit,
                    format!("body.children[{i}].spec_ref"),
                    "'spec_ref' is deprecated, use 'specRef'",
                ));
            }
            if let Some(condition) = m.get("condition") {
                if !condition.is_string() && !condition.is_boolean() {
                    return Err(ValidationError::new(
                        unit,
                        format!("body.children[{i}].condition"),
                        "must be a string or boolean",
                    ));
                }
            }
            if m.get("variables").is_some_and(|v| !v.is_object()) {
                return Err(ValidationError::new(
                    unit,
                    format!("body.children[{i}].variables"),
                    "must be a mapping",
                ));
            }
        }
    }
    Ok(warnings)
}

fn iteration_bound(spec: &Specification) -> Option<(&'static str, &Value)> {
    spec.body_field("maxIterations")
        .map(|v| ("body.maxIterations", v))
        .or_else(|| spec.body_field("max_iterations").map(|v| ("body.max_iterations", v)))
}

fn check_iteration_bound(unit: &str, field: &str, value: &Value) -> Result<(), ValidationError> {
    match value.as_u64() {
        Some(n) if n >= 1 && u32::try_from(n).is_ok() => Ok(()),
        _ => Err(ValidationError::new(
            unit,
            field,
            format!("must be a positive integer no larger than {}, got {value}", u32::MAX),
        )),
    }
}

fn deprecated_keys(spec: &Specification) -> Vec<ComplianceWarning> {
    let body: &Map<String, Value> = spec.body();
    DEPRECATED_BODY_KEYS
        .iter()
        .filter(|(old, new)| body.contains_key(*old) && !body.contains_key(*new))
        .map(|(old, new)| {
            ComplianceWarning::new(
                WarningKind::Deprecated,
                spec.name(),
                format!("body.{old}"),
                format!("'{old}' is deprecated, use '{new}'"),
            )
        })
        .collect()
}
