//! Builders: one strategy per unit type tag
//!
//! The [`BuilderRegistry`] maps type tags to [`UnitBuilder`]s. The factory
//! takes the registry as an immutable snapshot when it is constructed, so the
//! set of buildable types never changes under a running build.
//!
//! Builders never call each other. Children are built through
//! [`BuildServices::build_child`], which goes back through the factory so a
//! child may be of any registered type.

mod composite;
mod custom;
mod leaf;

pub use composite::{build_children, LoopBuilder, ParallelBuilder, SequentialBuilder};
pub use custom::{dynamic_class_name, register_dynamic_class, CustomBuilder};
pub use leaf::LeafBuilder;

use crate::classes::{ClassDefinitionLoader, ClassRegistry};
use crate::config::BuildConfig;
use crate::context::BuildContext;
use crate::error::BuildResult;
use crate::tools::ToolLoaderRegistry;
use crate::unit::ExecutionUnit;
use compose_spec::Specification;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// What builders may use from the factory
pub trait BuildServices: Send + Sync {
    /// Build the child specification `spec_ref` in `ctx`
    fn build_child(&self, spec_ref: &str, ctx: &BuildContext) -> BuildResult<ExecutionUnit>;

    /// Tool loaders
    fn tools(&self) -> &ToolLoaderRegistry;

    /// Custom class registry
    fn classes(&self) -> &ClassRegistry;

    /// Loader for dynamic class definitions; `None` when they are disabled
    fn class_loader(&self) -> Option<&dyn ClassDefinitionLoader>;

    /// Build limits
    fn build_config(&self) -> &BuildConfig;
}

/// Strategy turning one specification type into one unit type
pub trait UnitBuilder: Send + Sync {
    /// Type tags this builder handles
    fn type_tags(&self) -> &[&'static str];

    /// Whether this builder handles `unit_type`
    fn can_build(&self, unit_type: &str) -> bool {
        self.type_tags().contains(&unit_type)
    }

    /// Builder-specific checks beyond the validator's
    fn validate_spec(&self, spec: &Specification) -> BuildResult<()>;

    /// Build the unit
    ///
    /// Errors carry the offending unit's name.
    fn build(
        &self,
        spec: &Specification,
        ctx: &BuildContext,
        services: &dyn BuildServices,
    ) -> BuildResult<ExecutionUnit>;
}

/// Type tag to builder map, in registration order
#[derive(Default, Clone)]
pub struct BuilderRegistry {
    builders: IndexMap<String, Arc<dyn UnitBuilder>>,
}

impl BuilderRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with the built-in builders
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_builder(Arc::new(LeafBuilder));
        registry.register_builder(Arc::new(SequentialBuilder));
        registry.register_builder(Arc::new(ParallelBuilder));
        registry.register_builder(Arc::new(LoopBuilder));
        registry.register_builder(Arc::new(CustomBuilder));
        registry
    }

    /// Register `builder` under one tag, replacing any earlier builder
    pub fn register(&mut self, type_tag: impl Into<String>, builder: Arc<dyn UnitBuilder>) {
        self.builders.insert(type_tag.into(), builder);
    }

    /// Register `builder` under every tag it reports
    pub fn register_builder(&mut self, builder: Arc<dyn UnitBuilder>) {
        for tag in builder.type_tags() {
            self.builders.insert((*tag).to_string(), Arc::clone(&builder));
        }
    }

    /// Builder for `type_tag`
    #[inline]
    #[must_use]
    pub fn get(&self, type_tag: &str) -> Option<&Arc<dyn UnitBuilder>> {
        self.builders.get(type_tag)
    }

    /// Whether `type_tag` has a builder
    #[inline]
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.builders.contains_key(type_tag)
    }

    /// Registered tags, in registration order
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Number of registered tags
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Whether no tag is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("types", &self.types())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_types_in_registration_order() {
        let registry = BuilderRegistry::with_defaults();
        assert_eq!(
            registry.types(),
            vec!["leaf", "llm", "sequential", "parallel", "loop", "custom"]
        );
        assert!(registry.get("loop").unwrap().can_build("loop"));
        assert!(registry.get("agent").is_none());
    }

    #[test]
    fn register_overrides_a_tag() {
        let mut registry = BuilderRegistry::with_defaults();
        registry.register("sequential", Arc::new(ParallelBuilder));
        assert_eq!(registry.len(), 6);
        assert!(registry.get("sequential").unwrap().can_build("parallel"));
    }

    #[test]
    fn empty_registry() {
        let registry = BuilderRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains("leaf"));
    }
}
