//! Sequential, parallel and loop builders
//!
//! All three share [`build_children`]; they differ in the discriminator they
//! attach and, for loops, in resolving the iteration bound.

use super::{BuildServices, UnitBuilder};
use crate::body::{ChildRef, UnitBody};
use crate::condition::evaluate_condition;
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::unit::{CompositeMode, CompositeUnit, ExecutionUnit};
use compose_spec::{unit_types, Specification};
use std::num::NonZeroU32;

/// Build the declared children of `spec` in order
///
/// Each child gets a context derived from `ctx` with its own variable
/// overrides and `parent_unit_name` set to `spec`'s name. Children whose
/// condition is false in that context are skipped. A child failure is
/// wrapped with the parent's name.
pub fn build_children(
    spec: &Specification,
    children: &[ChildRef],
    ctx: &BuildContext,
    services: &dyn BuildServices,
) -> BuildResult<Vec<ExecutionUnit>> {
    let parent = spec.name();
    let mut built = Vec::with_capacity(children.len());

    for child in children {
        if child.spec_ref.trim().is_empty() {
            return Err(BuildError::specification(parent, "child entry without specRef"));
        }
        let child_ctx = ctx.child_context(parent, &child.variables);

        if let Some(condition) = &child.condition {
            if !evaluate_condition(condition, &child_ctx) {
                tracing::debug!(unit = parent, child = %child.spec_ref, "child condition false, skipped");
                continue;
            }
        }

        let unit = services
            .build_child(&child.spec_ref, &child_ctx)
            .map_err(|e| e.in_child(parent, &child.spec_ref))?;
        built.push(unit);
    }

    Ok(built)
}

fn build_composite(
    spec: &Specification,
    mode: CompositeMode,
    ctx: &BuildContext,
    services: &dyn BuildServices,
) -> BuildResult<ExecutionUnit> {
    let body = UnitBody::from_spec(spec)?;
    let children = build_children(spec, &body.children, ctx, services)?;
    let unit = CompositeUnit::new(spec.name(), mode, children)?
        .with_description(spec.metadata().description.clone());
    Ok(ExecutionUnit::Composite(unit))
}

fn require_children(spec: &Specification) -> BuildResult<()> {
    match spec.body_field("children").and_then(|c| c.as_array()) {
        Some(children) if !children.is_empty() => Ok(()),
        _ => Err(BuildError::specification(
            spec.name(),
            "composite unit declares no children",
        )),
    }
}

/// Builder for `sequential` units
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBuilder;

impl UnitBuilder for SequentialBuilder {
    fn type_tags(&self) -> &[&'static str] {
        &[unit_types::SEQUENTIAL]
    }

    fn validate_spec(&self, spec: &Specification) -> BuildResult<()> {
        require_children(spec)
    }

    fn build(
        &self,
        spec: &Specification,
        ctx: &BuildContext,
        services: &dyn BuildServices,
    ) -> BuildResult<ExecutionUnit> {
        build_composite(spec, CompositeMode::Sequential, ctx, services)
    }
}

/// Builder for `parallel` units
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBuilder;

impl UnitBuilder for ParallelBuilder {
    fn type_tags(&self) -> &[&'static str] {
        &[unit_types::PARALLEL]
    }

    fn validate_spec(&self, spec: &Specification) -> BuildResult<()> {
        require_children(spec)
    }

    fn build(
        &self,
        spec: &Specification,
        ctx: &BuildContext,
        services: &dyn BuildServices,
    ) -> BuildResult<ExecutionUnit> {
        build_composite(spec, CompositeMode::Parallel, ctx, services)
    }
}

/// Builder for `loop` units
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopBuilder;

impl LoopBuilder {
    /// Iteration bound declared by `spec`, or `default` when none is declared
    pub fn iteration_bound(spec: &Specification, default: NonZeroU32) -> BuildResult<NonZeroU32> {
        let body = UnitBody::from_spec(spec)?;
        let Some(declared) = body.max_iterations else {
            tracing::warn!(unit = spec.name(), bound = default.get(), "loop has no iteration bound, using default");
            return Ok(default);
        };
        u32::try_from(declared)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                BuildError::specification(
                    spec.name(),
                    format!("loop bound must be a positive integer, got {declared}"),
                )
            })
    }
}

impl UnitBuilder for LoopBuilder {
    fn type_tags(&self) -> &[&'static str] {
        &[unit_types::LOOP]
    }

    fn validate_spec(&self, spec: &Specification) -> BuildResult<()> {
        require_children(spec)
    }

    fn build(
        &self,
        spec: &Specification,
        ctx: &BuildContext,
        services: &dyn BuildServices,
    ) -> BuildResult<ExecutionUnit> {
        let max_iterations =
            Self::iteration_bound(spec, services.build_config().default_loop_iterations)?;
        build_composite(spec, CompositeMode::Loop { max_iterations }, ctx, services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::testing::{spec, StubServices};
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sequential_preserves_declared_order() {
        let services = StubServices::new();
        let s = spec("pipeline", json!({"type": "sequential", "children": ["a", "b", "c"]}));

        let unit = SequentialBuilder.build(&s, &BuildContext::new(), &services).unwrap();
        let names: Vec<_> = unit.children().iter().map(ExecutionUnit::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(unit.type_tag(), "sequential");
        assert_eq!(unit.description(), Some("pipeline unit"));
    }

    #[test]
    fn parallel_discriminator() {
        let services = StubServices::new();
        let s = spec("fan", json!({"type": "parallel", "children": ["a"]}));
        let unit = ParallelBuilder.build(&s, &BuildContext::new(), &services).unwrap();
        assert_eq!(unit.as_composite().unwrap().mode(), CompositeMode::Parallel);
    }

    #[test]
    fn loop_bound_default_and_explicit() {
        let services = StubServices::new();
        let ctx = BuildContext::new();

        let unbounded = spec("l", json!({"type": "loop", "children": ["a"]}));
        let unit = LoopBuilder.build(&unbounded, &ctx, &services).unwrap();
        assert_eq!(unit.as_composite().unwrap().max_iterations().map(NonZeroU32::get), Some(10));

        let bounded = spec("l", json!({"type": "loop", "children": ["a"], "maxIterations": 3}));
        let unit = LoopBuilder.build(&bounded, &ctx, &services).unwrap();
        assert_eq!(unit.as_composite().unwrap().max_iterations().map(NonZeroU32::get), Some(3));
    }

    #[test]
    fn children_get_derived_contexts() {
        let services = StubServices::new();
        let s = spec(
            "parent",
            json!({"type": "sequential", "children": [
                {"specRef": "a", "variables": {"tone": "casual"}},
                "b",
            ]}),
        );
        let ctx = BuildContext::new().with_variable("tone", "formal");

        SequentialBuilder.build(&s, &ctx, &services).unwrap();

        let seen = services.contexts();
        assert_eq!(seen[0].variable("tone"), Some(&json!("casual")));
        assert_eq!(seen[1].variable("tone"), Some(&json!("formal")));
        assert!(seen.iter().all(|c| c.parent_unit_name.as_deref() == Some("parent")));
        assert_eq!(ctx.variable("tone"), Some(&json!("formal")));
    }

    #[test]
    fn conditions_select_children() {
        let services = StubServices::new();
        let s = spec(
            "gated",
            json!({"type": "parallel", "children": [
                {"specRef": "always", "condition": true},
                {"specRef": "never", "condition": "false"},
                {"specRef": "flagged", "condition": "input.deep"},
                {"specRef": "by-override", "condition": "enabled", "variables": {"enabled": true}},
                {"specRef": "unsafe", "condition": "1 == 1"},
            ]}),
        );
        let ctx = BuildContext::new().with_variable("input", json!({"deep": true}));

        let unit = ParallelBuilder.build(&s, &ctx, &services).unwrap();
        let names: Vec<_> = unit.children().iter().map(ExecutionUnit::name).collect();
        assert_eq!(names, vec!["always", "flagged", "by-override"]);
    }

    #[test]
    fn all_children_skipped_fails() {
        let services = StubServices::new();
        let s = spec("empty", json!({"type": "sequential", "children": [{"specRef": "a", "condition": false}]}));
        let err = SequentialBuilder.build(&s, &BuildContext::new(), &services).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Specification);
        assert_eq!(err.deepest_unit(), Some("empty"));
    }

    #[test]
    fn child_failure_names_parent_and_child() {
        let mut services = StubServices::new();
        services.failing.push("bad".into());
        let s = spec("outer", json!({"type": "sequential", "children": ["ok", "bad"]}));

        let err = SequentialBuilder.build(&s, &BuildContext::new(), &services).unwrap_err();
        assert_eq!(err.unit_path(), vec!["outer"]);
        assert_eq!(err.deepest_unit(), Some("bad"));
    }
}
