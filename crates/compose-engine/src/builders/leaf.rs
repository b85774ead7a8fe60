//! Leaf builder

use super::{build_children, BuildServices, UnitBuilder};
use crate::body::UnitBody;
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::template;
use crate::unit::{ExecutionUnit, LeafUnit};
use compose_spec::{unit_types, Specification};

/// Builder for `leaf` (and legacy `llm`) units
///
/// Renders the instruction, loads the declared tools, then builds any
/// children whose condition holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafBuilder;

impl UnitBuilder for LeafBuilder {
    fn type_tags(&self) -> &[&'static str] {
        &[unit_types::LEAF, unit_types::LLM]
    }

    fn validate_spec(&self, spec: &Specification) -> BuildResult<()> {
        let body = UnitBody::from_spec(spec)?;
        if !body.instruction.as_deref().is_some_and(|i| !i.trim().is_empty()) {
            return Err(BuildError::specification(spec.name(), "leaf unit has no instruction"));
        }
        if body.model.is_none() {
            return Err(BuildError::specification(spec.name(), "leaf unit has no model"));
        }
        Ok(())
    }

    fn build(
        &self,
        spec: &Specification,
        ctx: &BuildContext,
        services: &dyn BuildServices,
    ) -> BuildResult<ExecutionUnit> {
        let name = spec.name();
        let body = UnitBody::from_spec(spec)?;
        let (Some(instruction), Some(model)) = (body.instruction.as_deref(), body.model.clone()) else {
            return Err(BuildError::specification(name, "leaf unit needs instruction and model"));
        };

        let instruction = template::render(name, instruction, &ctx.variables)?;
        let tools = services.tools().load_all(name, &body.tools)?;
        let children = build_children(spec, &body.children, ctx, services)?;

        let unit = LeafUnit::new(name, model, instruction)?
            .with_description(spec.metadata().description.clone())
            .with_tools(tools)
            .with_output_key(body.output_key)
            .with_children(children);
        Ok(ExecutionUnit::Leaf(unit))
    }
}
