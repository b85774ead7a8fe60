//! Custom class builder

use super::{build_children, BuildServices, UnitBuilder};
use crate::body::UnitBody;
use crate::classes::UnitClass;
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::unit::{CustomUnit, ExecutionUnit};
use compose_spec::{unit_types, Specification};
use std::sync::Arc;

/// Name a dynamically defined class is registered under: the declared
/// `class`, else the unit's normalized name
#[must_use]
pub fn dynamic_class_name(spec: &Specification, body: &UnitBody) -> String {
    body.class.clone().unwrap_or_else(|| spec.normalized_name())
}

/// Compile and register the class defined in `spec`'s
/// `implementation.class_definition`
///
/// Fails with a security error when dynamic classes are disabled.
pub fn register_dynamic_class(
    spec: &Specification,
    body: &UnitBody,
    services: &dyn BuildServices,
) -> BuildResult<(String, Arc<dyn UnitClass>)> {
    let unit = spec.name();
    let Some(definition) = body.class_definition() else {
        return Err(BuildError::specification(unit, "no class_definition to register"));
    };
    let Some(loader) = services.class_loader() else {
        return Err(BuildError::security(
            unit,
            "class_definition refused: dynamic classes are disabled",
        ));
    };

    let class = loader.load(unit, definition)?;
    let name = dynamic_class_name(spec, body);
    services.classes().register(name.clone(), Arc::clone(&class))?;
    tracing::info!(unit, class = %name, "dynamic class registered");
    Ok((name, class))
}

/// Builder for `custom` units
///
/// Parameters are the context variables with the declared `parameters`
/// laid over them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomBuilder;

impl CustomBuilder {
    fn resolve_class(
        spec: &Specification,
        body: &UnitBody,
        services: &dyn BuildServices,
    ) -> BuildResult<(String, Arc<dyn UnitClass>)> {
        if let Some(name) = &body.class {
            if let Some(class) = services.classes().get(name) {
                return Ok((name.clone(), class));
            }
        }
        if body.class_definition().is_some() {
            return register_dynamic_class(spec, body, services);
        }
        let name = body.class.as_deref().unwrap_or_default();
        Err(BuildError::specification(
            spec.name(),
            format!("custom class '{name}' is not registered"),
        ))
    }
}

impl UnitBuilder for CustomBuilder {
    fn type_tags(&self) -> &[&'static str] {
        &[unit_types::CUSTOM]
    }

    fn validate_spec(&self, spec: &Specification) -> BuildResult<()> {
        let body = UnitBody::from_spec(spec)?;
        if body.class.is_none() && body.class_definition().is_none() {
            return Err(BuildError::specification(
                spec.name(),
                "custom unit names no class",
            ));
        }
        Ok(())
    }

    fn build(
        &self,
        spec: &Specification,
        ctx: &BuildContext,
        services: &dyn BuildServices,
    ) -> BuildResult<ExecutionUnit> {
        let body = UnitBody::from_spec(spec)?;
        let (class_name, class) = Self::resolve_class(spec, &body, services)?;
        let children = build_children(spec, &body.children, ctx, services)?;

        let mut parameters = ctx.variables.clone();
        parameters.extend(body.parameters);

        let unit = CustomUnit::new(spec.name(), class_name, class, parameters)
            .with_description(spec.metadata().description.clone())
            .with_children(children);
        Ok(ExecutionUnit::Custom(unit))
    }
}
