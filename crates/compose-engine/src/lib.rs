//! Compose Engine
//!
//! Turns validated specifications into execution unit trees.
//!
//! # Core Operations
//!
//! - **Build**: load, validate, dispatch to a builder, build children, construct
//! - **Render**: substitute context variables into instruction templates
//! - **Select**: decide optional children with a restricted condition language
//! - **Register**: accept custom classes that implement the run contract
//!
//! # Architecture
//!
//! ```text
//! CompositionFactory::build(name, ctx)
//!     → SpecStore::load → SpecValidator::validate → BuilderRegistry::get(type)
//!     → UnitBuilder::build ─┬→ template::render
//!                           ├→ ToolLoaderRegistry::load_all
//!                           └→ build_children → CompositionFactory::build (recursive)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use compose_engine::{BuildContext, CompositionFactory, FactoryConfig};
//!
//! let factory = CompositionFactory::new(FactoryConfig::new().with_root("specs"))?;
//! let ctx = BuildContext::new().with_variable("topic", "borrowing");
//! let unit = factory.build("research-flow", &ctx)?;
//! print!("{unit}");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod body;
pub mod builders;
pub mod classes;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod template;
pub mod tools;
pub mod unit;

// Re-exports for convenience
pub use builders::{BuildServices, BuilderRegistry, UnitBuilder};
pub use classes::{
    ClassDefinitionLoader, ClassError, ClassRegistry, ClassSignature, DeclarativeClassLoader,
    EntrypointSignature, Invocation, UnitClass, RUN_ENTRYPOINT,
};
pub use config::{BuildConfig, FactoryConfig, SecurityConfig};
pub use context::BuildContext;
pub use error::{BuildError, BuildResult, ErrorKind};
pub use factory::{CompositionFactory, FactoryBuilder};
pub use tools::{ToolOrigin, ToolRef};
pub use unit::{CompositeMode, CompositeUnit, CustomUnit, ExecutionUnit, LeafUnit, ModelRef, RunMode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building units
    pub use crate::context::BuildContext;
    pub use crate::error::{BuildError, ErrorKind};
    pub use crate::factory::CompositionFactory;
    pub use crate::unit::ExecutionUnit;
}
