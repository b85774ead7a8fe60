//! Compose Specification Layer
//!
//! The boundary between declarative specification files and the composition
//! engine.
//!
//! # Core Operations
//!
//! - **Load**: find `<kind>/<name>` under a root, parse YAML/JSON, resolve `$ref`
//! - **Cache**: keep resolved documents by request name
//! - **Validate**: turn a loaded [`SpecDocument`] into a typed [`Specification`]
//!
//! # Architecture
//!
//! ```text
//! File System → ParserRegistry → ReferenceResolver → SpecDocument → SpecValidator → Specification
//!                                        ↑_______________↓
//!                                          SpecCache (by name)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use compose_spec::{SpecStore, SpecValidator};
//!
//! let store = SpecStore::new("specs");
//! let document = store.load("research-agent")?;
//! let report = SpecValidator::new().validate(&document)?;
//! println!("{} is a {:?}", report.specification.name(), report.specification.unit_type());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod document;
pub mod error;
pub mod naming;
pub mod parsers;
pub mod reference;
pub mod store;
pub mod validator;

// Re-exports for convenience
pub use cache::{CacheStats, SpecCache};
pub use document::{get_path, Metadata, SpecDocument, SpecKind, Specification};
pub use error::{SpecError, SpecResult, ValidationError};
pub use naming::normalize_name;
pub use reference::{merge_over, REF_KEY};
pub use store::{SpecStore, StoreConfig, EXTENSIONS};
pub use validator::{
    unit_types, ComplianceWarning, SpecValidator, ValidationReport, ValidatorConfig, WarningKind,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with specifications
    pub use crate::document::{SpecDocument, SpecKind, Specification};
    pub use crate::error::{SpecError, ValidationError};
    pub use crate::store::SpecStore;
    pub use crate::validator::{ComplianceWarning, SpecValidator};
}
