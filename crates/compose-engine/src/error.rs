//! Error types for the composition engine
//!
//! Every failure maps onto one of four categories ([`ErrorKind`]): a missing
//! specification or class, an invalid specification, a build-time failure,
//! or a refused security-sensitive operation. Failures while building a child
//! are wrapped with the parent's name, so the outermost error still leads to
//! the deepest failing unit.

use compose_spec::{SpecError, ValidationError};

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Named specification, custom class, tool or module absent
    NotFound,
    /// Structural or semantic specification violation
    Validation,
    /// Build-time failure
    Specification,
    /// Dynamic code path refused
    Security,
}

/// Composition engine error
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Something referenced by name does not exist
    #[error("{what} not found: '{name}'")]
    NotFound {
        /// What was looked up ("custom class", "tool", ...)
        what: &'static str,
        /// Name looked up
        name: String,
    },

    /// Specification failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Specification could not be loaded
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Build-time failure in a unit
    #[error("cannot build '{unit}': {message}")]
    Specification {
        /// Unit being built
        unit: String,
        /// What went wrong
        message: String,
    },

    /// Security-sensitive operation refused
    #[error("security violation in '{unit}': {message}")]
    Security {
        /// Unit being built
        unit: String,
        /// What was refused
        message: String,
    },

    /// A unit (transitively) contains itself
    #[error("cyclic unit reference: {}", chain.join(" -> "))]
    CyclicBuild {
        /// Documents in build order, ending with the repeated one
        chain: Vec<String>,
    },

    /// Unit tree deeper than the configured limit
    #[error("build depth limit {limit} exceeded at '{unit}'")]
    DepthExceeded {
        /// Unit at which the limit was hit
        unit: String,
        /// Configured limit
        limit: usize,
    },

    /// A child of `parent` failed to build
    #[error("unit '{parent}' failed to build child '{child}': {source}")]
    Child {
        /// Parent unit
        parent: String,
        /// Child reference
        child: String,
        /// Child failure
        #[source]
        source: Box<BuildError>,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl BuildError {
    /// Create build-time failure for `unit`
    #[inline]
    pub fn specification(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Specification {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Create security violation for `unit`
    #[inline]
    pub fn security(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Security {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Create not-found error
    #[inline]
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Wrap a child failure with its parent's context
    #[inline]
    #[must_use]
    pub fn in_child(self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self::Child {
            parent: parent.into(),
            child: child.into(),
            source: Box::new(self),
        }
    }

    /// Category of the underlying failure
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Spec(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Security { .. } => ErrorKind::Security,
            Self::Child { source, .. } => source.kind(),
            Self::Spec(_)
            | Self::Specification { .. }
            | Self::CyclicBuild { .. }
            | Self::DepthExceeded { .. }
            | Self::Config(_) => ErrorKind::Specification,
        }
    }

    /// Failure with every `Child` wrapper removed
    #[must_use]
    pub fn root_cause(&self) -> &BuildError {
        match self {
            Self::Child { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Name of the deepest unit the failure is attributed to
    #[must_use]
    pub fn deepest_unit(&self) -> Option<&str> {
        match self {
            Self::Child { source, child, .. } => source.deepest_unit().or(Some(child)),
            Self::Specification { unit, .. }
            | Self::Security { unit, .. }
            | Self::DepthExceeded { unit, .. } => Some(unit),
            Self::Validation(e) => Some(&e.unit),
            Self::CyclicBuild { chain } => chain.last().map(String::as_str),
            Self::NotFound { .. } | Self::Spec(_) | Self::Config(_) => None,
        }
    }

    /// Chain of parent units from the outermost error down
    #[must_use]
    pub fn unit_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::Child { parent, source, .. } = current {
            path.push(parent.as_str());
            current = source;
        }
        path
    }
}

/// Result type alias for engine operations
pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = BuildError::specification("writer", "instruction rendered empty");
        assert_eq!(err.to_string(), "cannot build 'writer': instruction rendered empty");
    }

    #[test]
    fn error_kinds() {
        assert_eq!(BuildError::not_found("custom class", "X").kind(), ErrorKind::NotFound);
        assert_eq!(
            BuildError::from(SpecError::NotFound {
                name: "a".into(),
                searched: 4
            })
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BuildError::from(ValidationError::missing("a", "body")).kind(),
            ErrorKind::Validation
        );
        assert_eq!(BuildError::security("a", "no").kind(), ErrorKind::Security);
        assert_eq!(
            BuildError::CyclicBuild {
                chain: vec!["a".into(), "a".into()]
            }
            .kind(),
            ErrorKind::Specification
        );
    }

    #[test]
    fn child_wrapping_keeps_kind_and_deepest_unit() {
        let err = BuildError::security("leaf_x", "inline code")
            .in_child("middle", "leaf-x")
            .in_child("top", "middle");

        assert_eq!(err.kind(), ErrorKind::Security);
        assert_eq!(err.deepest_unit(), Some("leaf_x"));
        assert_eq!(err.unit_path(), vec!["top", "middle"]);
        assert!(matches!(err.root_cause(), BuildError::Security { .. }));
        assert!(err.to_string().starts_with("unit 'top' failed to build child 'middle'"));
    }

    #[test]
    fn deepest_unit_falls_back_to_child_reference() {
        let err = BuildError::from(SpecError::NotFound {
            name: "ghost".into(),
            searched: 16,
        })
        .in_child("top", "ghost");
        assert_eq!(err.deepest_unit(), Some("ghost"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
