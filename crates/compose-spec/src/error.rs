//! Error types for the specification layer
//!
//! Provides error handling for:
//! - Store operations (lookup, read, parse, `$ref` resolution)
//! - Structural and semantic validation

use std::path::PathBuf;

/// Errors raised while locating, reading or resolving specification documents
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// No document matched the requested name
    #[error("specification not found: '{name}' (searched {searched} candidate paths)")]
    NotFound {
        /// Requested name
        name: String,
        /// Number of candidate paths tried
        searched: usize,
    },

    /// IO error while reading a document
    #[error("io error reading {path}: {source}")]
    Io {
        /// Document path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid YAML/JSON
    #[error("parse error in {path}: {message}")]
    Parse {
        /// Document path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// No parser registered for the file extension
    #[error("no parser registered for extension: '{0}'")]
    NoParserForExtension(String),

    /// A `$ref` directive is malformed or targets a non-object document
    #[error("invalid reference in {path}: {message}")]
    InvalidReference {
        /// Referencing document
        path: PathBuf,
        /// What is wrong with the reference
        message: String,
    },

    /// `$ref` chain loops back onto a document already being resolved
    #[error("cyclic reference: {}", format_chain(chain))]
    CyclicReference {
        /// Documents in resolution order, ending with the repeated one
        chain: Vec<PathBuf>,
    },

    /// Requested name or reference escapes the store root
    #[error("path escapes store root: {path}")]
    OutsideRoot {
        /// Offending path
        path: PathBuf,
    },

    /// `$ref` chain deeper than the configured limit
    #[error("reference depth limit {limit} exceeded while resolving {path}")]
    ReferenceDepthExceeded {
        /// Document at which the limit was hit
        path: PathBuf,
        /// Configured limit
        limit: usize,
    },
}

impl SpecError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create parse error for path
    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create invalid reference error for path
    pub fn invalid_reference(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if the error means the named document does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Structural or semantic violation in a specification
///
/// Always names the offending unit and field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid specification '{unit}': field '{field}' {message}")]
pub struct ValidationError {
    /// Unit (metadata name) the violation belongs to
    pub unit: String,
    /// Dotted path of the offending field
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationError {
    /// Create validation error
    #[inline]
    pub fn new(
        unit: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            unit: unit.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create error for a required field that is absent
    #[inline]
    pub fn missing(unit: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(unit, field, "is required")
    }
}

/// Result type alias for store operations
pub type SpecResult<T> = Result<T, SpecError>;
