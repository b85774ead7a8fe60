//! Factory configuration
//!
//! Loaded from TOML; every section and field is optional.
//!
//! ```toml
//! [store]
//! root = "specs"
//! cache_capacity = 1000
//! max_ref_depth = 16
//!
//! [validator]
//! api_prefixes = ["compose.dev/"]
//!
//! [build]
//! max_depth = 32
//! default_loop_iterations = 10
//!
//! [security]
//! allow_dynamic_classes = false
//! allow_inline_tools = false
//! ```

use crate::error::{BuildError, BuildResult};
use compose_spec::{StoreConfig, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// Default loop iteration bound when a loop declares none
pub const DEFAULT_LOOP_ITERATIONS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default maximum unit tree depth
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Build limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum nesting depth of a unit tree
    pub max_depth: usize,
    /// Loop bound used when a loop declares none
    pub default_loop_iterations: NonZeroU32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_loop_iterations: DEFAULT_LOOP_ITERATIONS,
        }
    }
}

/// Opt-in switches for specification-supplied behavior
///
/// Both default to off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Accept `implementation.class_definition` in custom units
    pub allow_dynamic_classes: bool,
    /// Accept inline tool declarations
    pub allow_inline_tools: bool,
}

/// Composition factory configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Spec store settings
    pub store: StoreConfig,
    /// Validator settings
    pub validator: ValidatorConfig,
    /// Build limits
    pub build: BuildConfig,
    /// Security switches
    pub security: SecurityConfig,
}

impl FactoryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> BuildResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content).map_err(|e| match e {
            BuildError::Config(msg) => BuildError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> BuildResult<Self> {
        toml::from_str(content).map_err(|e| BuildError::Config(e.to_string()))
    }

    /// With store root
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store.root = root.into();
        self
    }

    /// With maximum build depth
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.build.max_depth = depth;
        self
    }

    /// With default loop bound
    #[inline]
    #[must_use]
    pub fn with_default_loop_iterations(mut self, iterations: NonZeroU32) -> Self {
        self.build.default_loop_iterations = iterations;
        self
    }

    /// With dynamic class definitions enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_dynamic_classes(mut self, allow: bool) -> Self {
        self.security.allow_dynamic_classes = allow;
        self
    }

    /// With inline tool declarations enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_inline_tools(mut self, allow: bool) -> Self {
        self.security.allow_inline_tools = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = FactoryConfig::new();
        assert_eq!(config.build.max_depth, 32);
        assert_eq!(config.build.default_loop_iterations.get(), 10);
        assert!(!config.security.allow_dynamic_classes);
        assert!(!config.security.allow_inline_tools);
        assert_eq!(config.store.max_ref_depth, 16);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FactoryConfig::from_toml(
            r#"
[store]
root = "/srv/specs"

[security]
allow_inline_tools = true
"#,
        )
        .unwrap();

        assert_eq!(config.store.root, PathBuf::from("/srv/specs"));
        assert_eq!(config.store.cache_capacity, 1_000);
        assert!(config.security.allow_inline_tools);
        assert!(!config.security.allow_dynamic_classes);
        assert_eq!(config.build, BuildConfig::default());
    }

    #[test]
    fn zero_loop_default_is_rejected() {
        let err = FactoryConfig::from_toml("[build]\ndefault_loop_iterations = 0\n").unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compose.toml");
        std::fs::write(&path, "[build]\nmax_depth = 4\n").unwrap();

        let config = FactoryConfig::load(&path).unwrap();
        assert_eq!(config.build.max_depth, 4);

        let missing = FactoryConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(missing.to_string().contains("absent.toml"));
    }

    #[test]
    fn builder_methods() {
        let config = FactoryConfig::new()
            .with_root("specs-dev")
            .with_max_depth(8)
            .with_dynamic_classes(true);
        assert_eq!(config.store.root, PathBuf::from("specs-dev"));
        assert_eq!(config.build.max_depth, 8);
        assert!(config.security.allow_dynamic_classes);
    }
}
