//! Document parsers for specification files
//!
//! Provides parsing from external file formats into JSON trees:
//! - YAML (`.yaml`, `.yml`, and extension-less files) via serde_yaml
//! - JSON (`.json`) via serde_json

use crate::error::SpecError;
use serde_json::Value;
use std::path::Path;

mod json;
mod yaml;

pub use json::JsonParser;
pub use yaml::YamlParser;

/// Parser trait for converting file content into a document tree
///
/// Implement this trait to add support for new file formats.
pub trait DocumentParser: Send + Sync + 'static {
    /// Parse content read from `path`
    fn parse(&self, content: &str, path: &Path) -> Result<Value, SpecError>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }

    /// Parser priority (higher = tried first when multiple parsers match)
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry of document parsers, selected by file extension
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
    fallback: Box<dyn DocumentParser>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        default_parsers()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parser_count", &self.parsers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create registry with no extension parsers
    ///
    /// Extension-less files still go to `fallback`.
    #[inline]
    #[must_use]
    pub fn new(fallback: impl DocumentParser) -> Self {
        Self {
            parsers: Vec::new(),
            fallback: Box::new(fallback),
        }
    }

    /// Register a parser
    pub fn register<P: DocumentParser>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
        self.parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find parser for path
    ///
    /// Paths without an extension use the fallback parser.
    pub fn find_for_path(&self, path: &Path) -> Result<&dyn DocumentParser, SpecError> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(&*self.fallback);
        };
        self.parsers
            .iter()
            .find(|p| p.can_parse(path))
            .map(|p| &**p)
            .ok_or_else(|| SpecError::NoParserForExtension(ext.to_string()))
    }

    /// Parse `content` with the parser registered for `path`
    pub fn parse(&self, content: &str, path: &Path) -> Result<Value, SpecError> {
        self.find_for_path(path)?.parse(content, path)
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions())
            .copied()
            .collect()
    }
}

/// Create default parser registry with the YAML and JSON parsers
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new(YamlParser);
    registry.register(YamlParser);
    registry.register(JsonParser);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct UpperParser;

    impl DocumentParser for UpperParser {
        fn parse(&self, content: &str, _path: &Path) -> Result<Value, SpecError> {
            Ok(Value::String(content.to_uppercase()))
        }

        fn extensions(&self) -> &[&str] {
            &["up"]
        }

        fn priority(&self) -> i32 {
            10
        }
    }

    #[test]
    fn parser_can_parse_by_extension() {
        assert!(YamlParser.can_parse(Path::new("units/a.yaml")));
        assert!(YamlParser.can_parse(Path::new("units/a.yml")));
        assert!(!YamlParser.can_parse(Path::new("units/a.json")));
        assert!(!YamlParser.can_parse(Path::new("units/a")));
    }

    #[test]
    fn registry_dispatches_on_extension() {
        let registry = default_parsers();
        let value = registry
            .parse(r#"{"a": 1}"#, Path::new("doc.json"))
            .unwrap();
        assert_eq!(value, json!({"a": 1}));

        let value = registry.parse("a: 1\n", Path::new("doc.yml")).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn extensionless_paths_use_fallback() {
        let registry = default_parsers();
        let value = registry.parse("name: x\n", Path::new("units/x")).unwrap();
        assert_eq!(value, json!({"name": "x"}));
    }

    #[test]
    fn unknown_extension_is_error() {
        let registry = default_parsers();
        let err = registry.parse("x", Path::new("doc.toml")).unwrap_err();
        assert!(matches!(err, SpecError::NoParserForExtension(ext) if ext == "toml"));
    }

    #[test]
    fn custom_parser_registration() {
        let mut registry = default_parsers();
        registry.register(UpperParser);
        assert!(registry.all_extensions().contains(&"up"));
        let value = registry.parse("abc", Path::new("x.up")).unwrap();
        assert_eq!(value, json!("ABC"));
    }

    #[test]
    fn registry_debug() {
        let debug_str = format!("{:?}", default_parsers());
        assert!(debug_str.contains("ParserRegistry"));
        assert!(debug_str.contains("json"));
    }
}
