//! YAML document parser
//!
//! Uses serde_yaml and converts straight into a JSON tree so the rest of the
//! pipeline handles one value type. Anchors and aliases are expanded by
//! serde_yaml during deserialization.

use crate::error::SpecError;
use crate::parsers::DocumentParser;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// YAML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl YamlParser {
    /// Create new YAML parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for YamlParser {
    fn parse(&self, content: &str, path: &Path) -> Result<Value, SpecError> {
        let mut documents = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(content) {
            let value = Value::deserialize(doc)
                .map_err(|e| SpecError::parse_error(path, format!("YAML parse error: {e}")))?;
            if !value.is_null() {
                documents.push(value);
            }
        }

        match documents.len() {
            0 => Err(SpecError::parse_error(path, "empty YAML document")),
            1 => Ok(documents.remove(0)),
            n => Err(SpecError::parse_error(
                path,
                format!("expected a single YAML document, found {n}"),
            )),
        }
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(content: &str) -> Result<Value, SpecError> {
        YamlParser.parse(content, Path::new("input.yaml"))
    }

    #[test]
    fn yaml_parser_valid() {
        let value = parse(
            r"
apiVersion: compose.dev/v1
kind: UnitSpec
metadata:
  name: writer
  tags: [draft]
",
        )
        .unwrap();
        assert_eq!(value["metadata"]["name"], json!("writer"));
        assert_eq!(value["metadata"]["tags"], json!(["draft"]));
    }

    #[test]
    fn yaml_parser_accepts_json() {
        let value = parse(r#"{"kind": "ToolSpec", "n": 3}"#).unwrap();
        assert_eq!(value, json!({"kind": "ToolSpec", "n": 3}));
    }

    #[test]
    fn yaml_parser_expands_aliases() {
        let value = parse(
            r"
shared: &m base-model
body:
  model: *m
",
        )
        .unwrap();
        assert_eq!(value["body"]["model"], json!("base-model"));
    }

    #[test]
    fn yaml_parser_empty() {
        assert!(parse("").is_err());
        assert!(parse("---\n").is_err());
    }

    #[test]
    fn yaml_parser_multi_document_rejected() {
        let err = parse("---\na: 1\n---\nb: 2\n").unwrap_err();
        assert!(err.to_string().contains("single YAML document"));
    }

    #[test]
    fn yaml_parser_syntax_error() {
        let err = parse("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, SpecError::Parse { .. }));
    }
}
