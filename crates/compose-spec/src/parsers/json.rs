//! JSON document parser

use crate::error::SpecError;
use crate::parsers::DocumentParser;
use serde_json::Value;
use std::path::Path;

/// JSON parser
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl JsonParser {
    /// Create new JSON parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for JsonParser {
    fn parse(&self, content: &str, path: &Path) -> Result<Value, SpecError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| SpecError::parse_error(path, format!("JSON parse error: {e}")))?;
        if value.is_null() {
            return Err(SpecError::parse_error(path, "empty JSON document"));
        }
        Ok(value)
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_parser_valid() {
        let value = JsonParser
            .parse(r#"{"metadata": {"name": "a"}}"#, Path::new("a.json"))
            .unwrap();
        assert_eq!(value, json!({"metadata": {"name": "a"}}));
    }

    #[test]
    fn json_parser_invalid() {
        let err = JsonParser
            .parse("{not json", Path::new("a.json"))
            .unwrap_err();
        assert!(err.to_string().contains("a.json"));
    }

    #[test]
    fn json_parser_null_is_empty() {
        assert!(JsonParser.parse("null", Path::new("a.json")).is_err());
    }

    #[test]
    fn json_parser_extensions() {
        assert_eq!(JsonParser.extensions(), &["json"]);
    }
}
