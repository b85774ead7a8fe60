//! Instruction template rendering
//!
//! Placeholders are `${name}` (dotted paths allowed, `${user.name}`) or
//! `$name`. A placeholder with no binding renders as `[name]` and logs a
//! warning; it never fails the render.

use crate::error::{BuildError, BuildResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("placeholder pattern is valid")
});

/// Variable names referenced by `template`, in order of appearance
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
        .collect()
}

/// Look up a possibly dotted variable name
#[must_use]
pub fn lookup<'a>(variables: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let mut segments = name.split('.');
    let mut current = variables.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render `template` for `unit` against `variables`
///
/// Fails only when the template itself is empty.
pub fn render(unit: &str, template: &str, variables: &Map<String, Value>) -> BuildResult<String> {
    if template.trim().is_empty() {
        return Err(BuildError::specification(unit, "instruction template is empty"));
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        match lookup(variables, name) {
            Some(Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => {
                tracing::warn!(unit, variable = name, "template variable not bound, using placeholder");
                format!("[{name}]")
            }
        }
    });

    Ok(rendered.into_owned())
}

/// Names referenced by `template` that `variables` does not bind
#[must_use]
pub fn missing_variables<'t>(template: &'t str, variables: &Map<String, Value>) -> Vec<&'t str> {
    placeholders(template)
        .into_iter()
        .filter(|name| lookup(variables, name).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn both_placeholder_forms() {
        let v = vars(json!({"topic": "ownership", "level": 3}));
        let out = render("u", "Explain ${topic} at level $level.", &v).unwrap();
        assert_eq!(out, "Explain ownership at level 3.");
    }

    #[test]
    fn dotted_paths() {
        let v = vars(json!({"user": {"name": "Ada"}, "items": ["x", "y"]}));
        assert_eq!(render("u", "Hi ${user.name}, ${items.1}", &v).unwrap(), "Hi Ada, y");
    }

    #[test]
    fn missing_variables_become_placeholders() {
        let out = render("u", "Write about ${topic} for $audience", &Map::new()).unwrap();
        assert_eq!(out, "Write about [topic] for [audience]");
        assert_eq!(
            missing_variables("Write about ${topic} for $audience", &Map::new()),
            vec!["topic", "audience"]
        );
    }

    #[test]
    fn empty_template_fails() {
        let err = render("writer", "   ", &Map::new()).unwrap_err();
        assert!(matches!(err, BuildError::Specification { ref unit, .. } if unit == "writer"));
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let text = "Costs $5 and {braces} stay";
        assert_eq!(render("u", text, &Map::new()).unwrap(), text);
    }

    #[test]
    fn placeholder_order() {
        assert_eq!(placeholders("$a ${b.c} $a"), vec!["a", "b.c", "a"]);
    }
}
