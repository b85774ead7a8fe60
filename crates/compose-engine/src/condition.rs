//! Restricted condition language for optional children
//!
//! Three forms, tried in order:
//! 1. `true` / `false`
//! 2. a bare variable name, true when the bound value is truthy
//! 3. `input.<field>`, looked up inside the `input` variable
//!
//! Anything else is never evaluated: it logs a warning and counts as false.

use crate::body::ConditionExpr;
use crate::context::BuildContext;
use serde_json::{Map, Value};

/// Variable holding the caller's input
pub const INPUT_BINDING: &str = "input";

/// Parsed condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition<'a> {
    /// Literal boolean
    Literal(bool),
    /// Bare variable name
    Variable(&'a str),
    /// `input.<field>`
    InputField(&'a str),
    /// Outside the grammar
    Unsupported(&'a str),
}

impl<'a> Condition<'a> {
    /// Classify an expression
    #[must_use]
    pub fn parse(expr: &'a str) -> Self {
        let expr = expr.trim();
        if expr.eq_ignore_ascii_case("true") {
            return Self::Literal(true);
        }
        if expr.eq_ignore_ascii_case("false") {
            return Self::Literal(false);
        }
        if is_identifier(expr) {
            return Self::Variable(expr);
        }
        match expr.split_once('.') {
            Some((INPUT_BINDING, field)) if is_identifier(field) => Self::InputField(field),
            _ => Self::Unsupported(expr),
        }
    }

    /// Evaluate against a variable set
    #[must_use]
    pub fn evaluate(&self, variables: &Map<String, Value>) -> bool {
        match self {
            Self::Literal(b) => *b,
            Self::Variable(name) => variables.get(*name).is_some_and(is_truthy),
            Self::InputField(field) => variables
                .get(INPUT_BINDING)
                .and_then(|input| input.get(*field))
                .is_some_and(is_truthy),
            Self::Unsupported(expr) => {
                tracing::warn!(condition = *expr, "unsupported condition expression, treating as false");
                false
            }
        }
    }
}

/// Evaluate `expr` against the context's variables
#[must_use]
pub fn evaluate(expr: &str, ctx: &BuildContext) -> bool {
    Condition::parse(expr).evaluate(&ctx.variables)
}

/// Evaluate a declared child condition
#[must_use]
pub fn evaluate_condition(condition: &ConditionExpr, ctx: &BuildContext) -> bool {
    match condition {
        ConditionExpr::Literal(b) => *b,
        ConditionExpr::Expr(expr) => evaluate(expr, ctx),
    }
}

/// Truthiness of a bound value
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
