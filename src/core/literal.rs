//! EN-003: Literal evaluation: empty-context evaluation and string coercion.
//!
//! Expressions are evaluated without variables or functions, so anything
//! that references runtime state (`var.x`, `azurerm_resource_group.rg.id`,
//! `lower(...)`) fails. Coercion to a string is defined for strings, numbers,
//! and booleans only.
//!
//! Numbers are 64-bit: integer literals above `u64::MAX` do not parse, and
//! negated literals below `i64::MIN` are rejected here rather than wrapped.

use hcl::eval::{Context, Evaluate};
use hcl::expr::{Expression, Operation, UnaryOperator};
use indexmap::IndexMap;
use std::fmt;

/// A statically evaluated declaration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    String(String),
    Number(hcl::Number),
    Bool(bool),
    List(Vec<Literal>),
    Map(IndexMap<String, Literal>),
}

/// A literal type without a string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedLiteral(pub &'static str);

impl fmt::Display for UnsupportedLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot coerce a {} literal to a string", self.0)
    }
}

impl std::error::Error for UnsupportedLiteral {}

impl Literal {
    /// Type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Coerce to the string handed to the provisioning tool.
    ///
    /// Structural values and null fail instead of guessing a serialization.
    pub fn to_display_string(&self) -> Result<String, UnsupportedLiteral> {
        match self {
            Self::String(s) => Ok(s.clone()),
            Self::Number(n) => Ok(n.to_string()),
            Self::Bool(b) => Ok(b.to_string()),
            other => Err(UnsupportedLiteral(other.type_name())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<hcl::Value> for Literal {
    fn from(value: hcl::Value) -> Self {
        match value {
            hcl::Value::Null => Self::Null,
            hcl::Value::Bool(b) => Self::Bool(b),
            hcl::Value::Number(n) => Self::Number(n),
            hcl::Value::String(s) => Self::String(s),
            hcl::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            hcl::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Evaluate an expression with an empty context.
/// Returns the evaluator's diagnostic on failure.
pub fn evaluate_literal(expr: &hcl::Expression) -> Result<Literal, String> {
    if let Some(n) = out_of_range_negation(expr) {
        return Err(format!("-{} is outside the 64-bit integer range", n));
    }
    let ctx = Context::new();
    expr.evaluate(&ctx)
        .map(Literal::from)
        .map_err(|e| e.to_string().trim().to_string())
}

/// Magnitude of a negated integer literal that does not fit in `i64`.
fn out_of_range_negation(expr: &Expression) -> Option<u64> {
    match expr {
        Expression::Parenthesis(inner) => out_of_range_negation(inner),
        Expression::Operation(op) => match op.as_ref() {
            Operation::Unary(unary) => {
                if unary.operator == UnaryOperator::Neg {
                    if let Expression::Number(n) = strip_parens(&unary.expr) {
                        if let Some(v) = n.as_u64().filter(|v| *v > i64::MIN.unsigned_abs()) {
                            return Some(v);
                        }
                    }
                }
                out_of_range_negation(&unary.expr)
            }
            Operation::Binary(_) => None,
        },
        _ => None,
    }
}

fn strip_parens(expr: &Expression) -> &Expression {
    match expr {
        Expression::Parenthesis(inner) => strip_parens(inner),
        other => other,
    }
}
