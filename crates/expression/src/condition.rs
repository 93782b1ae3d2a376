//! Field/operator/value condition evaluation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::resolve_path;

/// A single branching condition evaluated against a JSON record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the record.
    pub field: String,
    pub operator: Operator,
    /// Right-hand side of the comparison (ignored by the unary operators).
    #[serde(default)]
    pub value: Value,
}

/// The closed operator set.
///
/// Operators unknown to this set deserialise to [`Operator::Unknown`], which
/// evaluates to `true`.  That permissive default is a smell inherited from
/// the workflow format — a misspelled operator silently lets everything
/// through instead of failing the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    #[serde(alias = "equals")]
    Eq,
    #[serde(alias = "notEquals")]
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    Regex,
    IsEmpty,
    IsNotEmpty,
    Exists,
    NotExists,
    #[serde(other)]
    Unknown,
}

/// Evaluate `condition` against `record`.
pub fn evaluate_condition(record: &Value, condition: &Condition) -> bool {
    let resolved = resolve_path(record, &condition.field);
    let expected = &condition.value;

    match condition.operator {
        Operator::Eq => resolved == Some(expected),
        Operator::Neq => resolved != Some(expected),
        Operator::Gt => compare(resolved, expected, |o| o == std::cmp::Ordering::Greater),
        Operator::Gte => compare(resolved, expected, |o| o != std::cmp::Ordering::Less),
        Operator::Lt => compare(resolved, expected, |o| o == std::cmp::Ordering::Less),
        Operator::Lte => compare(resolved, expected, |o| o != std::cmp::Ordering::Greater),
        Operator::Contains => as_text(resolved).contains(&as_text(Some(expected))),
        Operator::NotContains => !as_text(resolved).contains(&as_text(Some(expected))),
        Operator::Regex => match Regex::new(&as_text(Some(expected))) {
            Ok(re) => re.is_match(&as_text(resolved)),
            Err(_) => false,
        },
        Operator::IsEmpty => is_empty(resolved),
        Operator::IsNotEmpty => !is_empty(resolved),
        Operator::Exists => resolved.is_some(),
        Operator::NotExists => resolved.is_none(),
        Operator::Unknown => true,
    }
}

/// Ordering is defined number-vs-number and string-vs-string; any other
/// pairing (including a missing field) orders as `false`.
fn compare(
    resolved: Option<&Value>,
    expected: &Value,
    check: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let Some(resolved) = resolved else { return false };

    match (resolved, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).map(&check).unwrap_or(false),
            _ => false,
        },
        (Value::String(a), Value::String(b)) => check(a.as_str().cmp(b.as_str())),
        _ => false,
    }
}

/// A value counts as empty when it is falsy, the empty string, or an empty
/// sequence.  A missing field is empty too.
fn is_empty(resolved: Option<&Value>) -> bool {
    match resolved {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn as_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, operator: Operator, value: Value) -> Condition {
        Condition { field: field.into(), operator, value }
    }

    #[test]
    fn equality_and_inequality() {
        let record = json!({ "v": "a" });
        assert!(evaluate_condition(&record, &cond("v", Operator::Eq, json!("a"))));
        assert!(!evaluate_condition(&record, &cond("v", Operator::Eq, json!("b"))));
        assert!(evaluate_condition(&record, &cond("v", Operator::Neq, json!("b"))));
        // Missing field never equals anything.
        assert!(!evaluate_condition(&record, &cond("missing", Operator::Eq, json!("a"))));
        assert!(evaluate_condition(&record, &cond("missing", Operator::Neq, json!("a"))));
    }

    #[test]
    fn numeric_ordering() {
        let record = json!({ "v": 5 });
        assert!(evaluate_condition(&record, &cond("v", Operator::Gte, json!(5))));
        assert!(evaluate_condition(&record, &cond("v", Operator::Gt, json!(4))));
        assert!(evaluate_condition(&record, &cond("v", Operator::Lte, json!(5))));
        assert!(!evaluate_condition(&record, &cond("v", Operator::Lt, json!(5))));
        // Mixed types do not order.
        assert!(!evaluate_condition(&record, &cond("v", Operator::Gt, json!("4"))));
    }

    #[test]
    fn containment_and_regex() {
        let record = json!({ "msg": "hello world" });
        assert!(evaluate_condition(&record, &cond("msg", Operator::Contains, json!("world"))));
        assert!(evaluate_condition(&record, &cond("msg", Operator::NotContains, json!("mars"))));
        assert!(evaluate_condition(&record, &cond("msg", Operator::Regex, json!("^hel+o"))));
        assert!(!evaluate_condition(&record, &cond("msg", Operator::Regex, json!("("))));
    }

    #[test]
    fn emptiness_checks() {
        let record = json!({ "s": "", "list": [], "full": [1], "zero": 0, "off": false });
        for field in ["s", "list", "zero", "off", "missing"] {
            assert!(
                evaluate_condition(&record, &cond(field, Operator::IsEmpty, Value::Null)),
                "{field} should be empty"
            );
        }
        assert!(evaluate_condition(&record, &cond("full", Operator::IsNotEmpty, Value::Null)));
    }

    #[test]
    fn existence_checks() {
        let record = json!({ "v": null });
        // An explicit null exists; only a missing path does not.
        assert!(evaluate_condition(&record, &cond("v", Operator::Exists, Value::Null)));
        assert!(evaluate_condition(&record, &cond("w", Operator::NotExists, Value::Null)));
    }

    #[test]
    fn unknown_operator_is_permissively_true() {
        let parsed: Condition =
            serde_json::from_value(json!({ "field": "v", "operator": "frobnicate", "value": 1 }))
                .expect("unknown operators still deserialise");
        assert_eq!(parsed.operator, Operator::Unknown);
        assert!(evaluate_condition(&json!({}), &parsed));
    }

    #[test]
    fn operator_aliases_deserialise() {
        let parsed: Condition =
            serde_json::from_value(json!({ "field": "v", "operator": "notEquals", "value": 1 }))
                .expect("alias should parse");
        assert_eq!(parsed.operator, Operator::Neq);
    }
}
