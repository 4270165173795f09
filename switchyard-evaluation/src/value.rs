//! Helpers for working with JSON-like attribute values.
//!
//! Attribute trees, condition trees and variation payloads are all
//! represented as [`serde_json::Value`]. This module centralizes the dynamic
//! behavior the evaluator needs on top of that: dotted-path lookup, type
//! tagging, truthiness, string coercion and loose comparison.

use std::cmp::Ordering;

use serde_json::Value;

static NULL: Value = Value::Null;

/// Resolve a dot-separated path against an attribute tree.
///
/// Each segment descends through an object key or a numeric list index.
/// Any failure to descend (missing key, scalar in the middle of the path,
/// non-numeric index into a list) resolves to JSON null, never an error.
pub fn get_path<'a>(attributes: &'a Value, path: &str) -> &'a Value {
    let mut current = attributes;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v,
                None => return &NULL,
            },
            Value::Array(list) => match segment.parse::<usize>().ok().and_then(|i| list.get(i)) {
                Some(v) => v,
                None => return &NULL,
            },
            _ => return &NULL,
        };
    }
    current
}

/// Type tag used by the `$type` operator.
pub fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truthiness of a feature value, used to derive `on`/`off`.
///
/// Follows loose-typed host semantics: null, false, 0, "", "0" and empty
/// collections are all falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(list) => !list.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Coerce a value to the string form used for hashing and regex matching.
///
/// Null becomes the empty string, so a missing hash attribute reads as
/// "no value" rather than the literal `null`.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose ordering comparison: numeric when both sides read as numbers,
/// lexical over the string coercions otherwise.
pub fn loose_cmp(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b))
        && let Some(ordering) = x.partial_cmp(&y)
    {
        return ordering;
    }
    stringify(a).cmp(&stringify(b))
}

/// Loose equality: numeric when both sides read as numbers, structural for
/// matching container types, string coercion for mismatched scalars.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    match (a, b) {
        (Value::Array(_), _) | (_, Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            a == b
        }
        _ => stringify(a) == stringify(b),
    }
}
