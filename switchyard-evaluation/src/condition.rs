//! Targeting-condition evaluation.
//!
//! A condition is a JSON object tree in a small MongoDB-style operator
//! language. Keys are either logical combinators (`$or`, `$nor`, `$and`,
//! `$not`) or dot-separated attribute paths whose values are compared by
//! structural equality or, when the comparison value is an operator object
//! (every key `$`-prefixed), by per-operator evaluation.
//!
//! Evaluation never fails: malformed conditions, unknown operators and
//! invalid regexes all evaluate to a non-match.

use regex::Regex;
use serde_json::Value;

use crate::value::{get_path, is_truthy, loose_cmp, loose_eq, stringify, type_tag};
use crate::version::compare_versions;

/// Evaluate a condition tree against an attribute tree.
///
/// All keys of the condition must hold (implicit AND). A non-object
/// condition never matches.
pub fn eval_condition(attributes: &Value, condition: &Value) -> bool {
    let Value::Object(map) = condition else {
        return false;
    };

    for (key, sub) in map {
        let ok = match key.as_str() {
            "$or" => eval_any(attributes, sub),
            "$nor" => !eval_any(attributes, sub),
            "$and" => eval_all(attributes, sub),
            "$not" => !eval_condition(attributes, sub),
            path => eval_condition_value(sub, get_path(attributes, path)),
        };
        if !ok {
            return false;
        }
    }
    true
}

/// `$or`: an empty list matches; otherwise any sub-condition must match.
fn eval_any(attributes: &Value, conditions: &Value) -> bool {
    let Value::Array(list) = conditions else {
        return false;
    };
    if list.is_empty() {
        return true;
    }
    list.iter().any(|c| eval_condition(attributes, c))
}

/// `$and`: every sub-condition must match (vacuously true when empty).
fn eval_all(attributes: &Value, conditions: &Value) -> bool {
    let Value::Array(list) = conditions else {
        return false;
    };
    list.iter().all(|c| eval_condition(attributes, c))
}

/// A map is an operator object only if every key is `$`-prefixed.
fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn eval_condition_value(condition_value: &Value, attribute_value: &Value) -> bool {
    if let Value::Object(map) = condition_value
        && is_operator_object(condition_value)
    {
        return map
            .iter()
            .all(|(op, v)| eval_operator_condition(op, attribute_value, v));
    }
    condition_value == attribute_value
}

fn eval_operator_condition(operator: &str, attribute: &Value, condition: &Value) -> bool {
    match operator {
        "$eq" => loose_eq(attribute, condition),
        "$ne" => !loose_eq(attribute, condition),
        "$lt" => loose_cmp(attribute, condition).is_lt(),
        "$lte" => loose_cmp(attribute, condition).is_le(),
        "$gt" => loose_cmp(attribute, condition).is_gt(),
        "$gte" => loose_cmp(attribute, condition).is_ge(),
        "$veq" => compare_versions(&stringify(attribute), &stringify(condition)).is_eq(),
        "$vne" => compare_versions(&stringify(attribute), &stringify(condition)).is_ne(),
        "$vlt" => compare_versions(&stringify(attribute), &stringify(condition)).is_lt(),
        "$vlte" => compare_versions(&stringify(attribute), &stringify(condition)).is_le(),
        "$vgt" => compare_versions(&stringify(attribute), &stringify(condition)).is_gt(),
        "$vgte" => compare_versions(&stringify(attribute), &stringify(condition)).is_ge(),
        "$regex" => eval_regex(attribute, condition),
        "$in" => eval_in(attribute, condition),
        "$nin" => !eval_in(attribute, condition),
        "$elemMatch" => eval_elem_match(attribute, condition),
        "$size" => eval_size(attribute, condition),
        "$all" => eval_all_elements(attribute, condition),
        "$exists" => {
            if is_truthy(condition) {
                !attribute.is_null()
            } else {
                attribute.is_null()
            }
        }
        "$type" => condition.as_str() == Some(type_tag(attribute)),
        "$not" => !eval_condition_value(condition, attribute),
        _ => false,
    }
}

/// Unanchored match of the attribute's string form; an invalid pattern
/// never matches.
fn eval_regex(attribute: &Value, condition: &Value) -> bool {
    let Some(pattern) = condition.as_str() else {
        return false;
    };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(&stringify(attribute)),
        Err(_) => false,
    }
}

/// `$in`: scalar attributes are promoted to a one-element list, then the
/// intersection with the condition list must be non-empty.
fn eval_in(attribute: &Value, condition: &Value) -> bool {
    let Value::Array(allowed) = condition else {
        return false;
    };
    match attribute {
        Value::Array(values) => values
            .iter()
            .any(|v| allowed.iter().any(|a| loose_eq(v, a))),
        scalar => allowed.iter().any(|a| loose_eq(scalar, a)),
    }
}

/// `$elemMatch`: any list element must satisfy the nested condition, either
/// as an operator object applied to the element or as a full condition with
/// the element as attribute root.
fn eval_elem_match(attribute: &Value, condition: &Value) -> bool {
    let Value::Array(elements) = attribute else {
        return false;
    };
    elements.iter().any(|element| {
        if is_operator_object(condition) {
            eval_condition_value(condition, element)
        } else {
            eval_condition(element, condition)
        }
    })
}

/// `$size`: the list's length is itself evaluated against the nested
/// condition value (a bare number or an operator object).
fn eval_size(attribute: &Value, condition: &Value) -> bool {
    let Value::Array(elements) = attribute else {
        return false;
    };
    eval_condition_value(condition, &Value::from(elements.len()))
}

/// `$all`: every condition element must be satisfied by some list element.
fn eval_all_elements(attribute: &Value, condition: &Value) -> bool {
    let (Value::Array(values), Value::Array(expected)) = (attribute, condition) else {
        return false;
    };
    expected
        .iter()
        .all(|c| values.iter().any(|v| eval_condition_value(c, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_logical_lists() {
        assert!(eval_condition(&json!({}), &json!({"$or": []})));
        assert!(eval_condition(&json!({}), &json!({"$and": []})));
        assert!(!eval_condition(&json!({}), &json!({"$nor": []})));
    }

    #[test]
    fn test_empty_condition_matches() {
        assert!(eval_condition(&json!({"any": 1}), &json!({})));
    }

    #[test]
    fn test_non_object_condition_never_matches() {
        assert!(!eval_condition(&json!({}), &json!("country")));
        assert!(!eval_condition(&json!({}), &json!(null)));
    }

    #[test]
    fn test_direct_equality() {
        let attrs = json!({"country": "US", "tags": ["a", "b"]});
        assert!(eval_condition(&attrs, &json!({"country": "US"})));
        assert!(!eval_condition(&attrs, &json!({"country": "FR"})));
        // Lists compare order-sensitively
        assert!(eval_condition(&attrs, &json!({"tags": ["a", "b"]})));
        assert!(!eval_condition(&attrs, &json!({"tags": ["b", "a"]})));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(eval_condition(&json!({"age": 25}), &json!({"age": {"$gte": 18}})));
        assert!(!eval_condition(&json!({"age": 15}), &json!({"age": {"$gte": 18}})));
        assert!(eval_condition(&json!({"age": "21"}), &json!({"age": {"$gt": 20}})));
        assert!(eval_condition(&json!({"age": 17}), &json!({"age": {"$lt": 18, "$gte": 13}})));
        assert!(eval_condition(&json!({"name": "bob"}), &json!({"name": {"$ne": "alice"}})));
    }

    #[test]
    fn test_nested_path() {
        let attrs = json!({"user": {"address": {"country": "US"}}});
        assert!(eval_condition(
            &attrs,
            &json!({"user.address.country": "US"})
        ));
        assert!(!eval_condition(&attrs, &json!({"user.address.zip": "10001"})));
    }

    #[test]
    fn test_missing_path_is_null() {
        let attrs = json!({"name": "kim"});
        assert!(eval_condition(&attrs, &json!({"age": {"$exists": false}})));
        assert!(!eval_condition(&attrs, &json!({"age": {"$exists": true}})));
        assert!(eval_condition(&attrs, &json!({"name": {"$exists": true}})));
        assert!(eval_condition(&attrs, &json!({"age": null})));
    }

    #[test]
    fn test_logical_combinators() {
        let attrs = json!({"country": "US", "age": 30});
        assert!(eval_condition(
            &attrs,
            &json!({"$or": [{"country": "FR"}, {"age": {"$gte": 21}}]})
        ));
        assert!(!eval_condition(
            &attrs,
            &json!({"$nor": [{"country": "FR"}, {"age": {"$gte": 21}}]})
        ));
        assert!(eval_condition(
            &attrs,
            &json!({"$and": [{"country": "US"}, {"age": {"$gte": 21}}]})
        ));
        assert!(eval_condition(&attrs, &json!({"$not": {"country": "FR"}})));
        assert!(!eval_condition(&attrs, &json!({"$not": {"country": "US"}})));
    }

    #[test]
    fn test_in_and_nin() {
        let attrs = json!({"country": "US", "tags": ["beta", "internal"]});
        assert!(eval_condition(&attrs, &json!({"country": {"$in": ["US", "CA"]}})));
        assert!(!eval_condition(&attrs, &json!({"country": {"$in": ["FR"]}})));
        assert!(eval_condition(&attrs, &json!({"country": {"$nin": ["FR"]}})));
        // List attribute: non-empty intersection
        assert!(eval_condition(&attrs, &json!({"tags": {"$in": ["internal", "x"]}})));
        assert!(!eval_condition(&attrs, &json!({"tags": {"$in": ["x"]}})));
    }

    #[test]
    fn test_regex() {
        let attrs = json!({"email": "dev@example.com"});
        assert!(eval_condition(&attrs, &json!({"email": {"$regex": "@example\\.com$"}})));
        assert!(!eval_condition(&attrs, &json!({"email": {"$regex": "@other\\.com$"}})));
        // Invalid pattern never matches, never panics
        assert!(!eval_condition(&attrs, &json!({"email": {"$regex": "(unclosed"}})));
    }

    #[test]
    fn test_version_operators() {
        let attrs = json!({"version": "1.10.2"});
        assert!(eval_condition(&attrs, &json!({"version": {"$vgt": "1.9.9"}})));
        assert!(eval_condition(&attrs, &json!({"version": {"$vlt": "1.11.0"}})));
        assert!(eval_condition(&attrs, &json!({"version": {"$veq": "v1.10.2"}})));
        assert!(eval_condition(
            &json!({"version": "1.0.0-beta"}),
            &json!({"version": {"$vlt": "1.0.0"}})
        ));
    }

    #[test]
    fn test_elem_match() {
        let attrs = json!({"scores": [3, 8, 12]});
        assert!(eval_condition(&attrs, &json!({"scores": {"$elemMatch": {"$gt": 10}}})));
        assert!(!eval_condition(&attrs, &json!({"scores": {"$elemMatch": {"$gt": 20}}})));

        let attrs = json!({"orders": [{"total": 5}, {"total": 50}]});
        assert!(eval_condition(
            &attrs,
            &json!({"orders": {"$elemMatch": {"total": {"$gte": 50}}}})
        ));
    }

    #[test]
    fn test_size_and_all() {
        let attrs = json!({"tags": ["a", "b", "c"]});
        assert!(eval_condition(&attrs, &json!({"tags": {"$size": 3}})));
        assert!(eval_condition(&attrs, &json!({"tags": {"$size": {"$gt": 2}}})));
        assert!(!eval_condition(&attrs, &json!({"tags": {"$size": 2}})));
        assert!(eval_condition(&attrs, &json!({"tags": {"$all": ["a", "c"]}})));
        assert!(!eval_condition(&attrs, &json!({"tags": {"$all": ["a", "d"]}})));
        // $size and $all require list attributes
        assert!(!eval_condition(&json!({"tags": "abc"}), &json!({"tags": {"$size": 3}})));
        assert!(!eval_condition(&json!({"tags": "abc"}), &json!({"tags": {"$all": ["a"]}})));
    }

    #[test]
    fn test_type_operator() {
        let attrs = json!({"name": "kim", "age": 30, "tags": [], "meta": {}, "gone": null});
        assert!(eval_condition(&attrs, &json!({"name": {"$type": "string"}})));
        assert!(eval_condition(&attrs, &json!({"age": {"$type": "number"}})));
        assert!(eval_condition(&attrs, &json!({"tags": {"$type": "array"}})));
        assert!(eval_condition(&attrs, &json!({"meta": {"$type": "object"}})));
        assert!(eval_condition(&attrs, &json!({"gone": {"$type": "null"}})));
        assert!(eval_condition(&attrs, &json!({"missing": {"$type": "null"}})));
        assert!(!eval_condition(&attrs, &json!({"name": {"$type": "number"}})));
    }

    #[test]
    fn test_value_level_not() {
        let attrs = json!({"browser": "chrome"});
        assert!(eval_condition(&attrs, &json!({"browser": {"$not": {"$eq": "safari"}}})));
        assert!(!eval_condition(&attrs, &json!({"browser": {"$not": {"$eq": "chrome"}}})));
    }

    #[test]
    fn test_unknown_operator_never_matches() {
        assert!(!eval_condition(
            &json!({"x": 1}),
            &json!({"x": {"$frobnicate": 1}})
        ));
    }

    #[test]
    fn test_operator_object_detection() {
        // Mixed keys: treated as a literal object, compared structurally
        let attrs = json!({"config": {"$gt": 1, "name": "a"}});
        assert!(eval_condition(
            &attrs,
            &json!({"config": {"$gt": 1, "name": "a"}})
        ));
        assert!(!eval_condition(&json!({"config": 5}), &json!({"config": {"$gt": 1, "name": "a"}})));
    }
}
