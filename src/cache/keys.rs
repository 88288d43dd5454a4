//! Query normalization and cache key derivation.
//!
//! A query is serialized to its cache key by dropping entries equal to the
//! kind's defaults, encoding the rest as JSON with keys in sorted order, and
//! lower-casing the text. Integral floats render as integers, so `1.0` and
//! `1` share a key.

use serde_json::{Map, Value};

/// Largest integer a double holds exactly (2^53 - 1).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Collection filter options, keyed by option name.
pub type Query = Map<String, Value>;

/// Drop every entry whose value equals the default for its key.
///
/// Keys without a default pass through. Only scalar values are compared;
/// objects and arrays are always kept.
pub fn normalize_query(query: &Query, defaults: &Query) -> Query {
    query
        .iter()
        .filter(|(key, value)| !matches_default(defaults.get(key.as_str()), value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Cache key for `query`; an absent query is treated as empty.
pub fn serialize_query(query: Option<&Query>, defaults: &Query) -> String {
    let normalized = query
        .map(|query| normalize_query(query, defaults))
        .unwrap_or_default();
    canonical(&Value::Object(normalized))
        .to_string()
        .to_lowercase()
}

fn matches_default(default: Option<&Value>, value: &Value) -> bool {
    match (default, value) {
        (Some(Value::Number(default)), Value::Number(value)) => {
            default == value || default.as_f64() == value.as_f64()
        }
        (Some(Value::String(default)), Value::String(value)) => default == value,
        (Some(Value::Bool(default)), Value::Bool(value)) => default == value,
        (Some(Value::Null), Value::Null) => true,
        _ => false,
    }
}

/// Rebuild objects with their keys inserted in sorted order, at every depth.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Number(number) if number.is_f64() => number
            .as_f64()
            .filter(|float| float.fract() == 0.0 && float.abs() <= MAX_EXACT_INTEGER)
            .map_or_else(|| value.clone(), |float| Value::from(float as i64)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn query(value: Value) -> Query {
        match value {
            Value::Object(map) => map,
            _ => panic!("test query must be an object"),
        }
    }

    fn defaults() -> Query {
        query(json!({
            "number": 10,
            "offset": 0,
            "order": "ASC",
            "fields": "all_with_meta",
            "meta_query": {"key": "events_enddate", "compare": "<="},
        }))
    }

    #[test]
    fn normalize_drops_default_values() {
        let normalized = normalize_query(
            &query(json!({"number": 10, "offset": 20, "order": "ASC", "paged": 2})),
            &defaults(),
        );
        assert_eq!(normalized, query(json!({"offset": 20, "paged": 2})));
    }

    #[test]
    fn normalize_treats_integer_and_float_as_equal() {
        let normalized = normalize_query(&query(json!({"number": 10.0})), &defaults());
        assert!(normalized.is_empty());
    }

    #[test]
    fn normalize_keeps_nested_values() {
        let nested = json!({"key": "events_enddate", "compare": "<="});
        let normalized = normalize_query(&query(json!({"meta_query": nested})), &defaults());
        assert_eq!(normalized.get("meta_query"), Some(&nested));
    }

    #[test]
    fn serialize_matches_plain_json_for_simple_query() {
        let key = serialize_query(Some(&query(json!({"paged": 1}))), &defaults());
        assert_eq!(key, r#"{"paged":1}"#);
    }

    #[test]
    fn serialize_absent_query_is_empty_object() {
        assert_eq!(serialize_query(None, &defaults()), "{}");
        assert_eq!(serialize_query(Some(&Query::new()), &defaults()), "{}");
    }

    #[test]
    fn serialize_lowercases_the_whole_key() {
        let key = serialize_query(Some(&query(json!({"Search": "Hello World"}))), &defaults());
        assert_eq!(key, r#"{"search":"hello world"}"#);
    }

    #[test]
    fn equivalent_queries_share_a_key() {
        let left = query(json!({"paged": 2, "number": 10}));
        let right = query(json!({"offset": 0, "paged": 2}));
        assert_eq!(
            serialize_query(Some(&left), &defaults()),
            serialize_query(Some(&right), &defaults())
        );
    }

    #[test]
    fn key_order_does_not_change_the_key() {
        let mut forward = Query::new();
        forward.insert("paged".into(), json!(1));
        forward.insert("categories".into(), json!({"b": 2, "a": 1}));

        let mut reverse = Query::new();
        reverse.insert("categories".into(), json!({"a": 1, "b": 2}));
        reverse.insert("paged".into(), json!(1));

        let key = serialize_query(Some(&forward), &defaults());
        assert_eq!(key, serialize_query(Some(&reverse), &defaults()));
        assert_eq!(key, r#"{"categories":{"a":1,"b":2},"paged":1}"#);
    }

    #[test]
    fn distinct_queries_get_distinct_keys() {
        let first = serialize_query(Some(&query(json!({"paged": 1}))), &defaults());
        let second = serialize_query(Some(&query(json!({"paged": 2}))), &defaults());
        assert_ne!(first, second);
    }

    #[test]
    fn integral_floats_share_the_integer_key() {
        let float = serialize_query(Some(&query(json!({"paged": 1.0}))), &defaults());
        let int = serialize_query(Some(&query(json!({"paged": 1}))), &defaults());
        assert_eq!(float, int);
        assert_eq!(float, r#"{"paged":1}"#);

        let nested = serialize_query(Some(&query(json!({"include": [2.0, 3]}))), &defaults());
        assert_eq!(nested, r#"{"include":[2,3]}"#);
    }

    #[test]
    fn fractional_floats_keep_their_value() {
        let key = serialize_query(Some(&query(json!({"ratio": 1.5}))), &defaults());
        assert_eq!(key, r#"{"ratio":1.5}"#);
    }
}
