//! Value ordering and field-path lookup over JSON documents.
//!
//! The order is total so it can drive both sorting and the comparison
//! operators: `null < numbers < strings < objects < arrays < booleans`.
//! Numbers compare numerically regardless of int/float representation.

use std::cmp::Ordering;

use serde_json::Value;

use super::types::Document;

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Compare two values under the crate-wide total order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x.cmp(&y);
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x.cmp(&y);
            }
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        },
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        },
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Whether two values are equal under [`compare_values`].
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Resolve a dotted field path (`profile.age`) inside a document.
///
/// Returns `None` when any segment is missing or traverses a non-object.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_order() {
        let ordered = [
            json!(null),
            json!(-5),
            json!(2.5),
            json!("a"),
            json!({"a": 1}),
            json!([1]),
            json!(false),
            json!(true),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(
                compare_values(&pair[0], &pair[1]),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_numbers_compare_across_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert_eq!(compare_values(&json!(2), &json!(1.5)), Ordering::Greater);
        assert_eq!(
            compare_values(&json!(u64::MAX), &json!(1)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_arrays_compare_elementwise_then_length() {
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1])), Ordering::Greater);
    }

    #[test]
    fn test_lookup_dotted_path() {
        let doc = json!({"profile": {"age": 30}, "name": "x"});
        let doc = doc.as_object().unwrap();
        assert_eq!(lookup(doc, "profile.age"), Some(&json!(30)));
        assert_eq!(lookup(doc, "name"), Some(&json!("x")));
        assert_eq!(lookup(doc, "name.first"), None);
        assert_eq!(lookup(doc, "missing"), None);
    }
}
