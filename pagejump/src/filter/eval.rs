//! In-process evaluation of filter expressions against documents.

use std::cmp::Ordering;

use serde_json::Value;

use super::types::{Document, Filter, FilterExpr, LogicalOp, Operator};
use super::value::{compare_values, lookup, values_equal};

impl FilterExpr {
    /// Whether `doc` satisfies this expression.
    ///
    /// Missing fields compare as `null`. Equality against an array field
    /// also matches when any element is equal, as in Mongo.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Simple(filter) => filter.matches(doc),
            Self::Compound(compound) => match compound.op {
                LogicalOp::And => compound.filters.iter().all(|f| f.matches(doc)),
                LogicalOp::Or => compound.filters.iter().any(|f| f.matches(doc)),
                LogicalOp::Nor | LogicalOp::Not => {
                    !compound.filters.iter().any(|f| f.matches(doc))
                },
            },
        }
    }
}

impl Filter {
    /// Whether `doc` satisfies this single-field condition.
    pub fn matches(&self, doc: &Document) -> bool {
        let found = lookup(doc, &self.field);
        let actual = found.unwrap_or(&Value::Null);

        match self.op {
            Operator::Eq => eq_or_contains(actual, &self.value),
            Operator::Ne => !eq_or_contains(actual, &self.value),
            Operator::Gt => compare_values(actual, &self.value) == Ordering::Greater,
            Operator::Gte => compare_values(actual, &self.value) != Ordering::Less,
            Operator::Lt => compare_values(actual, &self.value) == Ordering::Less,
            Operator::Lte => compare_values(actual, &self.value) != Ordering::Greater,
            Operator::In => self
                .value
                .as_array()
                .is_some_and(|set| set.iter().any(|v| eq_or_contains(actual, v))),
            Operator::NotIn => !self
                .value
                .as_array()
                .is_some_and(|set| set.iter().any(|v| eq_or_contains(actual, v))),
            Operator::Exists => found.is_some() == self.value.as_bool().unwrap_or(true),
        }
    }
}

fn eq_or_contains(actual: &Value, expected: &Value) -> bool {
    if values_equal(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn check(filter: Value, row: Value) -> bool {
        FilterExpr::from_document(&filter)
            .unwrap()
            .is_none_or(|f| f.matches(&doc(row)))
    }

    #[test]
    fn test_comparisons() {
        assert!(check(json!({"age": {"$gt": 18}}), json!({"age": 20})));
        assert!(!check(json!({"age": {"$gt": 18}}), json!({"age": 18})));
        assert!(check(json!({"age": {"$gte": 18}}), json!({"age": 18})));
        assert!(check(json!({"age": {"$lt": 18}}), json!({"age": 3})));
        assert!(check(json!({"age": {"$lte": 18}}), json!({"age": 18})));
        assert!(check(json!({"age": {"$ne": 18}}), json!({"age": 19})));
    }

    #[test]
    fn test_missing_field_is_null() {
        assert!(check(json!({"email": null}), json!({"name": "a"})));
        assert!(!check(json!({"email": {"$exists": true}}), json!({"name": "a"})));
        assert!(check(json!({"email": {"$exists": false}}), json!({"name": "a"})));
    }

    #[test]
    fn test_set_membership() {
        assert!(check(json!({"s": {"$in": ["a", "b"]}}), json!({"s": "b"})));
        assert!(!check(json!({"s": {"$nin": ["a", "b"]}}), json!({"s": "b"})));
    }

    #[test]
    fn test_array_field_contains() {
        assert!(check(json!({"tags": "red"}), json!({"tags": ["blue", "red"]})));
        assert!(!check(json!({"tags": "green"}), json!({"tags": ["blue", "red"]})));
    }

    #[test]
    fn test_logical_operators() {
        let row = json!({"a": 1, "b": 2});
        assert!(check(json!({"$or": [{"a": 5}, {"b": 2}]}), row.clone()));
        assert!(!check(json!({"$and": [{"a": 1}, {"b": 3}]}), row.clone()));
        assert!(check(json!({"$nor": [{"a": 5}]}), row.clone()));
        assert!(!check(json!({"$not": {"a": 1}}), row.clone()));
        assert!(check(json!({}), row));
    }

    #[test]
    fn test_nested_path() {
        assert!(check(
            json!({"profile.age": {"$gte": 21}}),
            json!({"profile": {"age": 30}})
        ));
    }
}
