//! Runtime parsing of Mongo-style filter documents.
//!
//! # Supported Syntax
//!
//! | Syntax | Example |
//! |--------|---------|
//! | Implicit `$eq` | `{"name": "Alice"}` |
//! | Explicit operator | `{"age": {"$gte": 18}}` |
//! | Several operators on one field | `{"age": {"$gte": 18, "$lt": 65}}` |
//! | Multiple fields | `{"a": 1, "b": 2}` (implicit AND) |
//! | `$and` / `$or` / `$nor` | `{"$or": [{...}, {...}]}` |
//! | `$not` | `{"$not": {...}}` |
//! | `$in` / `$nin` | `{"status": {"$in": ["a", "b"]}}` |
//! | `$exists` | `{"email": {"$exists": true}}` |
//!
//! An empty document is the match-all filter and parses to `None`.

use super::types::{CompoundFilter, Document, Filter, FilterExpr, Operator};
use serde_json::Value;
use thiserror::Error;

/// Error type for filter document parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Unknown operator (e.g., `$foo`).
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    /// Expected an object but got something else.
    #[error("expected a filter object")]
    ExpectedObject,
    /// Expected an array but got something else.
    #[error("expected an array of filter objects")]
    ExpectedArray,
    /// Field name is empty.
    #[error("field name cannot be empty")]
    EmptyFieldName,
    /// An operator object mixes `$`-prefixed and plain keys.
    #[error("operator object for field '{0}' mixes operators and plain keys")]
    MixedOperatorObject(String),
    /// Invalid operator value type.
    #[error("operator '{op}' expects {expected}")]
    InvalidOperatorValue {
        /// The operator that had the wrong value type.
        op: String,
        /// Description of what was expected.
        expected: &'static str,
    },
}

impl Operator {
    /// Parse from Mongo-style operator string (e.g., "$eq", "$gte").
    ///
    /// Accepts both with and without the `$` prefix.
    ///
    /// ```
    /// use pagejump::Operator;
    ///
    /// assert_eq!(Operator::from_mongo("$eq"), Some(Operator::Eq));
    /// assert_eq!(Operator::from_mongo("gte"), Some(Operator::Gte));
    /// assert_eq!(Operator::from_mongo("$unknown"), None);
    /// ```
    #[must_use]
    pub fn from_mongo(s: &str) -> Option<Self> {
        let s = s.strip_prefix('$').unwrap_or(s);

        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "nin" => Some(Self::NotIn),
            "exists" => Some(Self::Exists),
            _ => None,
        }
    }
}

impl FilterExpr {
    /// Parse a Mongo-style filter document.
    ///
    /// Returns `Ok(None)` for the empty (match-all) document.
    ///
    /// ```
    /// use pagejump::FilterExpr;
    /// use serde_json::json;
    ///
    /// let filter = FilterExpr::from_document(&json!({"name": "Alice", "age": {"$gte": 18}}))
    ///     .unwrap()
    ///     .unwrap();
    /// assert!(matches!(filter, FilterExpr::Compound(_)));
    /// ```
    pub fn from_document(json: &Value) -> Result<Option<Self>, ParseError> {
        let obj = match json {
            Value::Object(o) => o,
            _ => return Err(ParseError::ExpectedObject),
        };
        parse_object(obj)
    }
}

fn parse_object(obj: &Document) -> Result<Option<FilterExpr>, ParseError> {
    let mut filters = Vec::new();

    for (key, value) in obj {
        if key.is_empty() {
            return Err(ParseError::EmptyFieldName);
        }

        if key.starts_with('$') {
            match key.as_str() {
                "$and" => filters.push(FilterExpr::Compound(CompoundFilter::and(
                    parse_filter_array(value)?,
                ))),
                "$or" => filters.push(FilterExpr::Compound(CompoundFilter::or(
                    parse_filter_array(value)?,
                ))),
                "$nor" => filters.push(FilterExpr::Compound(CompoundFilter::nor(
                    parse_filter_array(value)?,
                ))),
                "$not" => {
                    if let Some(inner) = FilterExpr::from_document(value)? {
                        filters.push(FilterExpr::Compound(CompoundFilter::not(inner)));
                    }
                },
                _ => return Err(ParseError::UnknownOperator(key.clone())),
            }
        } else {
            filters.extend(parse_field_filter(key, value)?);
        }
    }

    // Combine multiple filters with implicit AND
    Ok(match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(FilterExpr::Compound(CompoundFilter::and(filters))),
    })
}

/// Parse an array of filter expressions (for $and/$or/$nor).
fn parse_filter_array(json: &Value) -> Result<Vec<FilterExpr>, ParseError> {
    let arr = match json {
        Value::Array(a) => a,
        _ => return Err(ParseError::ExpectedArray),
    };

    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        if let Some(expr) = FilterExpr::from_document(item)? {
            out.push(expr);
        }
    }
    Ok(out)
}

/// Parse a field filter: `{"$op": value, ...}` or just `value` (implicit $eq).
fn parse_field_filter(field: &str, value: &Value) -> Result<Vec<FilterExpr>, ParseError> {
    if let Value::Object(obj) = value {
        let operator_keys = obj.keys().filter(|k| k.starts_with('$')).count();
        if operator_keys > 0 {
            if operator_keys != obj.len() {
                return Err(ParseError::MixedOperatorObject(field.to_string()));
            }
            return obj
                .iter()
                .map(|(op_key, op_value)| {
                    let op = Operator::from_mongo(op_key)
                        .ok_or_else(|| ParseError::UnknownOperator(op_key.clone()))?;
                    check_operator_value(op, op_value)?;
                    Ok(FilterExpr::Simple(Filter::new(field, op, op_value.clone())))
                })
                .collect();
        }
        // Embedded document equality
    }

    Ok(vec![FilterExpr::Simple(Filter::new(
        field,
        Operator::Eq,
        value.clone(),
    ))])
}

/// Validate the operand shape for an operator.
fn check_operator_value(op: Operator, value: &Value) -> Result<(), ParseError> {
    match op {
        Operator::In | Operator::NotIn if !value.is_array() => {
            Err(ParseError::InvalidOperatorValue {
                op: op.as_mongo().to_string(),
                expected: "an array",
            })
        },
        Operator::Exists if !value.is_boolean() => Err(ParseError::InvalidOperatorValue {
            op: op.as_mongo().to_string(),
            expected: "a boolean",
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::LogicalOp;
    use serde_json::json;

    fn parse(value: &Value) -> FilterExpr {
        FilterExpr::from_document(value).unwrap().unwrap()
    }

    // =========================================================================
    // Operator::from_mongo tests
    // =========================================================================

    #[test]
    fn test_operator_from_mongo_with_prefix() {
        assert_eq!(Operator::from_mongo("$eq"), Some(Operator::Eq));
        assert_eq!(Operator::from_mongo("$ne"), Some(Operator::Ne));
        assert_eq!(Operator::from_mongo("$gt"), Some(Operator::Gt));
        assert_eq!(Operator::from_mongo("$gte"), Some(Operator::Gte));
        assert_eq!(Operator::from_mongo("$lt"), Some(Operator::Lt));
        assert_eq!(Operator::from_mongo("$lte"), Some(Operator::Lte));
        assert_eq!(Operator::from_mongo("$in"), Some(Operator::In));
        assert_eq!(Operator::from_mongo("$nin"), Some(Operator::NotIn));
        assert_eq!(Operator::from_mongo("$exists"), Some(Operator::Exists));
    }

    #[test]
    fn test_operator_round_trips_through_mongo_name() {
        for op in [
            Operator::Eq,
            Operator::Ne,
            Operator::Gt,
            Operator::Gte,
            Operator::Lt,
            Operator::Lte,
            Operator::In,
            Operator::NotIn,
            Operator::Exists,
        ] {
            assert_eq!(Operator::from_mongo(op.as_mongo()), Some(op));
        }
    }

    #[test]
    fn test_operator_from_mongo_unknown() {
        assert_eq!(Operator::from_mongo("$unknown"), None);
        assert_eq!(Operator::from_mongo("$regex"), None);
    }

    // =========================================================================
    // FilterExpr::from_document tests
    // =========================================================================

    #[test]
    fn test_empty_document_is_match_all() {
        assert_eq!(FilterExpr::from_document(&json!({})).unwrap(), None);
    }

    #[test]
    fn test_simple_equality() {
        let filter = parse(&json!({"name": "Alice"}));
        assert!(matches!(
            filter,
            FilterExpr::Simple(Filter { ref field, op: Operator::Eq, ref value })
                if field == "name" && value == &json!("Alice")
        ));
    }

    #[test]
    fn test_explicit_operator() {
        let filter = parse(&json!({"age": {"$gte": 18}}));
        assert!(matches!(
            filter,
            FilterExpr::Simple(Filter { ref field, op: Operator::Gte, .. }) if field == "age"
        ));
    }

    #[test]
    fn test_several_operators_on_one_field() {
        let filter = parse(&json!({"age": {"$gte": 18, "$lt": 65}}));
        let FilterExpr::Compound(compound) = filter else {
            panic!("expected compound filter");
        };
        assert_eq!(compound.op, LogicalOp::And);
        assert_eq!(compound.filters.len(), 2);
    }

    #[test]
    fn test_embedded_document_equality() {
        let filter = parse(&json!({"meta": {"kind": "a"}}));
        assert!(matches!(
            filter,
            FilterExpr::Simple(Filter { op: Operator::Eq, ref value, .. }) if value.is_object()
        ));
    }

    #[test]
    fn test_explicit_or_and_nor() {
        let filter = parse(&json!({"$or": [{"status": "active"}, {"status": "pending"}]}));
        assert!(matches!(
            filter,
            FilterExpr::Compound(CompoundFilter { op: LogicalOp::Or, .. })
        ));

        let filter = parse(&json!({"$nor": [{"deleted": true}]}));
        assert!(matches!(
            filter,
            FilterExpr::Compound(CompoundFilter { op: LogicalOp::Nor, .. })
        ));
    }

    #[test]
    fn test_explicit_not() {
        let filter = parse(&json!({"$not": {"deleted": true}}));
        assert!(matches!(
            filter,
            FilterExpr::Compound(CompoundFilter { op: LogicalOp::Not, .. })
        ));
    }

    #[test]
    fn test_rendered_document_parses_back() {
        let original = json!({"$or": [{"a": {"$gt": 1}}, {"a": 1, "b": {"$lt": 2}}]});
        let expr = parse(&original);
        assert_eq!(expr.to_document(), original);
    }

    // =========================================================================
    // Error cases
    // =========================================================================

    #[test]
    fn test_error_not_object() {
        assert_eq!(
            FilterExpr::from_document(&json!([1, 2, 3])),
            Err(ParseError::ExpectedObject)
        );
    }

    #[test]
    fn test_error_unknown_operator() {
        assert!(matches!(
            FilterExpr::from_document(&json!({"field": {"$foo": 1}})),
            Err(ParseError::UnknownOperator(_))
        ));
        assert!(matches!(
            FilterExpr::from_document(&json!({"$where": "1"})),
            Err(ParseError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_error_mixed_operator_object() {
        assert!(matches!(
            FilterExpr::from_document(&json!({"age": {"$gt": 1, "plain": 2}})),
            Err(ParseError::MixedOperatorObject(_))
        ));
    }

    #[test]
    fn test_error_in_not_array() {
        assert!(matches!(
            FilterExpr::from_document(&json!({"status": {"$in": "not-array"}})),
            Err(ParseError::InvalidOperatorValue { .. })
        ));
    }

    #[test]
    fn test_error_or_not_array() {
        assert_eq!(
            FilterExpr::from_document(&json!({"$or": {"a": 1}})),
            Err(ParseError::ExpectedArray)
        );
    }
}
