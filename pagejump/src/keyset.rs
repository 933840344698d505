//! Keyset predicate generation.
//!
//! For sort keys `k1..kn` with directions `d1..dn`, "row strictly follows
//! anchor" is:
//!
//! ```text
//!    (k1 > a1)
//! OR (k1 = a1 AND k2 > a2)
//! OR (k1 = a1 AND k2 = a2 AND k3 > a3)
//! ...
//! ```
//!
//! where `>` becomes `<` for every descending key. This is the standard
//! seek-method comparison (see <https://use-the-index-luke.com/no-offset>),
//! written out as disjunctions because document stores have no row-value
//! comparison. "Before" fetches flip every direction with
//! [`reverse_sort`] and reuse the same builder.

use serde_json::Value;

use crate::filter::{CompoundFilter, Document, Filter, FilterExpr, LogicalOp, Operator};
use crate::sort::{SortDir, SortField, SortSpec, reverse_sort};

/// Keyset pagination predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysetPredicate {
    /// The sort fields and their directions.
    pub sort_fields: Vec<SortField>,
    /// The anchor value for each field, in the same order.
    pub anchor_values: Vec<Value>,
}

impl KeysetPredicate {
    /// Rows strictly after `anchor` under `sort`.
    ///
    /// Returns `None` for an empty sort. Anchor keys missing from the
    /// document are treated as `null`.
    #[must_use]
    pub fn after(sort: &SortSpec, anchor: &Document) -> Option<Self> {
        if sort.is_empty() {
            return None;
        }

        let anchor_values = sort
            .fields()
            .iter()
            .map(|f| anchor.get(&f.field).cloned().unwrap_or(Value::Null))
            .collect();

        Some(Self {
            sort_fields: sort.fields().to_vec(),
            anchor_values,
        })
    }

    /// Rows strictly before `anchor` under `sort`.
    ///
    /// Equivalent to [`after`](Self::after) under the reversed sort; the
    /// store must then be queried with the reversed sort too.
    #[must_use]
    pub fn before(sort: &SortSpec, anchor: &Document) -> Option<Self> {
        Self::after(&reverse_sort(sort), anchor)
    }

    /// Convert to a filter expression.
    ///
    /// A single key yields one simple comparison; more keys yield an OR of
    /// ANDs as described in the module docs.
    #[must_use]
    pub fn to_filter_expr(&self) -> FilterExpr {
        let mut or_conditions: Vec<FilterExpr> = Vec::with_capacity(self.sort_fields.len());

        for (i, (sort, value)) in self.sort_fields.iter().zip(&self.anchor_values).enumerate() {
            // Equality on every preceding key, then the strict comparison
            let mut and_conditions: Vec<FilterExpr> = self
                .sort_fields
                .iter()
                .zip(&self.anchor_values)
                .take(i)
                .map(|(prev, prev_value)| {
                    FilterExpr::Simple(Filter::new(
                        prev.field.clone(),
                        Operator::Eq,
                        prev_value.clone(),
                    ))
                })
                .collect();

            and_conditions.push(FilterExpr::Simple(Filter::new(
                sort.field.clone(),
                strict_operator(sort.dir),
                value.clone(),
            )));

            or_conditions.push(collapse(LogicalOp::And, and_conditions));
        }

        collapse(LogicalOp::Or, or_conditions)
    }

    /// Render as a Mongo-style filter document.
    #[must_use]
    pub fn to_document(&self) -> Value {
        self.to_filter_expr().to_document()
    }
}

const fn strict_operator(dir: SortDir) -> Operator {
    match dir {
        SortDir::Asc => Operator::Gt,
        SortDir::Desc => Operator::Lt,
    }
}

fn collapse(op: LogicalOp, mut filters: Vec<FilterExpr>) -> FilterExpr {
    if filters.len() == 1
        && let Some(only) = filters.pop()
    {
        return only;
    }
    FilterExpr::Compound(CompoundFilter { op, filters })
}

/// Build the "strictly after `anchor`" predicate document for `sort`.
#[must_use]
pub fn anchor_predicate(sort: &SortSpec, anchor: &Document) -> Option<Value> {
    KeysetPredicate::after(sort, anchor).map(|p| p.to_document())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_keyset_single_asc() {
        let sort = SortSpec::new().asc("_id");
        let predicate = anchor_predicate(&sort, &doc(json!({"_id": 100}))).unwrap();
        assert_eq!(predicate, json!({"_id": {"$gt": 100}}));
    }

    #[test]
    fn test_keyset_single_desc() {
        let sort = SortSpec::new().desc("createdAt");
        let predicate = anchor_predicate(&sort, &doc(json!({"createdAt": "2024-01-01"}))).unwrap();
        assert_eq!(predicate, json!({"createdAt": {"$lt": "2024-01-01"}}));
    }

    #[test]
    fn test_keyset_before_flips_operator() {
        let sort = SortSpec::new().asc("_id");
        let predicate = KeysetPredicate::before(&sort, &doc(json!({"_id": 100})))
            .unwrap()
            .to_document();
        assert_eq!(predicate, json!({"_id": {"$lt": 100}}));
    }

    #[test]
    fn test_keyset_multi_field_mixed_directions() {
        let sort = SortSpec::new().desc("createdAt").asc("_id");
        let anchor = doc(json!({"createdAt": "2024-01-01", "_id": 100}));
        let predicate = anchor_predicate(&sort, &anchor).unwrap();

        insta::assert_snapshot!(
            predicate.to_string(),
            @r#"{"$or":[{"createdAt":{"$lt":"2024-01-01"}},{"createdAt":"2024-01-01","_id":{"$gt":100}}]}"#
        );
    }

    #[test]
    fn test_keyset_three_fields() {
        let sort = SortSpec::new().asc("a").asc("b").desc("c");
        let anchor = doc(json!({"a": 1, "b": 2, "c": 3}));
        let expr = KeysetPredicate::after(&sort, &anchor).unwrap().to_filter_expr();

        let FilterExpr::Compound(compound) = expr else {
            panic!("expected compound OR");
        };
        assert_eq!(compound.op, LogicalOp::Or);
        assert_eq!(compound.filters.len(), 3);
        assert!(matches!(compound.filters[0], FilterExpr::Simple(_)));
        assert!(matches!(
            &compound.filters[2],
            FilterExpr::Compound(and) if and.op == LogicalOp::And && and.filters.len() == 3
        ));

        insta::assert_snapshot!(
            compound_doc(&sort, &anchor),
            @r#"{"$or":[{"a":{"$gt":1}},{"a":1,"b":{"$gt":2}},{"a":1,"b":2,"c":{"$lt":3}}]}"#
        );
    }

    fn compound_doc(sort: &SortSpec, anchor: &Document) -> String {
        anchor_predicate(sort, anchor).unwrap().to_string()
    }

    #[test]
    fn test_keyset_missing_anchor_field_uses_null() {
        let sort = SortSpec::new().asc("name");
        let predicate = anchor_predicate(&sort, &doc(json!({"_id": 1}))).unwrap();
        assert_eq!(predicate, json!({"name": {"$gt": null}}));
    }

    #[test]
    fn test_keyset_with_empty_sort() {
        assert!(KeysetPredicate::after(&SortSpec::new(), &doc(json!({"_id": 1}))).is_none());
    }

    #[test]
    fn test_predicate_selects_exactly_following_rows() {
        let sort = SortSpec::new().desc("score").asc("_id");
        let rows: Vec<Document> = [
            json!({"_id": 1, "score": 9}),
            json!({"_id": 4, "score": 7}),
            json!({"_id": 2, "score": 7}),
            json!({"_id": 3, "score": 5}),
        ]
        .into_iter()
        .map(doc)
        .collect();

        let anchor = doc(json!({"score": 7, "_id": 2}));
        let expr = KeysetPredicate::after(&sort, &anchor).unwrap().to_filter_expr();
        let ids: Vec<i64> = rows
            .iter()
            .filter(|r| expr.matches(r))
            .map(|r| r["_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [4, 3]);

        let before = KeysetPredicate::before(&sort, &anchor).unwrap().to_filter_expr();
        let ids: Vec<i64> = rows
            .iter()
            .filter(|r| before.matches(r))
            .map(|r| r["_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, [1]);
    }
}
