//! Core types for Mongo-style filter expressions.

use serde_json::{Map, Value};

/// A document as stored in, and returned from, the document store.
pub type Document = Map<String, Value>;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal: `$eq`
    Eq,
    /// Not equal: `$ne`
    Ne,
    /// Greater than: `$gt`
    Gt,
    /// Greater than or equal: `$gte`
    Gte,
    /// Less than: `$lt`
    Lt,
    /// Less than or equal: `$lte`
    Lte,
    /// In array: `$in`
    In,
    /// Not in array: `$nin`
    NotIn,
    /// Field presence: `$exists`
    Exists,
}

impl Operator {
    /// The Mongo-style operator name, including the `$` prefix.
    #[must_use]
    pub const fn as_mongo(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::NotIn => "$nin",
            Self::Exists => "$exists",
        }
    }
}

/// Logical operators for compound filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// All conditions must match: `$and`
    And,
    /// At least one condition must match: `$or`
    Or,
    /// No condition may match: `$nor`
    Nor,
    /// Negate the condition: `$not`
    Not,
}

/// A filter expression that can be simple or compound.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// A simple field comparison.
    Simple(Filter),
    /// A compound filter with logical operator.
    Compound(CompoundFilter),
}

/// A compound filter combining multiple expressions with a logical operator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundFilter {
    /// How the child filters combine.
    pub op: LogicalOp,
    /// The child filters.
    pub filters: Vec<FilterExpr>,
}

impl CompoundFilter {
    /// Create an AND compound filter.
    #[must_use]
    pub const fn and(filters: Vec<FilterExpr>) -> Self {
        Self {
            op: LogicalOp::And,
            filters,
        }
    }

    /// Create an OR compound filter.
    #[must_use]
    pub const fn or(filters: Vec<FilterExpr>) -> Self {
        Self {
            op: LogicalOp::Or,
            filters,
        }
    }

    /// Create a NOR compound filter.
    #[must_use]
    pub const fn nor(filters: Vec<FilterExpr>) -> Self {
        Self {
            op: LogicalOp::Nor,
            filters,
        }
    }

    /// Create a NOT compound filter (wraps a single filter).
    #[must_use]
    pub fn not(filter: FilterExpr) -> Self {
        Self {
            op: LogicalOp::Not,
            filters: vec![filter],
        }
    }
}

/// Filter condition on a single (possibly dotted) field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field path, e.g. `status` or `profile.age`.
    pub field: String,
    /// Comparison operator.
    pub op: Operator,
    /// Right-hand operand.
    pub value: Value,
}

impl Filter {
    /// Create a new filter condition.
    pub fn new(field: impl Into<String>, op: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

/// Helper function to create a simple filter expression.
pub fn simple(field: impl Into<String>, op: Operator, value: Value) -> FilterExpr {
    FilterExpr::Simple(Filter::new(field, op, value))
}

/// Helper function to create an AND compound filter.
#[must_use]
pub const fn and(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter::and(filters))
}

/// Helper function to create an OR compound filter.
#[must_use]
pub const fn or(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter::or(filters))
}

/// Helper function to create a NOT filter.
#[must_use]
pub fn not(filter: FilterExpr) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter::not(filter))
}

impl FilterExpr {
    /// Render this expression as a Mongo-style filter document.
    ///
    /// An AND of simple conditions on distinct fields renders as a single
    /// object (`{"a": 1, "b": {"$gt": 2}}`); anything else uses the
    /// explicit `$and` / `$or` / `$nor` array form. `NOT` renders as a
    /// one-element `$nor`, which is valid at the top level of a filter.
    #[must_use]
    pub fn to_document(&self) -> Value {
        match self {
            Self::Simple(filter) => {
                let mut doc = Document::new();
                doc.insert(filter.field.clone(), render_condition(filter));
                Value::Object(doc)
            },
            Self::Compound(compound) => match compound.op {
                LogicalOp::And => render_and(&compound.filters),
                LogicalOp::Or => tagged_array("$or", &compound.filters),
                LogicalOp::Nor | LogicalOp::Not => tagged_array("$nor", &compound.filters),
            },
        }
    }
}

fn render_condition(filter: &Filter) -> Value {
    match (filter.op, &filter.value) {
        // Plain equality on a scalar reads naturally as `{field: value}`;
        // an object operand must stay wrapped or it would parse as operators.
        (Operator::Eq, value) if !value.is_object() => value.clone(),
        (op, value) => {
            let mut cond = Document::new();
            cond.insert(op.as_mongo().to_string(), value.clone());
            Value::Object(cond)
        },
    }
}

fn render_and(filters: &[FilterExpr]) -> Value {
    let mut merged = Document::new();
    for expr in filters {
        match expr {
            FilterExpr::Simple(filter) if !merged.contains_key(&filter.field) => {
                merged.insert(filter.field.clone(), render_condition(filter));
            },
            _ => return tagged_array("$and", filters),
        }
    }
    Value::Object(merged)
}

fn tagged_array(tag: &str, filters: &[FilterExpr]) -> Value {
    let mut doc = Document::new();
    doc.insert(
        tag.to_string(),
        Value::Array(filters.iter().map(FilterExpr::to_document).collect()),
    );
    Value::Object(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_eq_renders_bare_value() {
        let expr = simple("status", Operator::Eq, json!("active"));
        assert_eq!(expr.to_document(), json!({"status": "active"}));
    }

    #[test]
    fn test_eq_on_object_stays_wrapped() {
        let expr = simple("meta", Operator::Eq, json!({"a": 1}));
        assert_eq!(expr.to_document(), json!({"meta": {"$eq": {"a": 1}}}));
    }

    #[test]
    fn test_and_of_distinct_fields_merges() {
        let expr = and(vec![
            simple("a", Operator::Eq, json!(1)),
            simple("b", Operator::Gt, json!(2)),
        ]);
        assert_eq!(expr.to_document(), json!({"a": 1, "b": {"$gt": 2}}));
    }

    #[test]
    fn test_and_with_repeated_field_uses_array_form() {
        let expr = and(vec![
            simple("a", Operator::Gt, json!(1)),
            simple("a", Operator::Lt, json!(9)),
        ]);
        assert_eq!(
            expr.to_document(),
            json!({"$and": [{"a": {"$gt": 1}}, {"a": {"$lt": 9}}]})
        );
    }

    #[test]
    fn test_not_renders_as_nor() {
        let expr = not(simple("deleted", Operator::Eq, json!(true)));
        assert_eq!(expr.to_document(), json!({"$nor": [{"deleted": true}]}));
    }
}
