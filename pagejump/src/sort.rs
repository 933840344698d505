//! Sort specifications and the stable-order helpers keyset pagination needs.
//!
//! A [`SortSpec`] is an ordered list of `(field, direction)` pairs. Keyset
//! pagination is only correct under a *total* order, so every request sort
//! passes through [`ensure_stable_sort`], which appends the identifier field
//! as a tiebreaker when the caller did not sort on it.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::filter::{Document, compare_values, lookup};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDir {
    /// Smallest first (`1`).
    Asc,
    /// Largest first (`-1`).
    Desc,
}

impl SortDir {
    /// The opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Mongo-style numeric form: `1` or `-1`.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(v) if v > 0.0 => Some(Self::Asc),
                Some(v) if v < 0.0 => Some(Self::Desc),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => Some(Self::Asc),
                "desc" | "descending" => Some(Self::Desc),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Sort field with direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortField {
    /// Field path.
    pub field: String,
    /// Direction for this key.
    pub dir: SortDir,
}

impl SortField {
    /// Create a new sort field.
    pub fn new(field: impl Into<String>, dir: SortDir) -> Self {
        Self {
            field: field.into(),
            dir,
        }
    }
}

/// Errors from parsing a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SortParseError {
    /// The sort document is not an object.
    #[error("sort specification must be an object of field directions")]
    ExpectedObject,
    /// A direction is not `1`, `-1`, `"asc"` or `"desc"`.
    #[error("invalid sort direction for field '{0}'")]
    InvalidDirection(String),
    /// A field name is empty.
    #[error("sort field name cannot be empty")]
    EmptyField,
}

/// An ordered sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SortSpec {
    fields: Vec<SortField>,
}

impl SortSpec {
    /// Create an empty sort specification.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a key.
    pub fn then(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.fields.push(SortField::new(field, dir));
        self
    }

    /// Append an ascending key.
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDir::Asc)
    }

    /// Append a descending key.
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDir::Desc)
    }

    /// The keys in order.
    #[must_use]
    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `field` is one of the keys.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    /// Parse a Mongo-style sort document such as `{"createdAt": -1, "_id": 1}`.
    ///
    /// Directions may be numbers (sign decides) or `"asc"`/`"desc"`.
    pub fn from_document(value: &Value) -> Result<Self, SortParseError> {
        let obj = value.as_object().ok_or(SortParseError::ExpectedObject)?;
        let mut fields = Vec::with_capacity(obj.len());
        for (field, dir) in obj {
            if field.is_empty() {
                return Err(SortParseError::EmptyField);
            }
            let dir = SortDir::from_value(dir)
                .ok_or_else(|| SortParseError::InvalidDirection(field.clone()))?;
            fields.push(SortField::new(field.clone(), dir));
        }
        Ok(Self { fields })
    }

    /// Render as a Mongo-style sort document.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut doc = Document::new();
        for f in &self.fields {
            doc.insert(f.field.clone(), Value::from(f.dir.as_i64()));
        }
        Value::Object(doc)
    }

    /// Compare two rows under this order.
    pub fn compare_rows(&self, a: &Document, b: &Document) -> Ordering {
        for f in &self.fields {
            let left = lookup(a, &f.field).unwrap_or(&Value::Null);
            let right = lookup(b, &f.field).unwrap_or(&Value::Null);
            let ord = match f.dir {
                SortDir::Asc => compare_values(left, right),
                SortDir::Desc => compare_values(right, left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_document())
    }
}

impl Serialize for SortSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SortSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_document(&value).map_err(serde::de::Error::custom)
    }
}

/// Append `id_field` ascending unless the sort already contains it.
///
/// Existing keys are never removed or reordered.
#[must_use]
pub fn ensure_stable_sort(sort: &SortSpec, id_field: &str) -> SortSpec {
    if sort.contains(id_field) {
        return sort.clone();
    }
    sort.clone().asc(id_field)
}

/// Flip every direction.
///
/// Used to run a "before" fetch as an "after" fetch in reverse order; the
/// rows that come back are in reverse order and it is the caller's job to
/// restore them.
#[must_use]
pub fn reverse_sort(sort: &SortSpec) -> SortSpec {
    SortSpec {
        fields: sort
            .fields
            .iter()
            .map(|f| SortField::new(f.field.clone(), f.dir.reversed()))
            .collect(),
    }
}

/// Project `row` onto the keys of `sort`, in sort-key order.
///
/// Keys missing from the row are recorded as `null`, matching how the
/// store orders missing fields.
#[must_use]
pub fn pick_anchor(row: &Document, sort: &SortSpec) -> Document {
    let mut anchor = Document::new();
    for f in &sort.fields {
        let value = lookup(row, &f.field).cloned().unwrap_or(Value::Null);
        anchor.insert(f.field.clone(), value);
    }
    anchor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ensure_stable_sort_appends_id() {
        let sort = SortSpec::new().desc("createdAt");
        let stable = ensure_stable_sort(&sort, "_id");
        assert_eq!(stable, SortSpec::new().desc("createdAt").asc("_id"));
    }

    #[test]
    fn test_ensure_stable_sort_keeps_existing_id_position() {
        let sort = SortSpec::new().desc("_id").asc("name");
        assert_eq!(ensure_stable_sort(&sort, "_id"), sort);
    }

    #[test]
    fn test_ensure_stable_sort_on_empty() {
        assert_eq!(
            ensure_stable_sort(&SortSpec::new(), "_id"),
            SortSpec::new().asc("_id")
        );
    }

    #[test]
    fn test_reverse_sort_flips_every_key() {
        let sort = SortSpec::new().desc("score").asc("_id");
        assert_eq!(reverse_sort(&sort), SortSpec::new().asc("score").desc("_id"));
        assert_eq!(reverse_sort(&reverse_sort(&sort)), sort);
    }

    #[test]
    fn test_pick_anchor_follows_sort_order() {
        let row = json!({"_id": 7, "name": "b", "score": 3, "extra": true});
        let row = row.as_object().unwrap();
        let sort = SortSpec::new().desc("score").asc("name").asc("_id");
        let anchor = pick_anchor(row, &sort);
        let keys: Vec<&str> = anchor.keys().map(String::as_str).collect();
        assert_eq!(keys, ["score", "name", "_id"]);
        assert_eq!(Value::Object(anchor), json!({"score": 3, "name": "b", "_id": 7}));
    }

    #[test]
    fn test_pick_anchor_missing_field_is_null() {
        let row = json!({"_id": 1});
        let anchor = pick_anchor(row.as_object().unwrap(), &SortSpec::new().asc("name"));
        assert_eq!(anchor.get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_from_document_and_back() {
        let doc = json!({"createdAt": -1, "_id": 1});
        let sort = SortSpec::from_document(&doc).unwrap();
        assert_eq!(sort, SortSpec::new().desc("createdAt").asc("_id"));
        assert_eq!(sort.to_document(), doc);
    }

    #[test]
    fn test_from_document_accepts_words() {
        let sort = SortSpec::from_document(&json!({"a": "desc", "b": "ASC"})).unwrap();
        assert_eq!(sort, SortSpec::new().desc("a").asc("b"));
    }

    #[test]
    fn test_from_document_rejects_zero_direction() {
        assert_eq!(
            SortSpec::from_document(&json!({"a": 0})),
            Err(SortParseError::InvalidDirection("a".into()))
        );
        assert_eq!(
            SortSpec::from_document(&json!([1])),
            Err(SortParseError::ExpectedObject)
        );
    }

    #[test]
    fn test_compare_rows_mixed_directions() {
        let sort = SortSpec::new().desc("score").asc("_id");
        let a = json!({"score": 5, "_id": 2});
        let b = json!({"score": 5, "_id": 3});
        let c = json!({"score": 1, "_id": 1});
        let (a, b, c) = (
            a.as_object().unwrap(),
            b.as_object().unwrap(),
            c.as_object().unwrap(),
        );
        assert_eq!(sort.compare_rows(a, b), Ordering::Less);
        assert_eq!(sort.compare_rows(a, c), Ordering::Less);
        assert_eq!(sort.compare_rows(c, b), Ordering::Greater);
    }
}
