//! Value-blind cache keys for bookmarks and totals.
//!
//! A query's shape is the sorted list of paths it touches: field names and
//! `$` operators, with `[]` marking array elements. Literal values never
//! appear, so `{"age": {"$gt": 18}}` and `{"age": {"$gt": 65}}` share a
//! shape while `{"age": {"$lt": 18}}` does not.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::filter::Document;
use crate::sort::SortSpec;

/// Length of a totals token in hex characters.
pub const TOKEN_LEN: usize = 24;

/// Every key/operator path in `value`, sorted.
#[must_use]
pub fn shape_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    walk(value, "", &mut paths);
    paths.sort();
    paths
}

fn walk(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(child, &path, out);
                out.push(path);
            }
        }
        Value::Array(items) => {
            let path = format!("{prefix}[]");
            for item in items {
                walk(item, &path, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Hex SHA-256 of the shape of `value`.
#[must_use]
pub fn shape_of(value: &Value) -> String {
    hex_digest(shape_paths(value).join("\n").as_bytes())
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// The dimensions a bookmark or totals key is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDims {
    /// Backing store name.
    pub store: String,
    /// Collection name.
    pub collection: String,
    /// Effective stable sort, literally.
    pub sort: SortSpec,
    /// Page size, literally.
    pub limit: u64,
    /// Shape hash of the filter.
    pub filter_shape: String,
    /// Shape hash of the extra pipeline stages.
    pub pipeline_shape: String,
    /// Caller-supplied discriminator.
    pub scope: Option<String>,
}

impl KeyDims {
    /// Compose dimensions for one query.
    #[must_use]
    pub fn new(
        store: &str,
        collection: &str,
        sort: &SortSpec,
        limit: u64,
        filter: &Document,
        pipeline: &[Value],
    ) -> Self {
        Self {
            store: store.to_owned(),
            collection: collection.to_owned(),
            sort: sort.clone(),
            limit,
            filter_shape: shape_of(&Value::Object(filter.clone())),
            pipeline_shape: shape_of(&Value::Array(pipeline.to_vec())),
            scope: None,
        }
    }

    /// Builder: mix in a discriminator.
    #[must_use]
    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    fn to_value(&self) -> Value {
        let mut dims = Map::new();
        dims.insert("store".into(), Value::from(self.store.as_str()));
        dims.insert("collection".into(), Value::from(self.collection.as_str()));
        dims.insert("sort".into(), self.sort.to_document());
        dims.insert("limit".into(), Value::from(self.limit));
        dims.insert("filterShape".into(), Value::from(self.filter_shape.as_str()));
        dims.insert("pipelineShape".into(), Value::from(self.pipeline_shape.as_str()));
        if let Some(scope) = &self.scope {
            dims.insert("scope".into(), Value::from(scope.as_str()));
        }
        Value::Object(dims)
    }

    /// Hex SHA-256 of the serialized dimensions.
    #[must_use]
    pub fn digest(&self) -> String {
        hex_digest(self.to_value().to_string().as_bytes())
    }
}

/// Namespaced key builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    /// Keys under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `{prefix}:bm:{collection}:{digest}:p{page}`
    #[must_use]
    pub fn bookmark_key(&self, dims: &KeyDims, page: u64) -> String {
        format!(
            "{}:bm:{}:{}:p{page}",
            self.prefix,
            dims.collection,
            dims.digest()
        )
    }

    /// Glob over every bookmark of `collection`.
    #[must_use]
    pub fn bookmark_pattern(&self, collection: &str) -> String {
        format!("{}:bm:{collection}:*", self.prefix)
    }

    /// Short opaque token for the totals of `dims` in `mode`.
    #[must_use]
    pub fn totals_token(&self, dims: &KeyDims, mode: &str) -> String {
        let mut digest = hex_digest(format!("{}|{mode}", dims.digest()).as_bytes());
        digest.truncate(TOKEN_LEN);
        digest
    }

    /// `{prefix}:totals:{token}`
    #[must_use]
    pub fn totals_key(&self, token: &str) -> String {
        format!("{}:totals:{token}", self.prefix)
    }

    /// Glob over every totals record.
    #[must_use]
    pub fn totals_pattern(&self) -> String {
        format!("{}:totals:*", self.prefix)
    }
}
