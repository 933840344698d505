//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use pagejump::{Document, EngineConfig, MemoryCache, MemoryStore, PageJumpEngine, QueueConfig};
use serde_json::{Value, json};

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

/// `n` rows with ids `1..=n`, a low-cardinality `score` and a `group`.
pub fn rows(n: i64) -> Vec<Document> {
    (1..=n)
        .map(|i| {
            doc(json!({
                "_id": i,
                "score": i % 7,
                "group": if i % 3 == 0 { "c" } else { "ab" },
                "name": format!("user-{i:04}")
            }))
        })
        .collect()
}

pub fn ids(items: &[Document]) -> Vec<i64> {
    items.iter().map(|r| r["_id"].as_i64().unwrap()).collect()
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub engine: PageJumpEngine,
}

pub fn fixture(n: i64) -> Fixture {
    fixture_with(n, EngineConfig::default())
}

pub fn fixture_with(n: i64, config: EngineConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new("mem", "users").with_documents(rows(n)));
    let cache = Arc::new(MemoryCache::new());
    let engine = PageJumpEngine::with_config(store.clone(), cache.clone(), config);
    Fixture {
        store,
        cache,
        engine,
    }
}

pub fn small_queue() -> EngineConfig {
    EngineConfig {
        queue: QueueConfig {
            concurrency: 2,
            max_queue_size: 16,
            timeout_ms: 60_000,
        },
        ..EngineConfig::default()
    }
}
