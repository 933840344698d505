//! Benchmarks for the per-call pagination primitives.
//!
//! Run with: cargo bench -p pagejump

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pagejump::{
    CacheKeys, Document, KeyDims, KeysetPredicate, SortSpec, decode_cursor, encode_cursor,
    shape_of,
};
use serde_json::json;
use std::hint::black_box;

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}

fn sorts() -> [(&'static str, SortSpec, Document); 3] {
    [
        (
            "one_key",
            SortSpec::new().asc("_id"),
            doc(json!({"_id": 42})),
        ),
        (
            "two_keys",
            SortSpec::new().desc("createdAt").asc("_id"),
            doc(json!({"createdAt": "2024-06-01T12:00:00Z", "_id": 42})),
        ),
        (
            "four_keys",
            SortSpec::new()
                .asc("tenant")
                .desc("score")
                .asc("profile.name")
                .asc("_id"),
            doc(json!({"tenant": "acme", "score": 9.5, "profile.name": "zoë", "_id": 42})),
        ),
    ]
}

// =============================================================================
// Cursor Benchmarks
// =============================================================================

fn bench_cursor(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor");

    for (name, sort, anchor) in sorts() {
        group.bench_with_input(BenchmarkId::new("encode", name), &(&sort, &anchor), |b, (s, a)| {
            b.iter(|| encode_cursor(black_box(s), black_box(a), None))
        });

        let token = encode_cursor(&sort, &anchor, None).unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("decode", name), token.as_str(), |b, t| {
            b.iter(|| decode_cursor(black_box(t)))
        });
    }

    group.bench_function("decode_garbage", |b| {
        b.iter(|| decode_cursor(black_box("not!a!cursor")))
    });

    group.finish();
}

// =============================================================================
// Keyset Predicate Benchmarks
// =============================================================================

fn bench_predicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyset_predicate");

    for (name, sort, anchor) in sorts() {
        group.bench_with_input(BenchmarkId::new("after", name), &(&sort, &anchor), |b, (s, a)| {
            b.iter(|| KeysetPredicate::after(black_box(s), black_box(a)).map(|p| p.to_document()))
        });
        group.bench_with_input(BenchmarkId::new("before", name), &(&sort, &anchor), |b, (s, a)| {
            b.iter(|| KeysetPredicate::before(black_box(s), black_box(a)).map(|p| p.to_document()))
        });
    }

    group.finish();
}

// =============================================================================
// Cache Key Benchmarks
// =============================================================================

fn bench_cache_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_keys");

    let filter = json!({
        "status": {"$in": ["open", "pending"]},
        "$or": [{"owner": "u1"}, {"team": {"$exists": true}}],
        "tags": ["a", "b"]
    });
    group.bench_function("shape_of", |b| b.iter(|| shape_of(black_box(&filter))));

    let keys = CacheKeys::new("pagejump");
    let sort = SortSpec::new().desc("createdAt").asc("_id");
    let filter = doc(filter);
    let stages = vec![json!({"$match": {"archived": false}})];

    group.bench_function("bookmark_key", |b| {
        b.iter(|| {
            let dims = KeyDims::new("mongo", "orders", &sort, 50, &filter, &stages);
            keys.bookmark_key(black_box(&dims), black_box(120))
        })
    });
    group.bench_function("totals_token", |b| {
        let dims = KeyDims::new("mongo", "orders", &sort, 50, &filter, &stages);
        b.iter(|| keys.totals_token(black_box(&dims), "sync"))
    });

    group.finish();
}

criterion_group!(benches, bench_cursor, bench_predicate, bench_cache_keys);
criterion_main!(benches);
