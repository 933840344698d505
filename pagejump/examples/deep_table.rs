//! Walks a 10k-row table the way a paginated UI would.
//!
//! Run with: RUST_LOG=pagejump=debug cargo run -p pagejump --example deep_table

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pagejump::prelude::*;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = MemoryStore::new("mem", "orders").with_documents((1..=10_000).map(|i| {
        let region = ["eu", "us", "apac"][i as usize % 3];
        json!({
            "_id": i,
            "region": region,
            "total": (i * 37) % 1_000,
        })
        .as_object()
        .cloned()
        .unwrap_or_default()
    }));
    let engine = PageJumpEngine::with_config(
        Arc::new(store),
        Arc::new(MemoryCache::new()),
        EngineConfig::from_env(),
    );
    let sort = SortSpec::new().desc("total");

    let first = engine
        .find_page(&PageRequest::new(25).sort(sort.clone()).totals(TotalsMode::Async))
        .await?;
    let token = first
        .totals
        .and_then(|t| t.token)
        .context("async totals always carry a token")?;
    info!(first = %first.items[0]["_id"], %token, "first page");

    let next = engine
        .find_page(
            &PageRequest::new(25)
                .sort(sort.clone())
                .after(first.page_info.end_cursor.context("first page is full")?),
        )
        .await?;
    info!(first = %next.items[0]["_id"], "next page");

    // Each jump resumes from the bookmark the previous one left at its step boundary
    for page in [10, 20, 30, 40, 50, 60] {
        let result = engine
            .find_page(
                &PageRequest::new(25)
                    .sort(sort.clone())
                    .page(page)
                    .with_meta(),
            )
            .await?;
        let meta = result.meta.context("meta was requested")?;
        info!(page, hops = meta.hops, bookmark_hit = meta.bookmark_hit, "jumped");
    }

    match engine
        .find_page(&PageRequest::new(25).sort(sort.clone()).page(400))
        .await
    {
        Err(err @ PagerError::JumpTooFar { .. }) => info!(code = err.code(), "{err}"),
        other => anyhow::bail!("expected a bounded jump failure, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Some(totals) = engine.poll_totals(&token).await {
        info!(total = ?totals.total, pages = ?totals.total_pages, "totals ready");
    }

    let removed = engine.invalidate_bookmarks().await?;
    info!(removed, stats = ?engine.queue_stats(), "done");
    Ok(())
}
