//! Engine configuration.
//!
//! Every default can be overridden from the environment:
//!
//! | Variable                        | Default    | Description                         |
//! |---------------------------------|------------|-------------------------------------|
//! | `PAGEJUMP_ID_FIELD`             | `_id`      | Tiebreaker field for stable sorts   |
//! | `PAGEJUMP_MAX_LIMIT`            | 500        | Largest accepted page size          |
//! | `PAGEJUMP_KEY_PREFIX`           | `pagejump` | Namespace for cache keys            |
//! | `PAGEJUMP_BOOKMARK_TTL_MS`      | 600000     | Bookmark lifetime                   |
//! | `PAGEJUMP_QUERY_MAX_TIME_MS`    | unset      | Deadline passed with window queries |
//! | `PAGEJUMP_JUMP_STEP`            | 10         | Pages between bookmarks             |
//! | `PAGEJUMP_JUMP_MAX_HOPS`        | 20         | Sequential fetches allowed per call |
//! | `PAGEJUMP_OFFSET_JUMP_ENABLE`   | false      | Allow skip-based jumps              |
//! | `PAGEJUMP_OFFSET_JUMP_MAX_SKIP` | 50000      | Largest skip for offset jumps       |
//! | `PAGEJUMP_TOTALS_TTL_MS`        | 600000     | Totals record lifetime              |
//! | `PAGEJUMP_TOTALS_COALESCE_MS`   | 5000       | Inflight count reuse window         |
//! | `PAGEJUMP_TOTALS_MAX_TIME_MS`   | unset      | Deadline passed with counts         |
//! | `PAGEJUMP_QUEUE_CONCURRENCY`    | 4..=16     | Concurrent counts                   |
//! | `PAGEJUMP_QUEUE_MAX_SIZE`       | 10000      | Waiting counts                      |
//! | `PAGEJUMP_QUEUE_TIMEOUT_MS`     | 60000      | Count wait and run timeout          |
//!
//! Values that fail to parse, and zero where zero is meaningless, fall back
//! to the default.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::QueueConfig;
use crate::validate::DEFAULT_MAX_LIMIT;

/// Default cache key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "pagejump";

/// Default tiebreaker field.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Default bookmark and totals lifetime (10 minutes).
pub const DEFAULT_TTL_MS: u64 = 10 * 60 * 1000;

/// Bookmark-hop bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    /// A bookmark is written every `step` pages.
    pub step: u64,
    /// Sequential page fetches allowed in one call.
    pub max_hops: u64,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            step: 10,
            max_hops: 20,
        }
    }
}

/// Skip-based page jumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetJumpConfig {
    /// Whether shallow jumps may use skip instead of hopping.
    pub enable: bool,
    /// Largest `(page - 1) * limit` served by skip.
    pub max_skip: u64,
}

impl Default for OffsetJumpConfig {
    fn default() -> Self {
        Self {
            enable: false,
            max_skip: 50_000,
        }
    }
}

/// Totals caching and coalescing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalsConfig {
    /// Lifetime of cached totals records.
    pub ttl_ms: u64,
    /// Window during which a running count is reused.
    pub coalesce_window_ms: u64,
    /// Deadline passed to the store with each count.
    pub max_time_ms: Option<u64>,
}

impl Default for TotalsConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            coalesce_window_ms: 5_000,
            max_time_ms: None,
        }
    }
}

/// Everything a [`PageJumpEngine`](crate::PageJumpEngine) needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unique field appended to every sort.
    pub id_field: String,
    /// Largest accepted `limit`.
    pub max_limit: i64,
    /// Namespace prefix for bookmark and totals keys.
    pub key_prefix: String,
    /// Bookmark lifetime.
    pub bookmark_ttl_ms: u64,
    /// Deadline passed to the store with each window query.
    pub query_max_time_ms: Option<u64>,
    /// Bookmark-hop bounds.
    pub jump: JumpConfig,
    /// Skip-based jumps.
    pub offset_jump: OffsetJumpConfig,
    /// Totals behaviour.
    pub totals: TotalsConfig,
    /// Count queue limits.
    pub queue: QueueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_owned(),
            max_limit: DEFAULT_MAX_LIMIT,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            bookmark_ttl_ms: DEFAULT_TTL_MS,
            query_max_time_ms: None,
            jump: JumpConfig::default(),
            offset_jump: OffsetJumpConfig::default(),
            totals: TotalsConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `PAGEJUMP_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let env = Env(&lookup);

        if let Some(field) = env.string("PAGEJUMP_ID_FIELD") {
            config.id_field = field;
        }
        if let Some(prefix) = env.string("PAGEJUMP_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        env.positive("PAGEJUMP_MAX_LIMIT", &mut config.max_limit);
        env.positive("PAGEJUMP_BOOKMARK_TTL_MS", &mut config.bookmark_ttl_ms);
        if let Some(ms) = env.parse::<u64>("PAGEJUMP_QUERY_MAX_TIME_MS") {
            config.query_max_time_ms = Some(ms);
        }

        env.positive("PAGEJUMP_JUMP_STEP", &mut config.jump.step);
        env.positive("PAGEJUMP_JUMP_MAX_HOPS", &mut config.jump.max_hops);

        if let Some(enable) = env.parse::<bool>("PAGEJUMP_OFFSET_JUMP_ENABLE") {
            config.offset_jump.enable = enable;
        }
        if let Some(max_skip) = env.parse::<u64>("PAGEJUMP_OFFSET_JUMP_MAX_SKIP") {
            config.offset_jump.max_skip = max_skip;
        }

        env.positive("PAGEJUMP_TOTALS_TTL_MS", &mut config.totals.ttl_ms);
        if let Some(ms) = env.parse::<u64>("PAGEJUMP_TOTALS_COALESCE_MS") {
            config.totals.coalesce_window_ms = ms;
        }
        if let Some(ms) = env.parse::<u64>("PAGEJUMP_TOTALS_MAX_TIME_MS") {
            config.totals.max_time_ms = Some(ms);
        }

        env.positive("PAGEJUMP_QUEUE_CONCURRENCY", &mut config.queue.concurrency);
        env.positive("PAGEJUMP_QUEUE_MAX_SIZE", &mut config.queue.max_queue_size);
        env.positive("PAGEJUMP_QUEUE_TIMEOUT_MS", &mut config.queue.timeout_ms);

        config
    }

    /// Bookmark lifetime as a [`Duration`].
    #[must_use]
    pub const fn bookmark_ttl(&self) -> Duration {
        Duration::from_millis(self.bookmark_ttl_ms)
    }

    /// Window query deadline, if configured.
    #[must_use]
    pub fn query_max_time(&self) -> Option<Duration> {
        self.query_max_time_ms.map(Duration::from_millis)
    }
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.string(name)?.parse().ok()
    }

    fn positive<T: FromStr + PartialOrd + Default>(&self, name: &str, slot: &mut T) {
        if let Some(value) = self.parse::<T>(name).filter(|v| *v > T::default()) {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.id_field, "_id");
        assert_eq!(config.max_limit, 500);
        assert_eq!(config.jump, JumpConfig { step: 10, max_hops: 20 });
        assert!(!config.offset_jump.enable);
        assert_eq!(config.offset_jump.max_skip, 50_000);
        assert_eq!(config.totals.coalesce_window_ms, 5_000);
        assert_eq!(config.bookmark_ttl(), Duration::from_secs(600));
        assert_eq!(config.query_max_time(), None);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PAGEJUMP_MAX_LIMIT", "100"),
            ("PAGEJUMP_KEY_PREFIX", "tenant-a"),
            ("PAGEJUMP_JUMP_STEP", "5"),
            ("PAGEJUMP_OFFSET_JUMP_ENABLE", "true"),
            ("PAGEJUMP_QUEUE_CONCURRENCY", "2"),
            ("PAGEJUMP_TOTALS_MAX_TIME_MS", "1500"),
        ]));
        assert_eq!(config.max_limit, 100);
        assert_eq!(config.key_prefix, "tenant-a");
        assert_eq!(config.jump.step, 5);
        assert_eq!(config.jump.max_hops, 20);
        assert!(config.offset_jump.enable);
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.totals.max_time_ms, Some(1500));
    }

    #[test]
    fn test_from_lookup_ignores_bad_values() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PAGEJUMP_MAX_LIMIT", "lots"),
            ("PAGEJUMP_JUMP_STEP", "0"),
            ("PAGEJUMP_JUMP_MAX_HOPS", "-4"),
            ("PAGEJUMP_KEY_PREFIX", "   "),
        ]));
        assert_eq!(config, EngineConfig {
            queue: config.queue.clone(),
            ..EngineConfig::default()
        });
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"jump": {"step": 3}, "offset_jump": {"enable": true}}"#)
                .unwrap();
        assert_eq!(config.jump.step, 3);
        assert_eq!(config.jump.max_hops, 20);
        assert!(config.offset_jump.enable);
        assert_eq!(config.max_limit, 500);
    }
}
