use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::calendar::ViewerTimezone;

/// Rendered report cache keyed on `"{report}:{project}:{variant}:{tz offset}"`.
/// Stores serialized JSON strings with a short TTL; writes clear it.
/// `generation` moves on every invalidation so a report computed from a
/// read that raced a write is never stored.
pub struct ReportCache {
    inner: Cache<String, String>,
    generation: AtomicU64,
}

impl ReportCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(Duration::from_secs(ttl_secs))
                .max_capacity(256)
                .build(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn cache_key(
        report: &str,
        project: Option<&str>,
        variant: &str,
        tz: ViewerTimezone,
    ) -> String {
        format!(
            "{}:{}:{}:{}",
            report,
            project.unwrap_or("all"),
            variant,
            tz.offset_secs(),
        )
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    /// Capture before reading the database; pass to `insert`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store `value` unless the cache was invalidated since `generation`
    /// was taken. Returns whether the entry was stored.
    pub fn insert(&self, key: String, value: String, generation: u64) -> bool {
        if self.generation() != generation {
            tracing::debug!(key = %key, "report went stale during compute, not caching");
            return false;
        }
        self.inner.insert(key, value);
        true
    }

    /// Drop everything; called after any write to tasks, projects or users.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.invalidate_all();
    }
}
