//! Tag-invalidated read cache.
//!
//! Results of read operations are stored as serialized snapshots keyed by
//! operation name and arguments. Each entry carries a time-to-live and one
//! or more tags; invalidating a tag drops every entry that carries it,
//! whatever its key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::errors::AppError;

/// Tag carried by every cached question read.
pub const QUESTIONS_TAG: &str = "questions";
/// Tag carried by cached question searches.
pub const SEARCH_TAG: &str = "search";

/// Name, tags and time-to-live applied to one kind of cached read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub name: &'static str,
    pub tags: &'static [&'static str],
    pub ttl: Duration,
}

impl CachePolicy {
    /// All questions of one topic.
    pub fn question_list(ttl: Duration) -> Self {
        Self {
            name: "questions",
            tags: &[QUESTIONS_TAG],
            ttl,
        }
    }

    /// Filtered and ranked questions of one topic.
    pub fn question_search(ttl: Duration) -> Self {
        Self {
            name: "question-search",
            tags: &[QUESTIONS_TAG, SEARCH_TAG],
            ttl,
        }
    }
}

/// Operation name plus serialized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: String,
    pub args: String,
}

impl CacheKey {
    pub fn new(operation: &str, parts: &[&str]) -> Self {
        Self {
            operation: operation.to_string(),
            args: serde_json::to_string(parts).unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    snapshot: Arc<str>,
    written_at: Instant,
    ttl: Duration,
    tags: Vec<String>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.written_at) > self.ttl
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Process-wide read cache shared by all request handlers.
#[derive(Debug, Default)]
pub struct ReadCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Bumped on every invalidation. A load that started under an older
    /// generation must not store its result.
    generation: AtomicU64,
}

impl ReadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored snapshot for `key` if it has not expired.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<str>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.snapshot.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    /// Store a snapshot under the policy's tags and time-to-live.
    pub async fn set(&self, key: CacheKey, snapshot: impl Into<Arc<str>>, policy: &CachePolicy) {
        let mut entries = self.entries.write().await;
        entries.insert(key, Self::entry(snapshot.into(), policy));
    }

    /// Drop every entry carrying `tag`. Returns how many were dropped.
    pub async fn invalidate(&self, tag: &str) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.has_tag(tag));
        let dropped = before - entries.len();

        tracing::debug!(tag, dropped, "Cache tag invalidated");
        dropped
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Return the cached result for `key_parts` under `policy`, or run `load`
    /// and cache what it returns. Errors are passed through and never cached.
    pub async fn cached<T, F, Fut>(
        &self,
        policy: &CachePolicy,
        key_parts: &[&str],
        load: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let key = CacheKey::new(policy.name, key_parts);

        if let Some(snapshot) = self.get(&key).await {
            match serde_json::from_str(&snapshot) {
                Ok(value) => {
                    tracing::debug!(operation = policy.name, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(operation = policy.name, "Discarding unreadable cache entry: {}", e)
                }
            }
        }

        tracing::debug!(operation = policy.name, "Cache miss");
        let generation = self.generation.load(Ordering::SeqCst);
        let value = load().await?;

        let snapshot = serde_json::to_string(&value)
            .map_err(|e| AppError::Internal(format!("Failed to snapshot cached value: {}", e)))?;

        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            entries.insert(key, Self::entry(snapshot.into(), policy));
        } else {
            tracing::debug!(operation = policy.name, "Invalidated during load, not caching");
        }

        Ok(value)
    }

    fn entry(snapshot: Arc<str>, policy: &CachePolicy) -> CacheEntry {
        CacheEntry {
            snapshot,
            written_at: Instant::now(),
            ttl: policy.ttl,
            tags: policy.tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn list_policy() -> CachePolicy {
        CachePolicy::question_list(Duration::from_secs(3600))
    }

    fn search_policy() -> CachePolicy {
        CachePolicy::question_search(Duration::from_secs(300))
    }

    async fn load_counted(
        cache: &ReadCache,
        policy: &CachePolicy,
        parts: &[&str],
        calls: &AtomicU32,
    ) -> Vec<String> {
        cache
            .cached(policy, parts, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![format!("load {}", n)])
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = ReadCache::new();
        let calls = AtomicU32::new(0);

        let first = load_counted(&cache, &list_policy(), &["t1"], &calls).await;
        tokio::time::advance(Duration::from_secs(3599)).await;
        let second = load_counted(&cache, &list_policy(), &["t1"], &calls).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let key = CacheKey::new("questions", &["t1"]);
        let a = cache.get(&key).await.unwrap();
        let b = cache.get(&key).await.unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_ttl() {
        let cache = ReadCache::new();
        let calls = AtomicU32::new(0);

        load_counted(&cache, &search_policy(), &["t1", "heap"], &calls).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        let reloaded = load_counted(&cache, &search_policy(), &["t1", "heap"], &calls).await;

        assert_eq!(reloaded, vec!["load 1".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_arguments_are_distinct_entries() {
        let cache = ReadCache::new();
        let calls = AtomicU32::new(0);

        load_counted(&cache, &list_policy(), &["t1"], &calls).await;
        load_counted(&cache, &list_policy(), &["t2"], &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_questions_tag_clears_both_policies() {
        let cache = ReadCache::new();
        let calls = AtomicU32::new(0);

        load_counted(&cache, &list_policy(), &["t1"], &calls).await;
        load_counted(&cache, &search_policy(), &["t1", "", "all", "50"], &calls).await;

        assert_eq!(cache.invalidate(QUESTIONS_TAG).await, 2);
        assert!(cache.is_empty().await);

        load_counted(&cache, &list_policy(), &["t1"], &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_tag_keeps_list_entries() {
        let cache = ReadCache::new();
        let calls = AtomicU32::new(0);

        load_counted(&cache, &list_policy(), &["t1"], &calls).await;
        load_counted(&cache, &search_policy(), &["t1", "q"], &calls).await;

        assert_eq!(cache.invalidate(SEARCH_TAG).await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ReadCache::new();

        let result: Result<Vec<String>, AppError> = cache
            .cached(&list_policy(), &["missing"], || async {
                Err(AppError::topic_not_found())
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_racing_invalidation_is_not_stored() {
        let cache = ReadCache::new();
        let shared = &cache;

        let value: Vec<String> = cache
            .cached(&list_policy(), &["t1"], move || async move {
                // A write lands while the read is in flight.
                shared.invalidate(QUESTIONS_TAG).await;
                Ok(vec!["stale".to_string()])
            })
            .await
            .unwrap();

        assert_eq!(value, vec!["stale".to_string()]);
        assert!(cache.is_empty().await);
    }
}
