use chrono::{DateTime, Utc};
use repcount_core::{CoreError, PostBatch};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Half-open `[since, until)` range of post creation times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| instant >= since)
            && self.until.map_or(true, |until| instant < until)
    }

    pub fn apply(&self, batch: PostBatch) -> PostBatch {
        batch
            .into_posts()
            .into_iter()
            .filter(|post| self.contains(post.created_at))
            .collect::<Vec<_>>()
            .into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identity: String,
    window: Option<TimeWindow>,
}

impl CacheKey {
    /// Screen names are case-insensitive, so `@Foo` and `foo` share an entry.
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.trim().trim_start_matches('@').to_lowercase(),
            window: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }
}

#[derive(Debug)]
struct CacheEntry {
    batch: PostBatch,
    stored_at: Instant,
}

/// Fetch results keyed by identity and time window, each valid for `ttl`.
#[derive(Debug)]
pub struct TimelineCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl TimelineCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &CacheKey) -> Option<PostBatch> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.batch.clone())
    }

    /// Stores `batch` under `key`, narrowed to the key's window.
    pub async fn insert(&self, key: CacheKey, batch: PostBatch) -> PostBatch {
        let batch = match key.window {
            Some(window) => window.apply(batch),
            None => batch,
        };
        self.entries.write().await.insert(
            key,
            CacheEntry {
                batch: batch.clone(),
                stored_at: Instant::now(),
            },
        );
        batch
    }

    /// Returns the cached batch while it is fresh, otherwise runs `fetch`
    /// and stores its result. Failed fetches leave the cache untouched.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<PostBatch, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PostBatch, CoreError>>,
    {
        if let Some(batch) = self.get(key).await {
            debug!("Cache hit for @{} ({} posts)", key.identity, batch.len());
            return Ok(batch);
        }

        debug!("Cache miss for @{}", key.identity);
        let batch = fetch().await?;
        Ok(self.insert(key.clone(), batch).await)
    }

    /// Drops every entry for `identity`, whatever its window.
    pub async fn invalidate(&self, identity: &str) -> usize {
        let identity = CacheKey::new(identity).identity;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key.identity != identity);
        before - entries.len()
    }

    pub async fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use repcount_core::{RawPost, TwitterApiError};
    use serde_json::Map;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, d, 12, 0, 0).unwrap()
    }

    fn batch() -> PostBatch {
        (1..=5)
            .rev()
            .map(|d| RawPost {
                id: d.to_string(),
                created_at: day(d),
                text: format!("{},{},{}", d, d, d),
                entities: Map::new(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_window_bounds() {
        let window = TimeWindow {
            since: Some(day(2)),
            until: Some(day(4)),
        };
        assert!(!window.contains(day(1)));
        assert!(window.contains(day(2)));
        assert!(window.contains(day(3)));
        assert!(!window.contains(day(4)));
        assert!(TimeWindow::default().contains(day(1)));

        assert_eq!(window.apply(batch()).ids(), vec!["3", "2"]);
    }

    #[test]
    fn test_key_normalisation() {
        assert_eq!(CacheKey::new("@BCApushups"), CacheKey::new("bcapushups"));
        assert_ne!(
            CacheKey::new("bcapushups"),
            CacheKey::new("bcapushups").with_window(TimeWindow::default())
        );
    }

    #[tokio::test]
    async fn test_get_or_fetch_hits_cache() {
        let cache = TimelineCache::new(Duration::from_secs(60));
        let key = CacheKey::new("BCApushups");
        let counter = AtomicU32::new(0);
        let fetches = &counter;

        for _ in 0..3 {
            let result = cache
                .get_or_fetch(&key, move || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(batch())
                })
                .await
                .unwrap();
            assert_eq!(result.len(), 5);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = TimelineCache::new(Duration::from_millis(20));
        let key = CacheKey::new("BCApushups");

        cache.insert(key.clone(), batch()).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_windowed_entries_and_invalidation() {
        let cache = TimelineCache::new(Duration::from_secs(60));
        let window = TimeWindow {
            since: Some(day(4)),
            until: None,
        };

        let narrowed = cache
            .insert(CacheKey::new("BCApushups").with_window(window), batch())
            .await;
        assert_eq!(narrowed.ids(), vec!["5", "4"]);
        cache.insert(CacheKey::new("BCApushups"), batch()).await;
        cache.insert(CacheKey::new("someone_else"), batch()).await;

        assert_eq!(cache.invalidate("@bcapushups").await, 2);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = TimelineCache::new(Duration::from_secs(60));
        let key = CacheKey::new("BCApushups");

        let result = cache
            .get_or_fetch(&key, || async {
                Err(CoreError::TwitterApi(TwitterApiError::InvalidCredentials))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }
}
