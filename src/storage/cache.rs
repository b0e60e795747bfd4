//! TTL cache with a last-known-good shadow store.
//!
//! ## Behavior
//!
//! - A payload younger than its TTL is served without fetching.
//! - Otherwise the fetch runs; success replaces both the cache entry and the
//!   shadow entry wholesale.
//! - Failure touches nothing; the shadow payload is served if one exists.
//! - At most one fetch per key is in flight. Concurrent callers for the same
//!   stale key wait for it and adopt its outcome: the refreshed entry on
//!   success, the shadow payload or `Unavailable` on failure.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::storage::{Cached, Clock, SystemClock};

/// Fresh payload for one key.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub payload: Arc<T>,
    pub written_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            written_at: self.written_at,
            ttl: self.ttl,
        }
    }
}

/// Most recent successful payload for one key. Never expires.
#[derive(Debug)]
pub struct ShadowEntry<T> {
    pub payload: Arc<T>,
    pub succeeded_at: DateTime<Utc>,
}

impl<T> Clone for ShadowEntry<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            succeeded_at: self.succeeded_at,
        }
    }
}

/// What [`CacheStore::clear`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Fresh entries only; last-known-good payloads survive
    CacheOnly,
    /// Fresh entries and the shadow store
    All,
}

/// Per-key state for an overview listing.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub key: String,
    /// Last successful refresh
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Whether a request right now would be served from cache
    pub fresh: bool,
    pub has_shadow: bool,
}

/// Refresh coordination for one key while callers are waiting on it.
#[derive(Default)]
struct RefreshSlot {
    /// Completed fetch attempts
    attempts: AtomicU64,
    /// Held for the duration of a fetch; holds the last attempt's error
    last_error: tokio::sync::Mutex<Option<String>>,
}

/// Process-wide keyed store, shared by handle.
pub struct CacheStore<T> {
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    shadow: RwLock<HashMap<String, ShadowEntry<T>>>,
    in_flight: Mutex<HashMap<String, Arc<RefreshSlot>>>,
    ttl_override: RwLock<Option<Duration>>,
}

impl<T> CacheStore<T>
where
    T: Send + Sync + 'static,
{
    /// Create an empty store using wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store with a custom time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
            shadow: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            ttl_override: RwLock::new(None),
        }
    }

    /// Serve `key` from cache if fresh, otherwise fetch it.
    ///
    /// `ttl` is the source's freshness window; an override set through
    /// [`set_ttl_override`](Self::set_ttl_override) takes precedence.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Cached<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ttl = self.ttl_override().unwrap_or(ttl);
        if let Some(hit) = self.fresh(key, ttl) {
            return hit;
        }

        let slot = self.slot(key);
        let outcome = self.refresh(key, ttl, &slot, fetch).await;
        drop(slot);
        self.release(key);
        outcome
    }

    async fn refresh<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        slot: &RefreshSlot,
        fetch: F,
    ) -> Cached<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let seen = slot.attempts.load(Ordering::Acquire);
        let mut last_error = slot.last_error.lock().await;

        // Another caller may have refreshed the key while we waited.
        if let Some(hit) = self.fresh(key, ttl) {
            log::debug!("[{key}] refreshed by a concurrent caller");
            return hit;
        }
        if slot.attempts.load(Ordering::Acquire) != seen {
            if let Some(error) = last_error.as_ref() {
                log::debug!("[{key}] concurrent refresh failed, not retrying");
                return self.fallback(key, error.clone());
            }
        }

        let outcome = match fetch().await {
            Ok(payload) => {
                let payload = Arc::new(payload);
                let now = self.clock.now();
                self.write(key, Arc::clone(&payload), now, ttl);
                log::info!("[{key}] refreshed");
                *last_error = None;
                Cached::Fetched {
                    payload,
                    refreshed_at: now,
                }
            }
            Err(error) => {
                let error = error.to_string();
                *last_error = Some(error.clone());
                self.fallback(key, error)
            }
        };
        slot.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Outcome of a failed refresh: the shadow payload if one exists.
    fn fallback(&self, key: &str, error: String) -> Cached<T> {
        match self.shadow_entry(key) {
            Some(shadow) => {
                log::warn!(
                    "[{key}] refresh failed, serving last known good from {}: {error}",
                    shadow.succeeded_at
                );
                Cached::Stale {
                    payload: shadow.payload,
                    refreshed_at: shadow.succeeded_at,
                    error,
                }
            }
            None => {
                log::warn!("[{key}] refresh failed and no previous result exists: {error}");
                Cached::Unavailable { error }
            }
        }
    }

    /// Fresh entry for `key`, if any.
    fn fresh(&self, key: &str, ttl: Duration) -> Option<Cached<T>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if !self.is_fresh(entry.written_at, ttl) {
            return None;
        }
        Some(Cached::Hit {
            payload: Arc::clone(&entry.payload),
            refreshed_at: entry.written_at,
        })
    }

    fn is_fresh(&self, written_at: DateTime<Utc>, ttl: Duration) -> bool {
        // A clock that moved backwards yields a negative age, which counts as fresh.
        (self.clock.now() - written_at)
            .to_std()
            .map_or(true, |age| age < ttl)
    }

    fn write(&self, key: &str, payload: Arc<T>, now: DateTime<Utc>, ttl: Duration) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                CacheEntry {
                    payload: Arc::clone(&payload),
                    written_at: now,
                    ttl,
                },
            );
        self.shadow
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                ShadowEntry {
                    payload,
                    succeeded_at: now,
                },
            );
    }

    fn slot(&self, key: &str) -> Arc<RefreshSlot> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(key.to_string()).or_default())
    }

    /// Drop the key's slot once no caller holds it.
    fn release(&self, key: &str) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            in_flight.remove(key);
        }
    }

    /// Number of keys with callers currently refreshing or waiting.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Current cache entry for `key`, fresh or not.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Last-known-good entry for `key`.
    pub fn shadow_entry(&self, key: &str) -> Option<ShadowEntry<T>> {
        self.shadow
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Time of the last successful refresh of `key`.
    pub fn last_refreshed(&self, key: &str) -> Option<DateTime<Utc>> {
        self.shadow_entry(key).map(|s| s.succeeded_at)
    }

    /// Replace every source's TTL with `ttl`, or restore per-source TTLs with `None`.
    pub fn set_ttl_override(&self, ttl: Option<Duration>) {
        *self
            .ttl_override
            .write()
            .unwrap_or_else(PoisonError::into_inner) = ttl;
    }

    pub fn ttl_override(&self) -> Option<Duration> {
        *self
            .ttl_override
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop cached state. Administrative; never triggered by reads.
    pub fn clear(&self, scope: ClearScope) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if scope == ClearScope::All {
            self.shadow
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        log::info!("Cache cleared ({scope:?})");
    }

    /// Every known key with its refresh state, sorted by key.
    pub fn overview(&self) -> Vec<CacheStatus> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let shadow = self.shadow.read().unwrap_or_else(PoisonError::into_inner);

        let mut keys: Vec<&String> = entries.keys().chain(shadow.keys()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .map(|key| {
                let entry = entries.get(key);
                let ttl = self.ttl_override().or(entry.map(|e| e.ttl));
                CacheStatus {
                    key: key.clone(),
                    refreshed_at: shadow.get(key).map(|s| s.succeeded_at),
                    fresh: match (entry, ttl) {
                        (Some(e), Some(ttl)) => self.is_fresh(e.written_at, ttl),
                        _ => false,
                    },
                    has_shadow: shadow.contains_key(key),
                }
            })
            .collect()
    }
}

impl<T> Default for CacheStore<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::AppError;
    use crate::storage::ManualClock;

    const TTL: Duration = Duration::from_secs(300);
    const EPSILON: Duration = Duration::from_secs(1);

    fn store() -> (CacheStore<Vec<u32>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (CacheStore::with_clock(clock.clone()), clock)
    }

    async fn ok(value: Vec<u32>) -> Result<Vec<u32>> {
        Ok(value)
    }

    async fn fail() -> Result<Vec<u32>> {
        Err(AppError::fetch("test", "connection refused"))
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let (cache, _) = store();
        let result = cache.get_or_fetch("k", TTL, || ok(vec![1, 2])).await;
        assert!(matches!(result, Cached::Fetched { .. }));
        assert_eq!(result.payload().map(|p| p.as_slice()), Some(&[1, 2][..]));
        assert!(cache.entry("k").is_some());
        assert!(cache.shadow_entry("k").is_some());
    }

    #[tokio::test]
    async fn test_ttl_honored() {
        let (cache, clock) = store();
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            ok(vec![calls.load(Ordering::SeqCst) as u32])
        };

        cache.get_or_fetch("k", TTL, fetch).await;
        clock.advance(TTL - EPSILON);
        let hit = cache.get_or_fetch("k", TTL, fetch).await;
        assert!(matches!(hit, Cached::Hit { .. }));
        assert_eq!(hit.payload().unwrap().as_slice(), &[1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(EPSILON * 2);
        let refetched = cache.get_or_fetch("k", TTL, fetch).await;
        assert!(matches!(refetched, Cached::Fetched { .. }));
        assert_eq!(refetched.payload().unwrap().as_slice(), &[2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_serves_last_known_good() {
        let (cache, clock) = store();
        cache.get_or_fetch("k", TTL, || ok(vec![7; 10])).await;
        let first_success = cache.last_refreshed("k").unwrap();

        clock.advance(TTL * 2);
        let result = cache.get_or_fetch("k", TTL, fail).await;
        match result {
            Cached::Stale {
                payload,
                refreshed_at,
                error,
            } => {
                assert_eq!(payload.len(), 10);
                assert_eq!(refreshed_at, first_success);
                assert!(error.contains("connection refused"));
            }
            other => panic!("expected stale payload, got {other:?}"),
        }
        // The failed attempt left both stores untouched.
        assert_eq!(cache.entry("k").unwrap().written_at, first_success);
        assert_eq!(cache.last_refreshed("k"), Some(first_success));
    }

    #[tokio::test]
    async fn test_failure_without_shadow_is_unavailable() {
        let (cache, _) = store();
        let result = cache.get_or_fetch("k", TTL, fail).await;
        assert!(result.is_unavailable());
        assert!(result.payload().is_none());
        assert!(cache.entry("k").is_none());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (cache, _) = store();
        cache.get_or_fetch("a", TTL, || ok(vec![1])).await;
        let b = cache.get_or_fetch("b", TTL, fail).await;
        assert!(b.is_unavailable());
    }

    #[tokio::test]
    async fn test_one_fetch_in_flight_per_key() {
        let cache = CacheStore::<Vec<u32>>::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, AppError>(vec![1])
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch("k", TTL, fetch),
            cache.get_or_fetch("k", TTL, fetch),
            cache.get_or_fetch("k", TTL, fetch),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(a, Cached::Fetched { .. }));
        assert!(matches!(b, Cached::Hit { .. }));
        assert!(matches!(c, Cached::Hit { .. }));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_shared_by_waiters() {
        let cache = CacheStore::<Vec<u32>>::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<Vec<u32>, _>(AppError::fetch("k", "timed out"))
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch("k", TTL, fetch),
            cache.get_or_fetch("k", TTL, fetch),
            cache.get_or_fetch("k", TTL, fetch),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        for result in [a, b, c] {
            assert!(result.is_unavailable());
            assert!(result.error().unwrap().contains("timed out"));
        }

        // A later request is a new attempt.
        let retry = cache.get_or_fetch("k", TTL, || ok(vec![1])).await;
        assert!(matches!(retry, Cached::Fetched { .. }));
    }

    #[tokio::test]
    async fn test_waiters_on_failed_refresh_get_shadow() {
        let (cache, clock) = store();
        cache.get_or_fetch("k", TTL, || ok(vec![4; 3])).await;
        clock.advance(TTL * 2);

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<Vec<u32>, _>(AppError::fetch("k", "connection refused"))
        };
        let (a, b) = tokio::join!(
            cache.get_or_fetch("k", TTL, fetch),
            cache.get_or_fetch("k", TTL, fetch),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(a, Cached::Stale { .. }));
        assert!(matches!(b, Cached::Stale { .. }));
    }

    #[tokio::test]
    async fn test_refresh_slots_are_released() {
        let (cache, _) = store();
        for key in ["a", "b", "c"] {
            cache.get_or_fetch(key, TTL, || ok(vec![1])).await;
        }
        cache.get_or_fetch("d", TTL, fail).await;
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_ttl_override_takes_precedence() {
        let (cache, clock) = store();
        cache.set_ttl_override(Some(Duration::from_secs(60)));
        cache.get_or_fetch("k", TTL, || ok(vec![1])).await;

        clock.advance(Duration::from_secs(61));
        let result = cache.get_or_fetch("k", TTL, || ok(vec![2])).await;
        assert!(matches!(result, Cached::Fetched { .. }));

        cache.set_ttl_override(None);
        clock.advance(Duration::from_secs(61));
        let result = cache.get_or_fetch("k", TTL, || ok(vec![3])).await;
        assert!(matches!(result, Cached::Hit { .. }));
    }

    #[tokio::test]
    async fn test_clear_scopes() {
        let (cache, _) = store();
        cache.get_or_fetch("k", TTL, || ok(vec![1])).await;

        cache.clear(ClearScope::CacheOnly);
        assert!(cache.entry("k").is_none());
        let result = cache.get_or_fetch("k", TTL, fail).await;
        assert!(matches!(result, Cached::Stale { .. }));

        cache.clear(ClearScope::All);
        let result = cache.get_or_fetch("k", TTL, fail).await;
        assert!(result.is_unavailable());
    }

    #[tokio::test]
    async fn test_overview_lists_keys() {
        let (cache, clock) = store();
        cache.get_or_fetch("b", TTL, || ok(vec![1])).await;
        cache.get_or_fetch("a", TTL, || ok(vec![1])).await;
        clock.advance(TTL + EPSILON);

        let overview = cache.overview();
        let keys: Vec<&str> = overview.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(overview.iter().all(|s| !s.fresh && s.has_shadow));
    }
}
