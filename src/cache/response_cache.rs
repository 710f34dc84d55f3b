//! LLM response cache with TTL expiry and LRU eviction.
//!
//! Keys are the exact prompt text. Entries become unreadable `ttl` after
//! insertion. When a new key arrives at capacity, expired entries are purged
//! first and, if none were expired, the least-recently-used entry goes.
//! Every entry shares one TTL, so expiry order is insertion order: an
//! insertion-ordered queue finds the expired entries without a full scan.
//! Entries, recency order and statistics share one mutex; the upstream call
//! in [`ResponseCache::get_or_compute`] runs outside it.

use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use super::stats::{CacheStats, LatencyStats};
use crate::config::CacheConfig;
use crate::error::{GateError, Result};
use crate::utils::clock::{self, millis_between, Clock};

/// A single cached response.
#[derive(Debug, Clone)]
struct CacheEntry {
    response: String,
    inserted_at: Instant,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<String, CacheEntry>,
    /// `(inserted_at, key)` per store, oldest first. Records whose entry was
    /// since overwritten or removed are stale and skipped.
    order: VecDeque<(Instant, String)>,
    stats: LatencyStats,
}

/// Whether `(at, key)` still describes the live entry for `key`.
fn is_current(entries: &LruCache<String, CacheEntry>, at: Instant, key: &str) -> bool {
    entries.peek(key).is_some_and(|e| e.inserted_at == at)
}

/// Outcome of [`ResponseCache::get_or_compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub value: String,
    /// `true` when served from the cache.
    pub cached: bool,
    /// Lookup time on a hit, upstream time on a miss.
    pub elapsed_ms: f64,
}

/// Bounded, time-expiring response cache shared across concurrent requests.
#[derive(Debug)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
    capacity: NonZeroUsize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Default number of entries.
    pub const DEFAULT_CAPACITY: usize = 50;
    /// Default entry lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Create a cache on the system clock. A capacity of 0 is rejected.
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        Self::with_clock(capacity, ttl, None, clock::system())
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::with_clock(
            config.capacity,
            Duration::from_secs(config.ttl_secs),
            config.max_latency_samples,
            clock::system(),
        )
    }

    /// Create a cache reading time from `clock`.
    ///
    /// `max_latency_samples` caps the retained latency sample sequences;
    /// `None` keeps every sample.
    pub fn with_clock(
        capacity: usize,
        ttl: Duration,
        max_latency_samples: Option<usize>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| GateError::Config("cache capacity must be at least 1".into()))?;
        debug!(capacity, ttl_secs = ttl.as_secs_f64(), "Creating response cache");
        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                order: VecDeque::new(),
                stats: LatencyStats::new(max_latency_samples),
            }),
            capacity,
            ttl,
            clock,
        })
    }

    /// Look up a cached response. Returns `None` if absent or expired.
    ///
    /// A hit refreshes the entry's recency. An expired entry is removed.
    /// Plain lookups do not touch the hit/miss counters.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut state = self.lock();
        self.lookup_locked(&mut state, key)
    }

    /// Insert or overwrite `key`, stamping it with the current time.
    pub fn store(&self, key: &str, response: String) {
        let mut state = self.lock();
        self.store_locked(&mut state, key, response);
    }

    /// Remove every entry. Statistics are kept.
    ///
    /// Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let count = state.entries.len();
        state.entries.clear();
        state.order.clear();
        debug!(cleared = count, "Cleared response cache");
        count
    }

    /// Zero the hit/miss counters and drop all latency samples.
    pub fn reset_stats(&self) {
        let mut state = self.lock();
        let window = state.stats.max_samples();
        state.stats = LatencyStats::new(window);
    }

    /// Snapshot of counters, latency aggregates and live size.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let size = self.live_len(&state);
        state.stats.snapshot(size, self.capacity.get())
    }

    /// Retained per-hit latencies in milliseconds, oldest first.
    pub fn hit_latencies(&self) -> Vec<f64> {
        self.lock().stats.hit_samples()
    }

    /// Retained per-miss latencies in milliseconds, oldest first.
    pub fn miss_latencies(&self) -> Vec<f64> {
        self.lock().stats.miss_samples()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let state = self.lock();
        self.live_len(&state)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Serve `key` from the cache, or run `invoke` and cache its result.
    ///
    /// The lock is released while `invoke` runs, so a slow upstream call
    /// never blocks lookups for other keys. Concurrent misses on the same
    /// key each invoke and the last store wins. A failed `invoke` is
    /// returned unchanged and leaves entries and statistics untouched.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        invoke: F,
    ) -> std::result::Result<Lookup, E>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
    {
        let start = self.clock.now();
        {
            let mut state = self.lock();
            if let Some(value) = self.lookup_locked(&mut state, key) {
                let elapsed_ms = millis_between(start, self.clock.now());
                state.stats.record_hit(elapsed_ms);
                debug!(prompt_len = key.len(), elapsed_ms, "Cache hit");
                return Ok(Lookup {
                    value,
                    cached: true,
                    elapsed_ms,
                });
            }
        }

        let miss_start = self.clock.now();
        let value = invoke(key.to_string()).await?;
        let elapsed_ms = millis_between(miss_start, self.clock.now());

        let mut state = self.lock();
        self.store_locked(&mut state, key, value.clone());
        state.stats.record_miss(elapsed_ms);
        debug!(prompt_len = key.len(), elapsed_ms, "Cache miss stored");
        Ok(Lookup {
            value,
            cached: false,
            elapsed_ms,
        })
    }

    // -- private helpers ---------------------------------------------------

    fn lookup_locked(&self, state: &mut CacheState, key: &str) -> Option<String> {
        let now = self.clock.now();
        let expired = !self.is_fresh(state.entries.peek(key)?.inserted_at, now);
        if expired {
            debug!(prompt_len = key.len(), "Cache entry expired, removing");
            state.entries.pop(key);
            return None;
        }
        state.entries.get(key).map(|e| e.response.clone())
    }

    fn store_locked(&self, state: &mut CacheState, key: &str, response: String) {
        let now = self.clock.now();
        if !state.entries.contains(key) && state.entries.len() >= self.capacity.get() {
            let purged = self.evict_expired(state, now);
            if purged == 0 {
                if let Some((evicted, _)) = state.entries.pop_lru() {
                    debug!(prompt_len = evicted.len(), "Evicting LRU cache entry");
                }
            }
        }
        let recorded = is_current(&state.entries, now, key);
        state.entries.put(
            key.to_string(),
            CacheEntry {
                response,
                inserted_at: now,
            },
        );
        if !recorded {
            state.order.push_back((now, key.to_string()));
        }
        if state.order.len() > self.capacity.get().saturating_mul(2) {
            let entries = &state.entries;
            state.order.retain(|(at, k)| is_current(entries, *at, k));
        }
    }

    /// Pop expired entries off the front of the insertion queue.
    fn evict_expired(&self, state: &mut CacheState, now: Instant) -> usize {
        let mut purged = 0;
        while let Some(&(at, _)) = state.order.front() {
            if self.is_fresh(at, now) {
                break;
            }
            if let Some((at, key)) = state.order.pop_front() {
                if is_current(&state.entries, at, &key) {
                    state.entries.pop(key.as_str());
                    purged += 1;
                }
            }
        }
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    fn live_len(&self, state: &CacheState) -> usize {
        let now = self.clock.now();
        let expired = state
            .order
            .iter()
            .take_while(|(at, _)| !self.is_fresh(*at, now))
            .filter(|(at, k)| is_current(&state.entries, *at, k))
            .count();
        state.entries.len().saturating_sub(expired)
    }

    fn is_fresh(&self, inserted_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(inserted_at) < self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::MockClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_cache(capacity: usize, ttl_secs: u64) -> (ResponseCache, MockClock) {
        let clock = MockClock::new();
        let cache = ResponseCache::with_clock(
            capacity,
            Duration::from_secs(ttl_secs),
            None,
            Arc::new(clock.clone()),
        )
        .unwrap();
        (cache, clock)
    }

    async fn ok(value: &str) -> std::result::Result<String, GateError> {
        Ok(value.to_string())
    }

    #[test]
    fn test_cache_hit_miss() {
        let (cache, _clock) = test_cache(5, 300);
        assert!(cache.lookup("prompt").is_none());
        cache.store("prompt", "response".into());
        assert_eq!(cache.lookup("prompt"), Some("response".into()));
    }

    #[test]
    fn test_keys_are_not_normalized() {
        let (cache, _clock) = test_cache(5, 300);
        cache.store("Hello", "A".into());
        assert!(cache.lookup("hello").is_none());
        assert!(cache.lookup("Hello ").is_none());
        assert_eq!(cache.lookup("Hello"), Some("A".into()));
    }

    #[test]
    fn test_cache_ttl_expiry() {
        let (cache, clock) = test_cache(50, 1);
        cache.store("x", "X".into());
        clock.advance(Duration::from_millis(999));
        assert_eq!(cache.lookup("x"), Some("X".into()));
        clock.advance(Duration::from_millis(1));
        assert!(cache.lookup("x").is_none(), "entry at exactly ttl is expired");
        // The stale entry is gone for good.
        assert!(cache.lookup("x").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let (cache, _clock) = test_cache(5, 0);
        cache.store("k", "v".into());
        assert!(cache.lookup("k").is_none());
    }

    #[test]
    fn test_overwrite_resets_insertion_time() {
        let (cache, clock) = test_cache(5, 10);
        cache.store("k", "old".into());
        clock.advance(Duration::from_secs(8));
        cache.store("k", "new".into());
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.lookup("k"), Some("new".into()));
    }

    #[test]
    fn test_cache_lru_eviction() {
        let (cache, _clock) = test_cache(2, 300);
        cache.store("a", "A".into());
        cache.store("b", "B".into());
        cache.store("c", "C".into());
        assert!(cache.lookup("a").is_none(), "a was least recently used");
        assert_eq!(cache.lookup("b"), Some("B".into()));
        assert_eq!(cache.lookup("c"), Some("C".into()));
    }

    #[test]
    fn test_lookup_refreshes_recency() {
        let (cache, _clock) = test_cache(2, 300);
        cache.store("a", "A".into());
        cache.store("b", "B".into());
        assert!(cache.lookup("a").is_some());
        cache.store("c", "C".into());
        assert!(cache.lookup("b").is_none(), "b became least recently used");
        assert!(cache.lookup("a").is_some());
    }

    #[test]
    fn test_expired_entries_evicted_before_lru() {
        let (cache, clock) = test_cache(3, 10);
        cache.store("stale", "S".into());
        clock.advance(Duration::from_secs(6));
        cache.store("old", "O".into());
        cache.store("young", "Y".into());
        // Reading "stale" makes "old" the least recently used entry.
        assert!(cache.lookup("stale").is_some());
        clock.advance(Duration::from_secs(5));
        cache.store("new", "N".into());
        assert!(cache.lookup("stale").is_none());
        assert_eq!(cache.lookup("old"), Some("O".into()));
        assert_eq!(cache.lookup("young"), Some("Y".into()));
        assert_eq!(cache.lookup("new"), Some("N".into()));
    }

    #[test]
    fn test_overwrite_at_capacity_evicts_nothing() {
        let (cache, _clock) = test_cache(2, 300);
        cache.store("a", "A".into());
        cache.store("b", "B".into());
        cache.store("a", "A2".into());
        assert_eq!(cache.lookup("a"), Some("A2".into()));
        assert_eq!(cache.lookup("b"), Some("B".into()));
    }

    #[test]
    fn test_full_cache_purges_only_expired_entries() {
        let (cache, clock) = test_cache(4, 10);
        cache.store("a", "A".into());
        cache.store("b", "B".into());
        clock.advance(Duration::from_secs(6));
        cache.store("c", "C".into());
        cache.store("d", "D".into());
        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.len(), 2);

        cache.store("e", "E".into());
        assert_eq!(cache.lock().entries.len(), 3, "both expired entries purged");
        assert_eq!(cache.lookup("c"), Some("C".into()));
        assert_eq!(cache.lookup("d"), Some("D".into()));
        assert_eq!(cache.lookup("e"), Some("E".into()));

        cache.store("f", "F".into());
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_overwritten_key_outlives_its_first_insertion() {
        let (cache, clock) = test_cache(2, 10);
        cache.store("a", "old".into());
        clock.advance(Duration::from_secs(6));
        cache.store("b", "B".into());
        cache.store("a", "new".into());
        clock.advance(Duration::from_secs(5));

        // The first "a" insertion has expired, the current one has not.
        cache.store("c", "C".into());
        assert_eq!(cache.lookup("a"), Some("new".into()));
        assert!(cache.lookup("b").is_none(), "b was least recently used");
        assert_eq!(cache.lookup("c"), Some("C".into()));
    }

    #[test]
    fn test_repeated_overwrites_keep_insertion_queue_bounded() {
        let (cache, clock) = test_cache(2, 300);
        for i in 0..100 {
            cache.store("k", format!("v{i}"));
            clock.advance(Duration::from_millis(1));
            assert!(cache.lock().order.len() <= 4);
        }
        assert_eq!(cache.lookup("k"), Some("v99".into()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let (cache, _clock) = test_cache(5, 300);
        for i in 0..40 {
            cache.store(&format!("k{i}"), format!("v{i}"));
            assert!(cache.len() <= 5);
        }
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.lookup("k39"), Some("v39".into()));
        assert!(cache.lookup("k34").is_none());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            ResponseCache::new(0, Duration::from_secs(1)),
            Err(GateError::Config(_))
        ));
    }

    #[test]
    fn test_cache_clear_keeps_stats() {
        let (cache, _clock) = test_cache(5, 300);
        tokio_test::block_on(async {
            cache.get_or_compute("k1", |_| ok("r1")).await.unwrap();
            cache.get_or_compute("k1", |_| ok("r1")).await.unwrap();
        });
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
        assert!(cache.lookup("k1").is_none());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_reset_stats() {
        let (cache, _clock) = test_cache(5, 300);
        tokio_test::block_on(async {
            cache.get_or_compute("k", |_| ok("v")).await.unwrap();
        });
        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1, "entries survive a stats reset");
        assert!(cache.miss_latencies().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_compute_miss_then_hit() {
        let (cache, _clock) = test_cache(5, 300);
        let calls = AtomicUsize::new(0);
        let invoke = |prompt: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, GateError>(format!("echo: {prompt}")) }
        };

        let first = cache.get_or_compute("hi", invoke).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.value, "echo: hi");

        let second = cache
            .get_or_compute("hi", |_| async { Ok::<_, GateError>("unused".into()) })
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.value, "echo: hi");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_miss_latency_measures_invocation() {
        let (cache, clock) = test_cache(5, 300);
        let upstream = clock.clone();
        let lookup = cache
            .get_or_compute("slow", |_| async move {
                upstream.advance(Duration::from_millis(1200));
                Ok::<_, GateError>("done".into())
            })
            .await
            .unwrap();
        assert!((lookup.elapsed_ms - 1200.0).abs() < 1e-6);
        assert_eq!(cache.miss_latencies(), vec![lookup.elapsed_ms]);
        assert!((cache.stats().avg_miss_latency_ms - 1200.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_failed_invoke_is_transparent() {
        let (cache, _clock) = test_cache(5, 300);
        let result = cache
            .get_or_compute("boom", |_| async {
                Err::<String, _>(GateError::Provider("upstream down".into()))
            })
            .await;
        match result {
            Err(GateError::Provider(msg)) => assert_eq!(msg, "upstream down"),
            other => panic!("expected provider error, got {other:?}"),
        }
        assert!(cache.lookup("boom").is_none());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
        assert!(cache.miss_latencies().is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_recomputed() {
        let (cache, clock) = test_cache(5, 1);
        cache.get_or_compute("x", |_| ok("first")).await.unwrap();
        clock.advance(Duration::from_millis(1100));
        let again = cache.get_or_compute("x", |_| ok("second")).await.unwrap();
        assert!(!again.cached);
        assert_eq!(again.value, "second");
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_hits_plus_misses_equals_calls() {
        let (cache, _clock) = test_cache(3, 300);
        let prompts = ["a", "b", "a", "c", "d", "a", "b", "b"];
        for p in prompts {
            cache
                .get_or_compute(p, |k| async move { Ok::<_, GateError>(k.to_uppercase()) })
                .await
                .unwrap();
        }
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, prompts.len() as u64);
        let expected = stats.hits as f64 / prompts.len() as f64;
        assert!((stats.hit_rate - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_inflight_miss_does_not_block_other_keys() {
        let (cache, _clock) = test_cache(5, 300);
        let cache = Arc::new(cache);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute("slow", |_| async move {
                        release_rx.await.ok();
                        Ok::<_, GateError>("slow-answer".to_string())
                    })
                    .await
            })
        };

        tokio::task::yield_now().await;
        // Other keys proceed while "slow" is still in flight.
        let fast = cache.get_or_compute("fast", |_| ok("fast-answer")).await.unwrap();
        assert_eq!(fast.value, "fast-answer");
        assert_eq!(cache.lookup("fast"), Some("fast-answer".into()));
        assert!(cache.lookup("slow").is_none());

        release_tx.send(()).unwrap();
        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.value, "slow-answer");
        assert_eq!(cache.lookup("slow"), Some("slow-answer".into()));
    }

    #[tokio::test]
    async fn test_concurrent_identical_misses_both_invoke() {
        let (cache, _clock) = test_cache(5, 300);
        let calls = AtomicUsize::new(0);
        let barrier = tokio::sync::Barrier::new(2);

        let run = |answer: &'static str| {
            let calls = &calls;
            let barrier = &barrier;
            cache.get_or_compute("same", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                // Both callers must be in flight at once to pass the barrier.
                barrier.wait().await;
                Ok::<_, GateError>(answer.to_string())
            })
        };

        let (a, b) = tokio::join!(run("first"), run("second"));
        assert!(!a.unwrap().cached);
        assert!(!b.unwrap().cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().misses, 2);
        assert!(cache.lookup("same").is_some());
    }
}
