//! Response cache with in-flight request deduplication.
//!
//! [`ResponseCache`] answers `get_or_compute(fingerprint, compute)` in
//! three steps:
//!
//! 1. A live entry (stored less than `ttl` ago) is returned as is. Expired
//!    entries are dropped at read time.
//! 2. If a computation for the fingerprint is already in flight, the caller
//!    awaits that computation's shared result instead of starting another.
//! 3. Otherwise `compute` is spawned as a detached task and registered as
//!    in flight.
//!
//! # Settlement
//!
//! The spawned task writes successful values into the cache *before* any
//! waiter observes them, so a caller arriving right after settlement hits
//! the cache. Failures are delivered to every waiter and never cached.
//! The task runs to completion even when every caller has stopped
//! awaiting it; there is no cancellation.
//!
//! The in-flight registration outlives settlement by a short grace window
//! (`CacheConfig::in_flight_grace`) so near-simultaneous callers still share
//! the settled outcome, including a failure. Removal is a timer task owned
//! by the cache; [`ResponseCache::shutdown()`] (or dropping the cache)
//! cancels pending timers and clears all registrations.
//!
//! # Eviction
//!
//! Capacity eviction removes the oldest *inserted* entry. Reads do not
//! refresh an entry's position.
//!
//! # Locking
//!
//! Both maps live behind one `std::sync::Mutex`. The lock is never held
//! across an await point and `compute` is never invoked while it is held.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::Fingerprint;
use crate::telemetry;
use crate::{MealgateError, Result};

/// Configuration for the response cache.
///
/// ```rust
/// # use mealgate::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(50)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached entries. 0 disables storage (deduplication
    /// still applies). Default: 100.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 5 minutes.
    pub ttl: Duration,
    /// How long an in-flight registration survives settlement. Default: 100ms.
    pub in_flight_grace: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(300),
            in_flight_grace: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the grace window between settlement and deregistration.
    pub fn in_flight_grace(mut self, grace: Duration) -> Self {
        self.in_flight_grace = grace;
        self
    }
}

type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V>>>;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

enum Lookup<V> {
    Hit(V),
    Pending(SharedOutcome<V>),
}

struct InFlight<V> {
    id: u64,
    pending: SharedOutcome<V>,
}

struct State<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    /// Insertion order of `entries`, oldest first.
    order: VecDeque<Fingerprint>,
    in_flight: HashMap<Fingerprint, InFlight<V>>,
    next_id: u64,
}

impl<V: Clone> State<V> {
    fn live_value(&mut self, fingerprint: &Fingerprint, ttl: Duration) -> Option<V> {
        let stored_at = self.entries.get(fingerprint)?.stored_at;
        if stored_at.elapsed() < ttl {
            return self.entries.get(fingerprint).map(|e| e.value.clone());
        }
        self.remove(fingerprint);
        None
    }

    fn store(&mut self, fingerprint: Fingerprint, value: V, max_entries: usize) {
        if max_entries == 0 {
            return;
        }
        self.remove(&fingerprint);
        while self.entries.len() >= max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(fingerprint = %oldest, "evicted oldest cache entry");
        }
        self.order.push_back(fingerprint.clone());
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    fn remove(&mut self, fingerprint: &Fingerprint) -> bool {
        if self.entries.remove(fingerprint).is_some() {
            self.order.retain(|k| k != fingerprint);
            true
        } else {
            false
        }
    }
}

struct Inner<V> {
    config: CacheConfig,
    state: Mutex<State<V>>,
    shutdown: watch::Sender<bool>,
}

impl<V> Inner<V> {
    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, fingerprint: &Fingerprint, id: u64) {
        let mut state = self.lock();
        if state.in_flight.get(fingerprint).is_some_and(|f| f.id == id) {
            state.in_flight.remove(fingerprint);
        }
    }
}

impl<V: Send + Sync + 'static> Inner<V> {
    /// Deregister `id` after the grace window, or immediately once the
    /// cache is shutting down.
    fn schedule_release(self: &Arc<Self>, fingerprint: Fingerprint, id: u64) {
        let grace = self.config.in_flight_grace;
        let mut shutdown = self.shutdown.subscribe();
        if grace.is_zero() || *shutdown.borrow() {
            self.release(&fingerprint, id);
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {}
                _ = shutdown.changed() => {}
            }
            inner.release(&fingerprint, id);
        });
    }
}

/// In-memory response cache with in-flight deduplication.
///
/// Not `Clone`: the handle owns the lifecycle of its cleanup timers. Share
/// it behind an `Arc`.
pub struct ResponseCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new response cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    order: VecDeque::new(),
                    in_flight: HashMap::new(),
                    next_id: 0,
                }),
                shutdown,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the cached value for `fingerprint`, or compute it once.
    ///
    /// Uses the configured TTL. See module docs for the full lifecycle.
    pub async fn get_or_compute<F, Fut>(&self, fingerprint: &Fingerprint, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.get_or_compute_with(fingerprint, self.inner.config.ttl, compute)
            .await
    }

    /// Like [`get_or_compute()`](Self::get_or_compute) with a per-call TTL.
    ///
    /// The TTL decides whether an existing entry is still live for *this*
    /// caller; entries carry only their storage time.
    pub async fn get_or_compute_with<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        ttl: Duration,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match self.lookup(fingerprint, ttl) {
            Some(Lookup::Hit(value)) => return Ok(value),
            Some(Lookup::Pending(pending)) => return pending.await,
            None => {}
        }

        let computation = compute();

        // Re-check: another caller may have registered while `compute` ran.
        let pending = {
            let mut state = self.inner.lock();
            if let Some(value) = state.live_value(fingerprint, ttl) {
                return Ok(value);
            }
            if let Some(existing) = state.in_flight.get(fingerprint) {
                metrics::counter!(telemetry::INFLIGHT_JOINS_TOTAL).increment(1);
                existing.pending.clone()
            } else {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                let id = state.next_id;
                state.next_id += 1;
                let pending = self.spawn_computation(fingerprint.clone(), id, computation);
                state.in_flight.insert(
                    fingerprint.clone(),
                    InFlight {
                        id,
                        pending: pending.clone(),
                    },
                );
                debug!(%fingerprint, "started computation");
                pending
            }
        };
        pending.await
    }

    /// Resolve a hit or an in-flight join without computing.
    fn lookup(&self, fingerprint: &Fingerprint, ttl: Duration) -> Option<Lookup<V>> {
        let mut state = self.inner.lock();
        if let Some(value) = state.live_value(fingerprint, ttl) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            debug!(%fingerprint, "cache hit");
            return Some(Lookup::Hit(value));
        }
        let existing = state.in_flight.get(fingerprint)?;
        metrics::counter!(telemetry::INFLIGHT_JOINS_TOTAL).increment(1);
        debug!(%fingerprint, "joined in-flight computation");
        Some(Lookup::Pending(existing.pending.clone()))
    }

    /// Spawn `computation` detached; cache on success, then deregister.
    fn spawn_computation<Fut>(&self, fingerprint: Fingerprint, id: u64, computation: Fut) -> SharedOutcome<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(computation)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(MealgateError::Unknown("computation panicked".into())));
            if let Ok(value) = &result {
                let max_entries = inner.config.max_entries;
                inner
                    .lock()
                    .store(fingerprint.clone(), value.clone(), max_entries);
            }
            inner.schedule_release(fingerprint, id);
            result
        });
        let outcome: BoxFuture<'static, Result<V>> = Box::pin(async move {
            handle.await.unwrap_or_else(|e| {
                Err(MealgateError::Unknown(format!("computation task failed: {e}")))
            })
        });
        outcome.shared()
    }

    /// Live cached value, using the configured TTL.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<V> {
        self.inner
            .lock()
            .live_value(fingerprint, self.inner.config.ttl)
    }

    /// Insert (or overwrite) a value directly.
    ///
    /// Overwriting moves the entry to the newest insertion position.
    pub fn insert(&self, fingerprint: Fingerprint, value: V) {
        let max_entries = self.inner.config.max_entries;
        self.inner.lock().store(fingerprint, value, max_entries);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.lock().remove(fingerprint)
    }

    /// Evict all entries. In-flight computations are unaffected.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fingerprints currently registered as in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }
}

impl<V> ResponseCache<V> {
    /// Cancel pending deregistration timers and drop all registrations.
    ///
    /// Running computations still complete and still populate the cache.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        self.inner.lock().in_flight.clear();
    }
}

impl<V> Drop for ResponseCache<V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
