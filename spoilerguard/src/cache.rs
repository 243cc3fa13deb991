//! TTL-bounded lookup cache with in-flight de-duplication.
//!
//! Each key moves through `absent → pending(waiters) → resolved(value, timestamp)`:
//!
//! - `absent`: the first caller of [`LookupCache::get_or_compute`] marks the
//!   key pending and runs the computation behind the [`RequestGovernor`].
//! - `pending`: later callers for the same key join the waiter list and receive
//!   a clone of the same result, so one computation serves everyone.
//! - `resolved`: a successful result is stored with the time it was inserted.
//!   It is served while younger than the TTL.
//!
//! Failures are handed to every waiter but never stored. The pending marker is
//! cleared on success, failure, and when the computing future is dropped.
//!
//! Capacity is bounded. Inserting past capacity evicts the oldest-inserted
//! entry; reads do not refresh an entry's position.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{sync::oneshot, time::Instant};

use crate::{
    error::{SpoilerError, SpoilerResult},
    governor::RequestGovernor,
};

/// Default maximum number of entries per cache.
pub const DEFAULT_CAPACITY: usize = 50;

/// Time-to-live of container episode listings.
pub const EPISODE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A stored value and the instant it was inserted.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: Instant,
}

impl<V> CacheEntry<V> {
    /// Valid while `now - timestamp < ttl`. No TTL means always valid.
    pub fn is_fresh(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_none_or(|ttl| now.saturating_duration_since(self.timestamp) < ttl)
    }
}

type Waiter<V> = oneshot::Sender<SpoilerResult<V>>;

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    // Insertion order, oldest first.
    order: VecDeque<K>,
    pending: HashMap<K, Vec<Waiter<V>>>,
}

impl<K, V> CacheState<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn fresh_value(&mut self, key: &K, ttl: Option<Duration>, now: Instant) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(ttl, now) => Some(entry.value.clone()),
            Some(_) => {
                self.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts `value` and returns the key evicted to stay within `capacity`.
    fn insert(&mut self, key: K, value: V, now: Instant, capacity: usize) -> Option<K> {
        let entry = CacheEntry {
            value,
            timestamp: now,
        };
        if self.entries.insert(key.clone(), entry).is_some() {
            self.order.retain(|existing| existing != &key);
        }
        self.order.push_back(key);

        let mut evicted = None;
        while self.entries.len() > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted = Some(oldest);
        }
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|existing| existing != key);
        Some(entry.value)
    }
}

enum Slot<V> {
    Ready(V),
    Join(oneshot::Receiver<SpoilerResult<V>>),
    Compute,
}

// =============================================================================
// LookupCache
// =============================================================================

/// Cache for values that are expensive to look up.
pub struct LookupCache<K, V> {
    name: &'static str,
    ttl: Option<Duration>,
    capacity: usize,
    governor: Arc<RequestGovernor>,
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> fmt::Debug for LookupCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> LookupCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
{
    /// Creates a cache. `ttl = None` keeps entries until evicted or invalidated.
    pub fn new(
        name: &'static str,
        ttl: Option<Duration>,
        capacity: usize,
        governor: Arc<RequestGovernor>,
    ) -> Self {
        Self {
            name,
            ttl,
            capacity: capacity.max(1),
            governor,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Returns the cached value if present and within TTL.
    ///
    /// An expired entry is dropped on the way.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().fresh_value(key, self.ttl, Instant::now())
    }

    /// Returns the cached value, joins a pending computation for `key`, or
    /// runs `compute` behind the governor and stores its successful result.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> SpoilerResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SpoilerResult<V>>,
    {
        let slot = {
            let mut state = self.lock();
            if let Some(value) = state.fresh_value(&key, self.ttl, Instant::now()) {
                Slot::Ready(value)
            } else if let Some(waiters) = state.pending.get_mut(&key) {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Slot::Join(rx)
            } else {
                state.pending.insert(key.clone(), Vec::new());
                Slot::Compute
            }
        };

        match slot {
            Slot::Ready(value) => Ok(value),
            Slot::Join(rx) => {
                tracing::trace!(cache = self.name, ?key, "joined pending lookup");
                rx.await.unwrap_or(Err(SpoilerError::LookupAbandoned))
            }
            Slot::Compute => self.compute(key, compute).await,
        }
    }

    async fn compute<F, Fut>(&self, key: K, compute: F) -> SpoilerResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SpoilerResult<V>>,
    {
        let pending = PendingGuard {
            cache: self,
            key: Some(key),
        };
        let result = match self.governor.acquire().await {
            Ok(_permit) => compute().await,
            Err(err) => Err(err),
        };
        pending.finish(result)
    }

    /// Stores `value` directly, as if computed now.
    pub fn insert(&self, key: K, value: V) {
        let evicted = self
            .lock()
            .insert(key, value, Instant::now(), self.capacity);
        if let Some(evicted) = evicted {
            tracing::trace!(cache = self.name, key = ?evicted, "evicted oldest entry");
        }
    }

    /// Removes `key` so the next lookup recomputes it.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.lock().remove(key)
    }

    /// Removes every stored entry. Pending computations are unaffected.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a computation in progress.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears a key's pending marker however its computation ends.
struct PendingGuard<'a, K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
{
    cache: &'a LookupCache<K, V>,
    key: Option<K>,
}

impl<K, V> PendingGuard<'_, K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
{
    fn finish(mut self, result: SpoilerResult<V>) -> SpoilerResult<V> {
        let Some(key) = self.key.take() else {
            return result;
        };
        let cache = self.cache;

        if let Err(err) = &result {
            tracing::warn!(cache = cache.name, ?key, error = %err, "lookup failed");
        }

        let (waiters, evicted) = {
            let mut state = cache.lock();
            let waiters = state.pending.remove(&key).unwrap_or_default();
            let evicted = match &result {
                Ok(value) => state.insert(key, value.clone(), Instant::now(), cache.capacity),
                Err(_) => None,
            };
            (waiters, evicted)
        };
        if let Some(evicted) = evicted {
            tracing::trace!(cache = cache.name, key = ?evicted, "evicted oldest entry");
        }

        for waiter in waiters {
            // A waiter that stopped listening is fine to skip.
            let _ = waiter.send(result.clone());
        }
        result
    }
}

impl<K, V> Drop for PendingGuard<'_, K, V>
where
    K: Clone + Eq + Hash + fmt::Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            tracing::debug!(cache = self.cache.name, ?key, "pending lookup dropped");
            // Dropping the senders wakes every waiter with `LookupAbandoned`.
            self.cache.lock().pending.remove(&key);
        }
    }
}
