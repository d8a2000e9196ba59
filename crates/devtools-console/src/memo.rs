//! Keyed memoization over asynchronous computations.
//!
//! [`MemoCache::get`] never suspends: it answers with the cached value, the
//! cached failure, or a [`PendingHandle`] shared by every reader of that key.
//! Each pending key is driven to completion by exactly one settle task on the
//! cache's runtime, so the outcome lands in the cache even when nobody awaits
//! the handle.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;

use crate::RT;

/// Number of settled entries kept when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// What a compute function hands back to the cache.
pub enum Computation<V, E> {
    /// The outcome was available synchronously.
    Ready(Result<V, E>),
    /// The outcome will be produced by this future.
    Pending(BoxFuture<'static, Result<V, E>>),
}

impl<V, E> Computation<V, E> {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        Computation::Pending(future.boxed())
    }
}

/// Tri-state read of a cache entry.
#[derive(Debug)]
pub enum Lookup<V, E> {
    Ready(V),
    Failed(E),
    Pending(PendingHandle<V, E>),
}

impl<V, E> Lookup<V, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Lookup::Pending(_))
    }
}

/// Shared handle to an in-flight computation.
///
/// Every clone observes the same outcome.
pub struct PendingHandle<V, E> {
    shared: Shared<BoxFuture<'static, Result<V, E>>>,
}

impl<V, E> Clone for PendingHandle<V, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V, E> std::fmt::Debug for PendingHandle<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHandle").finish_non_exhaustive()
    }
}

impl<V, E> PendingHandle<V, E>
where
    V: Clone,
    E: Clone,
{
    fn new(future: BoxFuture<'static, Result<V, E>>) -> Self {
        Self {
            shared: future.shared(),
        }
    }

    /// The outcome, if the computation has already settled.
    pub fn peek(&self) -> Option<Result<V, E>> {
        self.shared.peek().cloned()
    }

    /// Waits until the computation settles.
    pub async fn wait(self) -> Result<V, E> {
        self.shared.await
    }

    /// True when both handles refer to the same computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.shared.ptr_eq(&other.shared)
    }
}

#[derive(Debug, Clone)]
enum Settled<V, E> {
    Resolved(V),
    Failed(E),
}

impl<V: Clone, E: Clone> Settled<V, E> {
    fn from_result(result: Result<V, E>) -> Self {
        match result {
            Ok(value) => Settled::Resolved(value),
            Err(err) => Settled::Failed(err),
        }
    }

    fn to_lookup(&self) -> Lookup<V, E> {
        match self {
            Settled::Resolved(value) => Lookup::Ready(value.clone()),
            Settled::Failed(err) => Lookup::Failed(err.clone()),
        }
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub settled: usize,
    pub pending: usize,
}

struct Inner<K: Hash + Eq, V, E> {
    settled: LruCache<K, Settled<V, E>>,
    // Pending entries are never evicted; dropping one would allow a second
    // computation for the same key while the first is still in flight.
    pending: HashMap<K, PendingHandle<V, E>>,
    generation: u64,
    stats: CacheStats,
}

impl<K: Hash + Eq, V: Clone, E: Clone> Inner<K, V, E> {
    fn settle(&mut self, key: K, outcome: Settled<V, E>) {
        self.pending.remove(&key);
        // a key is never settled and pending at once, so anything handed back
        // by push is an evicted entry
        if self.settled.push(key, outcome).is_some() {
            self.stats.evictions += 1;
        }
    }
}

/// Builder for [`MemoCache`].
///
/// # Examples
///
/// ```
/// use devtools_console::memo::MemoCacheBuilder;
///
/// let cache = MemoCacheBuilder::new().capacity(64).build::<String, String, String>();
/// assert_eq!(cache.stats().settled, 0);
/// ```
pub struct MemoCacheBuilder {
    capacity: Option<NonZeroUsize>,
    runtime: Option<Handle>,
}

impl MemoCacheBuilder {
    pub fn new() -> Self {
        Self {
            capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY),
            runtime: None,
        }
    }

    /// Maximum number of settled entries. `0` disables eviction.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = NonZeroUsize::new(capacity);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.capacity = None;
        self
    }

    /// Runtime that drives pending computations. Defaults to the crate runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build<K, V, E>(self) -> MemoCache<K, V, E>
    where
        K: Hash + Eq,
    {
        let settled = match self.capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        MemoCache {
            inner: Arc::new(Mutex::new(Inner {
                settled,
                pending: HashMap::new(),
                generation: 0,
                stats: CacheStats::default(),
            })),
            runtime: self.runtime.unwrap_or_else(|| RT.handle().clone()),
        }
    }
}

impl Default for MemoCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache guaranteeing at most one in-flight computation per key.
pub struct MemoCache<K: Hash + Eq, V, E> {
    inner: Arc<Mutex<Inner<K, V, E>>>,
    runtime: Handle,
}

impl<K: Hash + Eq, V, E> Clone for MemoCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: self.runtime.clone(),
        }
    }
}

impl<K, V, E> MemoCache<K, V, E>
where
    K: Hash + Eq + Clone + std::fmt::Debug + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn builder() -> MemoCacheBuilder {
        MemoCacheBuilder::new()
    }

    /// Reads `key`, invoking `compute` only when the key is unknown.
    ///
    /// `compute` runs while the cache is locked and must not call back into
    /// the same cache.
    pub fn get<F>(&self, key: K, compute: F) -> Lookup<V, E>
    where
        F: FnOnce() -> Computation<V, E>,
    {
        let mut inner = lock(&self.inner);

        if let Some(settled) = inner.settled.get(&key) {
            let lookup = settled.to_lookup();
            inner.stats.hits += 1;
            tracing::trace!(?key, "memo hit");
            return lookup;
        }

        if let Some(handle) = inner.pending.get(&key).cloned() {
            inner.stats.hits += 1;
            // The settle task may not have run yet; promote a finished
            // computation so readers see the settled state right away.
            if let Some(result) = handle.peek() {
                let settled = Settled::from_result(result);
                let lookup = settled.to_lookup();
                inner.settle(key, settled);
                return lookup;
            }
            return Lookup::Pending(handle);
        }

        inner.stats.misses += 1;
        tracing::debug!(?key, "memo miss, computing");

        match compute() {
            Computation::Ready(result) => {
                let settled = Settled::from_result(result);
                let lookup = settled.to_lookup();
                inner.settle(key, settled);
                lookup
            }
            Computation::Pending(future) => {
                let handle = PendingHandle::new(future);
                inner.pending.insert(key.clone(), handle.clone());
                self.spawn_settle(key, handle.clone(), inner.generation);
                Lookup::Pending(handle)
            }
        }
    }

    fn spawn_settle(&self, key: K, handle: PendingHandle<V, E>, generation: u64) {
        let inner = Arc::clone(&self.inner);
        self.runtime.spawn(async move {
            let result = handle.clone().wait().await;
            let mut inner = lock(&inner);
            if inner.generation != generation {
                tracing::trace!(?key, "dropping outcome from a cleared generation");
                return;
            }
            let still_pending = inner
                .pending
                .get(&key)
                .is_some_and(|current| current.ptr_eq(&handle));
            if still_pending {
                tracing::debug!(?key, ok = result.is_ok(), "memo entry settled");
                inner.settle(key, Settled::from_result(result));
            }
        });
    }

    /// Forgets every entry. Computations still in flight finish but are not
    /// written back.
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.settled.clear();
        inner.pending.clear();
        inner.generation += 1;
    }

    pub fn len(&self) -> usize {
        let inner = lock(&self.inner);
        inner.settled.len() + inner.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = lock(&self.inner);
        CacheStats {
            settled: inner.settled.len(),
            pending: inner.pending.len(),
            ..inner.stats
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn cache<V, E>(capacity: usize) -> MemoCache<String, V, E>
    where
        V: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        MemoCacheBuilder::new()
            .capacity(capacity)
            .runtime(Handle::current())
            .build()
    }

    #[tokio::test]
    async fn test_sync_value_is_cached() {
        let cache = cache::<u32, String>(8);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Computation::Ready(Ok(7))
        };

        assert!(matches!(cache.get("a".into(), compute), Lookup::Ready(7)));
        assert!(matches!(cache.get("a".into(), compute), Lookup::Ready(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_pending_key_shares_one_computation() {
        let cache = cache::<String, String>(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<String>();
        let mut rx = Some(rx);

        let first = cache.get("k".into(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            let rx = rx.take().unwrap();
            Computation::pending(async move { rx.await.map_err(|e| e.to_string()) })
        });
        let second = cache.get("k".into(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            Computation::Ready(Ok("unused".to_string()))
        });

        let (Lookup::Pending(first), Lookup::Pending(second)) = (first, second) else {
            panic!("expected both lookups to be pending");
        };
        assert!(first.ptr_eq(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(first.peek().is_none());

        tx.send("done".to_string()).unwrap();
        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert_eq!(a, Ok("done".to_string()));
        assert_eq!(b, Ok("done".to_string()));

        let after = cache.get("k".into(), || panic!("settled key must not recompute"));
        assert!(matches!(after, Lookup::Ready(ref v) if v == "done"));
        assert_eq!(cache.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_cached() {
        let cache = cache::<String, String>(8);
        let handle = match cache.get("bad".into(), || {
            Computation::pending(async { Err::<String, _>("engine rejected".to_string()) })
        }) {
            Lookup::Pending(handle) => handle,
            other => panic!("expected pending, got {other:?}"),
        };
        assert_eq!(handle.wait().await, Err("engine rejected".to_string()));

        let lookup = cache.get("bad".into(), || panic!("failed key must not recompute"));
        assert!(matches!(lookup, Lookup::Failed(ref e) if e == "engine rejected"));
    }

    #[tokio::test]
    async fn test_settles_without_observers() {
        let cache = cache::<u8, String>(8);
        let lookup = cache.get("bg".into(), || Computation::pending(async { Ok(1) }));
        drop(lookup);

        for _ in 0..100 {
            if cache.pending_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(cache.stats().settled, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_of_settled_entries() {
        let cache = cache::<usize, String>(2);
        let calls = AtomicUsize::new(0);
        let get = |key: &str| {
            cache.get(key.to_string(), || {
                Computation::Ready(Ok(calls.fetch_add(1, Ordering::SeqCst)))
            })
        };

        get("a");
        get("b");
        get("c");
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 2);

        get("a");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_outcome() {
        let cache = cache::<u8, String>(8);
        let (tx, rx) = oneshot::channel::<u8>();
        let handle = match cache.get("k".into(), || {
            Computation::pending(async move { rx.await.map_err(|e| e.to_string()) })
        }) {
            Lookup::Pending(handle) => handle,
            other => panic!("expected pending, got {other:?}"),
        };

        cache.clear();
        tx.send(3).unwrap();
        assert_eq!(handle.wait().await, Ok(3));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(cache.is_empty());
        let lookup = cache.get("k".into(), || Computation::Ready(Ok(9)));
        assert!(matches!(lookup, Lookup::Ready(9)));
    }
}
