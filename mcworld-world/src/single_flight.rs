//! Keyed cache that runs at most one load per key at a time.
//!
//! A key is *absent*, *loading* or *resident*. The first caller for an
//! absent key starts the loader on its own task; everyone who asks while it
//! runs (the issuer included) is registered as a waiter and woken, in
//! registration order, with the same value or the same error. Dropping a
//! caller never cancels the load. A failed load leaves the key absent so the
//! next request tries again. Resident values are never evicted.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use mcworld_metrics::CacheMetrics;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type Waiter<V> = oneshot::Sender<Result<V>>;

enum Slot<V> {
    Loading(Vec<Waiter<V>>),
    Resident(V),
}

struct Slots<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    metrics: Arc<CacheMetrics>,
}

pub struct SingleFlight<K, V> {
    inner: Arc<Slots<K, V>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(metrics: Arc<CacheMetrics>) -> Self {
        Self {
            inner: Arc::new(Slots {
                slots: Mutex::new(HashMap::new()),
                metrics,
            }),
        }
    }

    /// Cached value for `key`, or the outcome of `load` (shared with every
    /// concurrent caller for the same key).
    ///
    /// `load` is only called when no load for `key` is in flight. Its future
    /// runs on a spawned task, so it must own everything it touches.
    pub async fn get_or_load<F, Fut>(&self, key: K, load: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let metrics = &self.inner.metrics;
        let (tx, rx) = oneshot::channel();
        let issue = {
            let mut slots = self.inner.lock();
            match slots.get_mut(&key) {
                Some(Slot::Resident(value)) => {
                    metrics.record_hit();
                    return Ok(value.clone());
                }
                Some(Slot::Loading(waiters)) => {
                    metrics.record_coalesced();
                    waiters.push(tx);
                    false
                }
                None => {
                    metrics.record_miss();
                    slots.insert(key.clone(), Slot::Loading(vec![tx]));
                    true
                }
            }
        };

        if issue {
            let flight = InFlight {
                slots: Arc::clone(&self.inner),
                key: Some(key),
            };
            let loading = load();
            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = loading.await;
                match &outcome {
                    Ok(_) => flight.slots.metrics.record_load(started.elapsed()),
                    Err(_) => flight.slots.metrics.record_failure(started.elapsed()),
                }
                flight.settle(outcome);
            });
        }

        rx.await.unwrap_or(Err(Error::Abandoned))
    }

    /// Cached value without loading.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.inner.lock().get(key) {
            Some(Slot::Resident(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_loading(&self, key: &K) -> bool {
        matches!(self.inner.lock().get(key), Some(Slot::Loading(_)))
    }

    /// Number of resident values.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Resident(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every resident value.
    pub fn values(&self) -> Vec<V> {
        self.inner
            .lock()
            .values()
            .filter_map(|slot| match slot {
                Slot::Resident(value) => Some(value.clone()),
                Slot::Loading(_) => None,
            })
            .collect()
    }

    #[cfg(test)]
    fn waiters(&self, key: &K) -> usize {
        match self.inner.lock().get(key) {
            Some(Slot::Loading(waiters)) => waiters.len(),
            _ => 0,
        }
    }
}

impl<K, V> Slots<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, key: K, outcome: Result<V>) {
        // Clear the pending record before waking anyone.
        let waiters = {
            let mut slots = self.lock();
            let slot = slots.remove(&key);
            debug_assert!(
                matches!(slot, Some(Slot::Loading(_))),
                "settled a key that was not loading"
            );
            let waiters = match slot {
                Some(Slot::Loading(waiters)) => waiters,
                _ => Vec::new(),
            };
            if let Ok(value) = &outcome {
                slots.insert(key, Slot::Resident(value.clone()));
            }
            waiters
        };

        for waiter in waiters {
            // A waiter that stopped listening is not an error.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn abandon(&self, key: &K) {
        let mut slots = self.lock();
        if matches!(slots.get(key), Some(Slot::Loading(_))) {
            // Dropping the senders wakes every waiter with `Abandoned`.
            slots.remove(key);
        }
    }
}

/// Owned by the load task. If the task ends without settling (the loader
/// panicked, or the runtime shut down) the key is released instead of
/// staying stuck in the loading state.
struct InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    slots: Arc<Slots<K, V>>,
    key: Option<K>,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn settle(mut self, outcome: Result<V>) {
        if let Some(key) = self.key.take() {
            self.slots.settle(key, outcome);
        }
    }
}

impl<K, V> Drop for InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            log::warn!("Load task ended without a result; releasing waiters");
            self.slots.abandon(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache() -> SingleFlight<u32, Arc<String>> {
        SingleFlight::new(Arc::default())
    }

    async fn never_called() -> Result<Arc<String>> {
        unreachable!("load already in flight")
    }

    async fn crashing_load() -> Result<Arc<String>> {
        panic!("loader crashed")
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_load() {
        let cache = cache();
        let loads = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let counter = Arc::clone(&loads);
        let issuer = cache.get_or_load(7, move || async move {
            let _ = gate.await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new("chunk".to_string()))
        });
        let second = cache.get_or_load(7, never_called);
        let third = cache.get_or_load(7, never_called);
        let releaser = async {
            tokio::task::yield_now().await;
            let _ = release.send(());
        };

        let (a, b, c, ()) = tokio::join!(issuer, second, third, releaser);
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
        assert_eq!(cache.inner.metrics.misses.load(Ordering::Relaxed), 1);
        assert_eq!(cache.inner.metrics.coalesced.load(Ordering::Relaxed), 2);

        // Later callers are served from the cache
        let d = cache.get_or_load(7, never_called).await.unwrap();
        assert!(Arc::ptr_eq(&a, &d));
        assert_eq!(cache.inner.metrics.hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_waiters_are_woken_in_request_order() {
        const WAITERS: usize = 8;
        let cache = Arc::new(cache());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (release, gate) = oneshot::channel::<()>();
        let mut gate = Some(gate);

        let mut tasks = Vec::new();
        for id in 0..WAITERS {
            let cache_ref = Arc::clone(&cache);
            let order = Arc::clone(&order);
            let gate = gate.take();
            tasks.push(tokio::spawn(async move {
                let value = cache_ref
                    .get_or_load(1, move || async move {
                        if let Some(gate) = gate {
                            let _ = gate.await;
                        }
                        Ok(Arc::new("shared".to_string()))
                    })
                    .await;
                order.lock().unwrap().push(id);
                value
            }));
            // Registered before the next one asks
            while cache.waiters(&1) < id + 1 {
                tokio::task::yield_now().await;
            }
        }

        let _ = release.send(());
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().as_str(), "shared");
        }
        assert_eq!(*order.lock().unwrap(), (0..WAITERS).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_clears_key() {
        let cache = cache();
        let (release, gate) = oneshot::channel::<()>();

        let issuer = cache.get_or_load(3, move || async move {
            let _ = gate.await;
            Err(Error::ChunkNotFound { x: 3, z: 0 })
        });
        let waiter = cache.get_or_load(3, never_called);
        let releaser = async {
            tokio::task::yield_now().await;
            let _ = release.send(());
        };

        let (a, b, ()) = tokio::join!(issuer, waiter, releaser);
        assert!(matches!(a, Err(Error::ChunkNotFound { x: 3, z: 0 })));
        assert!(matches!(b, Err(Error::ChunkNotFound { x: 3, z: 0 })));
        assert!(!cache.is_loading(&3));
        assert!(cache.get(&3).is_none());

        // The key is retried, not poisoned
        let value = cache.get_or_load(3, || async { Ok(Arc::new("now".to_string())) }).await.unwrap();
        assert_eq!(value.as_str(), "now");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.inner.metrics.failures.load(Ordering::Relaxed), 1);
        assert_eq!(cache.inner.metrics.loads.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_dropped_issuer_does_not_cancel_load() {
        let cache = cache();
        let (release, gate) = oneshot::channel::<()>();

        let issuer = cache.get_or_load(9, move || async move {
            let _ = gate.await;
            Ok(Arc::new("kept".to_string()))
        });
        assert!(tokio::time::timeout(Duration::from_millis(1), issuer).await.is_err());
        assert!(cache.is_loading(&9));

        let waiter = cache.get_or_load(9, never_called);
        let _ = release.send(());
        assert_eq!(waiter.await.unwrap().as_str(), "kept");
        assert_eq!(cache.get(&9).map(|v| v.to_string()), Some("kept".to_string()));
        assert_eq!(cache.inner.metrics.loads.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_panicking_loader_releases_waiters() {
        let cache = cache();

        let (a, b) = tokio::join!(cache.get_or_load(4, crashing_load), cache.get_or_load(4, never_called));
        assert!(matches!(a, Err(Error::Abandoned)));
        assert!(matches!(b, Err(Error::Abandoned)));
        assert!(!cache.is_loading(&4));

        let value = cache.get_or_load(4, || async { Ok(Arc::new("retry".to_string())) }).await.unwrap();
        assert_eq!(value.as_str(), "retry");
    }
}
