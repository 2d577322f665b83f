//! Read-through cache with single-flight recomputation
//!
//! Values live in a [`Cache`] backend under `namespace:id` keys, stored as
//! the JSON of an `Option<V>` so a confirmed absence (`null`) is cached just
//! like a hit. A miss registers one in-flight computation per key; concurrent
//! callers for the same key await that computation instead of starting their
//! own.
//!
//! The computation runs on its own task. A caller that gives up (timeout,
//! dropped request) does not cancel it, and its result still reaches the
//! other waiters and the backend.
//!
//! Registration, completion and invalidation all take the same lock. Each
//! registration carries a generation number and a completed computation only
//! writes its value back if its registration is still current, so a value
//! computed before an `invalidate` can never be stored after it.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::cache::{decode, encode, Cache, CacheNamespace};
use crate::domain::DomainError;
use crate::infrastructure::observability::{
    record_cache_invalidation, record_cache_lookup, CacheLookup,
};

type SharedComputation = Shared<BoxFuture<'static, Result<String, DomainError>>>;

struct InFlight {
    generation: u64,
    computation: SharedComputation,
}

type InFlightMap = Arc<Mutex<HashMap<String, InFlight>>>;

/// TTL settings for the read-through cache
#[derive(Debug, Clone)]
pub struct ReadThroughCacheConfig {
    pub default_ttl: Duration,
    pub namespace_ttls: HashMap<CacheNamespace, Duration>,
}

impl Default for ReadThroughCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            namespace_ttls: HashMap::new(),
        }
    }
}

impl ReadThroughCacheConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_namespace_ttl(mut self, namespace: CacheNamespace, ttl: Duration) -> Self {
        self.namespace_ttls.insert(namespace, ttl);
        self
    }

    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        self.namespace_ttls
            .get(&namespace)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

/// Keyed read-through cache shared by the verification pipeline and route
/// handlers
pub struct ReadThroughCache {
    backend: Arc<dyn Cache>,
    in_flight: InFlightMap,
    next_generation: AtomicU64,
    config: ReadThroughCacheConfig,
}

impl fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn Cache>, config: ReadThroughCacheConfig) -> Self {
        Self {
            backend,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &ReadThroughCacheConfig {
        &self.config
    }

    /// Return the cached value for `(namespace, id)` or compute it once
    ///
    /// `Ok(None)` is a cached "confirmed absent". Errors from `compute` are
    /// delivered to every waiter and nothing is stored.
    pub async fn get_or_compute<V, F, Fut>(
        &self,
        namespace: CacheNamespace,
        id: &str,
        compute: F,
    ) -> Result<Option<V>, DomainError>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, DomainError>> + Send + 'static,
    {
        let key = namespace.key(id);

        if let Some(value) = self.read_backend::<V>(&key).await {
            debug!(namespace = %namespace, id = %id, "Cache hit");
            record_cache_lookup(namespace, CacheLookup::Hit);
            return Ok(value);
        }

        let computation = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(entry) = in_flight.get(&key) {
                debug!(namespace = %namespace, id = %id, "Joining in-flight computation");
                record_cache_lookup(namespace, CacheLookup::Coalesced);
                entry.computation.clone()
            } else {
                // A computation may have stored its value between the read above
                // and taking the lock
                if let Some(value) = self.read_backend::<V>(&key).await {
                    debug!(namespace = %namespace, id = %id, "Cache hit");
                    record_cache_lookup(namespace, CacheLookup::Hit);
                    return Ok(value);
                }

                debug!(namespace = %namespace, id = %id, "Cache miss");
                record_cache_lookup(namespace, CacheLookup::Miss);

                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let computation = self.spawn_computation(
                    key.clone(),
                    self.config.ttl_for(namespace),
                    generation,
                    compute(),
                );
                in_flight.insert(
                    key,
                    InFlight {
                        generation,
                        computation: computation.clone(),
                    },
                );
                computation
            }
        };

        let json = computation.await?;
        decode(&json)
    }

    /// Drop the entry for `(namespace, id)`
    ///
    /// Any computation still in flight for the key is detached: its current
    /// waiters still receive its result but it is not stored, and the next
    /// lookup starts a fresh computation.
    pub async fn invalidate(&self, namespace: CacheNamespace, id: &str) -> Result<(), DomainError> {
        let key = namespace.key(id);
        let mut in_flight = self.in_flight.lock().await;

        in_flight.remove(&key);
        self.backend.remove(&key).await?;

        info!(namespace = %namespace, id = %id, "Cache entry invalidated");
        record_cache_invalidation(namespace);
        Ok(())
    }

    /// Drop every entry of `namespace`
    pub async fn invalidate_namespace(&self, namespace: CacheNamespace) -> Result<usize, DomainError> {
        let prefix = namespace.prefix();
        let mut in_flight = self.in_flight.lock().await;

        in_flight.retain(|key, _| !key.starts_with(&prefix));
        let deleted = self.backend.remove_namespace(namespace).await?;

        info!(namespace = %namespace, deleted, "Cache namespace invalidated");
        record_cache_invalidation(namespace);
        Ok(deleted)
    }

    /// Number of computations currently registered
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    async fn read_backend<V: DeserializeOwned>(&self, key: &str) -> Option<Option<V>> {
        match self.backend.load(key).await {
            Ok(Some(json)) => match decode(&json) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache backend read failed, treating as miss");
                None
            }
        }
    }

    fn spawn_computation<V, Fut>(
        &self,
        key: String,
        ttl: Duration,
        generation: u64,
        compute: Fut,
    ) -> SharedComputation
    where
        V: Serialize + Send + 'static,
        Fut: Future<Output = Result<Option<V>, DomainError>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let in_flight = Arc::clone(&self.in_flight);
        let registry = Arc::clone(&self.in_flight);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let key = task_key;
            let result = match AssertUnwindSafe(compute).catch_unwind().await {
                Ok(result) => result.and_then(|value| encode(&value)),
                Err(_) => {
                    error!(key = %key, "Cache computation panicked");
                    Err(DomainError::internal("Cache computation panicked"))
                }
            };

            let mut in_flight = in_flight.lock().await;
            let current = in_flight
                .get(&key)
                .is_some_and(|entry| entry.generation == generation);

            if current {
                if let Ok(json) = &result {
                    if let Err(e) = backend.store(&key, json, ttl).await {
                        warn!(key = %key, error = %e, "Cache backend write failed");
                    }
                }
                in_flight.remove(&key);
            } else {
                debug!(key = %key, "Discarding result of invalidated computation");
            }

            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    // The task never reached its own cleanup
                    let mut in_flight = registry.lock().await;
                    if in_flight
                        .get(&key)
                        .is_some_and(|entry| entry.generation == generation)
                    {
                        in_flight.remove(&key);
                    }
                    Err(DomainError::internal(format!("Cache computation aborted: {}", e)))
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheExt, MockCache};
    use crate::infrastructure::cache::InMemoryCache;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn create_cache() -> (Arc<MockCache>, ReadThroughCache) {
        let backend = Arc::new(MockCache::new());
        let cache = ReadThroughCache::new(backend.clone(), ReadThroughCacheConfig::default());
        (backend, cache)
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: Option<u32>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Option<u32>, DomainError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let (_, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute(CacheNamespace::ApiById, "api_1", counting(&calls, Some(7)))
            .await
            .unwrap();
        let second = cache
            .get_or_compute(CacheNamespace::ApiById, "api_1", counting(&calls, Some(8)))
            .await
            .unwrap();

        assert_eq!(first, Some(7));
        assert_eq!(second, Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_absence_is_cached() {
        let (backend, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute(CacheNamespace::KeyByHash, "h", counting(&calls, None))
            .await
            .unwrap();
        let second = cache
            .get_or_compute(CacheNamespace::KeyByHash, "h", counting(&calls, Some(1)))
            .await
            .unwrap();

        assert_eq!(first, None);
        assert_eq!(second, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let raw: Option<Option<u32>> = backend.load_value("keyByHash:h").await.unwrap();
        assert_eq!(raw, Some(None));
    }

    #[tokio::test]
    async fn test_invalidate_then_lookup_recomputes() {
        let (_, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute(CacheNamespace::ApiById, "api_1", counting(&calls, Some(1)))
            .await
            .unwrap();
        cache
            .invalidate(CacheNamespace::ApiById, "api_1")
            .await
            .unwrap();
        let value = cache
            .get_or_compute(CacheNamespace::ApiById, "api_1", counting(&calls, Some(2)))
            .await
            .unwrap();

        assert_eq!(value, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let (_, cache) = create_cache();
        let cache = Arc::new(cache);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(CacheNamespace::KeyById, "key_1", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Some(42u32))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_compute_independently() {
        let (_, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_compute(CacheNamespace::KeyById, "x", counting(&calls, Some(1))),
            cache.get_or_compute(CacheNamespace::KeyByHash, "x", counting(&calls, Some(2))),
        );

        assert_eq!(a.unwrap(), Some(1));
        assert_eq!(b.unwrap(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_reach_waiters_and_are_not_cached() {
        let (backend, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<Option<u32>, _> = cache
            .get_or_compute(CacheNamespace::KeyById, "key_1", || async {
                Err(DomainError::storage("connection reset"))
            })
            .await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert_eq!(backend.len().await.unwrap(), 0);
        assert_eq!(cache.in_flight_count().await, 0);

        let value = cache
            .get_or_compute(CacheNamespace::KeyById, "key_1", counting(&calls, Some(3)))
            .await
            .unwrap();
        assert_eq!(value, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_then_clears() {
        let (backend, cache) = create_cache();
        let cache = Arc::new(cache);
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(CacheNamespace::KeyById, "key_1", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Err::<Option<u32>, _>(DomainError::storage("connection reset"))
                    })
                    .await
            }));
        }

        while cache.in_flight_count().await == 0 || calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result, Err(DomainError::storage("connection reset")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_count().await, 0);
        assert_eq!(backend.len().await.unwrap(), 0);

        let retry_calls = Arc::new(AtomicUsize::new(0));
        let value = cache
            .get_or_compute(CacheNamespace::KeyById, "key_1", counting(&retry_calls, Some(9)))
            .await
            .unwrap();
        assert_eq!(value, Some(9));
        assert_eq!(retry_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_computation_does_not_stick() {
        let (_, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<Option<u32>, _> = cache
            .get_or_compute(CacheNamespace::KeyById, "k", || async {
                if true {
                    panic!("driver bug");
                }
                Ok(None)
            })
            .await;
        assert!(matches!(result, Err(DomainError::Internal { .. })));
        assert_eq!(cache.in_flight_count().await, 0);

        let value = cache
            .get_or_compute(CacheNamespace::KeyById, "k", counting(&calls, Some(1)))
            .await
            .unwrap();
        assert_eq!(value, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_cancel_computation() {
        let (_, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let slow_calls = Arc::clone(&calls);

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_compute(CacheNamespace::ApiById, "api_1", move || async move {
                slow_calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Some(5u32))
            }),
        )
        .await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let value = cache
            .get_or_compute(CacheNamespace::ApiById, "api_1", counting(&calls, Some(6)))
            .await
            .unwrap();
        assert_eq!(value, Some(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_during_computation_discards_stale_value() {
        let (_, cache) = create_cache();
        let cache = Arc::new(cache);
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let leader = {
            let cache = Arc::clone(&cache);
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get_or_compute(CacheNamespace::ApiById, "api_1", move || async move {
                        started.notify_one();
                        release.notified().await;
                        Ok(Some("before-delete".to_string()))
                    })
                    .await
            })
        };

        started.notified().await;
        cache
            .invalidate(CacheNamespace::ApiById, "api_1")
            .await
            .unwrap();
        release.notify_one();

        assert_eq!(
            leader.await.unwrap().unwrap(),
            Some("before-delete".to_string())
        );

        let fresh = cache
            .get_or_compute(CacheNamespace::ApiById, "api_1", || async {
                Ok(Some("after-delete".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(fresh, Some("after-delete".to_string()));
    }

    #[tokio::test]
    async fn test_backend_read_failure_is_a_miss() {
        let (backend, cache) = create_cache();
        backend.set_error(Some("backend down".to_string()));
        let calls = Arc::new(AtomicUsize::new(0));

        let value = cache
            .get_or_compute(CacheNamespace::KeyById, "key_1", counting(&calls, Some(9)))
            .await
            .unwrap();

        assert_eq!(value, Some(9));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_namespace_ttl_override() {
        let backend = Arc::new(MockCache::new());
        let config = ReadThroughCacheConfig::default()
            .with_default_ttl(Duration::from_secs(30))
            .with_namespace_ttl(CacheNamespace::PermissionsByKeyId, Duration::from_secs(5));
        let cache = ReadThroughCache::new(backend.clone(), config);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute(CacheNamespace::PermissionsByKeyId, "k", counting(&calls, Some(1)))
            .await
            .unwrap();
        cache
            .get_or_compute(CacheNamespace::KeyById, "k", counting(&calls, Some(1)))
            .await
            .unwrap();

        assert_eq!(
            backend.ttl_of("permissionsByKeyId:k"),
            Some(Duration::from_secs(5))
        );
        assert_eq!(backend.ttl_of("keyById:k"), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let backend = Arc::new(InMemoryCache::new());
        let config = ReadThroughCacheConfig::default().with_default_ttl(Duration::from_millis(20));
        let cache = ReadThroughCache::new(backend, config);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute(CacheNamespace::KeyById, "k", counting(&calls, Some(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let value = cache
            .get_or_compute(CacheNamespace::KeyById, "k", counting(&calls, Some(2)))
            .await
            .unwrap();

        assert_eq!(value, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_namespace() {
        let (backend, cache) = create_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        for id in ["a", "b"] {
            cache
                .get_or_compute(CacheNamespace::KeyById, id, counting(&calls, Some(1)))
                .await
                .unwrap();
        }
        cache
            .get_or_compute(CacheNamespace::ApiById, "a", counting(&calls, Some(1)))
            .await
            .unwrap();

        let deleted = cache
            .invalidate_namespace(CacheNamespace::KeyById)
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert!(backend.contains("apiById:a").await.unwrap());
        assert!(!backend.contains("keyById:a").await.unwrap());
    }
}
