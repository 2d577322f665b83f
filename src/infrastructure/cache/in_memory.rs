//! Moka-backed cache storage

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::domain::cache::{Cache, CacheNamespace};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    pub max_capacity: u64,
    /// Longest lifetime granted to any entry, whatever TTL it was stored with
    pub max_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(3600),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct StoredJson {
    json: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with
struct PerEntryTtl {
    max_ttl: Duration,
}

impl Expiry<String, StoredJson> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &StoredJson, _now: Instant) -> Option<Duration> {
        Some(value.ttl.min(self.max_ttl))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredJson,
        _now: Instant,
        _current: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl.min(self.max_ttl))
    }
}

/// Process-local [`Cache`] bounded by entry count
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    entries: MokaCache<String, StoredJson>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl {
                max_ttl: config.max_ttl,
            })
            .build();

        Self { entries }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn load(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.entries.get(key).await.map(|stored| stored.json.to_string()))
    }

    async fn store(&self, key: &str, json: &str, ttl: Duration) -> Result<(), DomainError> {
        let stored = StoredJson {
            json: Arc::from(json),
            ttl,
        };
        self.entries.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn remove_namespace(&self, namespace: CacheNamespace) -> Result<usize, DomainError> {
        let prefix = namespace.prefix();

        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| String::clone(&key))
            .collect();

        let mut removed = 0;
        for key in doomed {
            if self.entries.remove(&key).await.is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        self.entries.run_pending_tasks().await;
        Ok(self.entries.entry_count() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    #[tokio::test]
    async fn test_store_and_load() {
        let cache = InMemoryCache::new();

        cache
            .store_value("keyById:1", &"value", Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<String> = cache.load_value("keyById:1").await.unwrap();
        assert_eq!(value, Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = InMemoryCache::new();
        cache
            .store_value("keyById:short", &1, Duration::from_millis(30))
            .await
            .unwrap();
        cache
            .store_value("keyById:long", &2, Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!cache.contains("keyById:short").await.unwrap());
        assert!(cache.contains("keyById:long").await.unwrap());
    }

    #[tokio::test]
    async fn test_max_ttl_caps_entry_lifetime() {
        let cache = InMemoryCache::with_config(
            InMemoryCacheConfig::default().with_max_ttl(Duration::from_millis(30)),
        );
        cache
            .store_value("keyById:1", &1, Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!cache.contains("keyById:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = InMemoryCache::new();
        cache
            .store_value("keyById:1", &1, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.remove("keyById:1").await.unwrap());
        assert!(!cache.remove("keyById:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_namespace() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.store_value("keyById:1", &1, ttl).await.unwrap();
        cache.store_value("keyById:2", &2, ttl).await.unwrap();
        cache.store_value("apiById:keyById:3", &3, ttl).await.unwrap();

        let removed = cache.remove_namespace(CacheNamespace::KeyById).await.unwrap();

        assert_eq!(removed, 2);
        assert!(cache.contains("apiById:keyById:3").await.unwrap());
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
