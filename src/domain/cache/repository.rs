//! Storage contract behind the read-through cache

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::namespace::CacheNamespace;
use crate::domain::DomainError;

/// Expiring string storage shared by every verifier in the process
///
/// Entries hold JSON so that one backend can serve every namespace and the
/// trait stays object safe. [`CacheExt`] adds typed access.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// JSON stored under `key`, or `None` once it has expired
    async fn load(&self, key: &str) -> Result<Option<String>, DomainError>;

    async fn store(&self, key: &str, json: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Returns whether an entry was removed
    async fn remove(&self, key: &str) -> Result<bool, DomainError>;

    /// Drop every entry of `namespace`, returning how many were removed
    async fn remove_namespace(&self, namespace: CacheNamespace) -> Result<usize, DomainError>;

    async fn contains(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.load(key).await?.is_some())
    }

    /// Live entries; may lag behind recent writes
    async fn len(&self) -> Result<usize, DomainError>;
}

pub(crate) fn encode<V: Serialize + ?Sized>(value: &V) -> Result<String, DomainError> {
    serde_json::to_string(value)
        .map_err(|e| DomainError::cache(format!("Cannot encode cached value: {}", e)))
}

pub(crate) fn decode<V: DeserializeOwned>(json: &str) -> Result<V, DomainError> {
    serde_json::from_str(json)
        .map_err(|e| DomainError::cache(format!("Cannot decode cached value: {}", e)))
}

/// Typed load/store on top of [`Cache`]
pub trait CacheExt: Cache {
    fn load_value<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move { self.load(key).await?.map(|json| decode(&json)).transpose() }
    }

    fn store_value<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move { self.store(key, &encode(value)?, ttl).await }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
