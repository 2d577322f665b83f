//! Keygate
//!
//! API key verification and permission evaluation:
//! - Directional wildcard matching of `resource.instance.action` permissions
//! - Boolean permission queries evaluated against a key's grants
//! - A key verification pipeline over a pluggable key store
//! - A single-flight read-through cache with explicit invalidation

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use domain::{CacheNamespace, DomainError, KeyStore};
use infrastructure::auth::AuthContext;
use infrastructure::cache::{
    InMemoryCache, InMemoryCacheConfig, ReadThroughCache, ReadThroughCacheConfig,
};
use infrastructure::key::{KeyHasher, KeyVerifier};

/// Build the key hasher described by the verification settings
pub fn create_key_hasher(config: &AppConfig) -> KeyHasher {
    let hasher = KeyHasher::new().with_max_key_length(config.verification.max_key_length);

    match &config.verification.key_prefix {
        Some(prefix) => hasher.with_prefix(prefix),
        None => hasher,
    }
}

/// Build the shared read-through cache from the cache settings
pub fn create_cache(config: &AppConfig) -> Result<ReadThroughCache, DomainError> {
    let mut cache_config = ReadThroughCacheConfig::default().with_default_ttl(config.cache.default_ttl());

    for (namespace, secs) in &config.cache.namespace_ttl_secs {
        let namespace = CacheNamespace::from_str(namespace)?;
        cache_config = cache_config.with_namespace_ttl(namespace, Duration::from_secs(*secs));
    }

    let backend = InMemoryCache::with_config(
        InMemoryCacheConfig::default().with_max_capacity(config.cache.max_capacity),
    );

    Ok(ReadThroughCache::new(Arc::new(backend), cache_config))
}

/// Wire a store, cache and verifier into one authorization context
pub fn create_auth_context<S>(config: &AppConfig, store: Arc<S>) -> Result<AuthContext<S>, DomainError>
where
    S: KeyStore + 'static,
{
    let cache = Arc::new(create_cache(config)?);

    let verifier = KeyVerifier::new(store, cache)
        .with_hasher(create_key_hasher(config))
        .with_root_key_wildcard(config.verification.root_key_wildcard);

    info!(
        max_capacity = config.cache.max_capacity,
        default_ttl_secs = config.cache.default_ttl_secs,
        root_key_wildcard = config.verification.root_key_wildcard,
        "Authorization context created"
    );

    Ok(AuthContext::new(verifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    use crate::domain::key::{KeyId, KeyRecord, WorkspaceId};
    use crate::infrastructure::key::InMemoryKeyStore;

    #[test]
    fn test_create_cache_with_namespace_ttls() {
        let config = AppConfig::from_toml(
            r#"
            [cache]
            default_ttl_secs = 30

            [cache.namespace_ttl_secs]
            keyByHash = 5
            "#,
        )
        .unwrap();

        let cache = assert_ok!(create_cache(&config));
        assert_eq!(
            cache.config().ttl_for(CacheNamespace::KeyByHash),
            Duration::from_secs(5)
        );
        assert_eq!(
            cache.config().ttl_for(CacheNamespace::ApiById),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_create_cache_rejects_unknown_namespace() {
        let mut config = AppConfig::default();
        config
            .cache
            .namespace_ttl_secs
            .insert("sessions".to_string(), 10);

        let err = assert_err!(create_cache(&config));
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_create_key_hasher_applies_prefix() {
        let mut config = AppConfig::default();
        config.verification.key_prefix = Some("kg".to_string());

        let hasher = create_key_hasher(&config);
        assert_eq!(hasher.prefix(), Some("kg"));
        assert_err!(hasher.check_format("sk_abcdef"));
        assert_ok!(hasher.check_format("kg_abcdef"));
    }

    #[tokio::test]
    async fn test_create_auth_context_verifies_keys() {
        let mut config = AppConfig::default();
        config.verification.key_prefix = Some("kg".to_string());
        let hasher = create_key_hasher(&config);
        let generated = hasher.generate();

        let store = Arc::new(InMemoryKeyStore::new());
        store
            .insert_key(KeyRecord::new(
                KeyId::new("key_1").unwrap(),
                WorkspaceId::new("ws_1").unwrap(),
                generated.hash.clone(),
                generated.start.clone(),
            ))
            .await
            .unwrap();

        let context = create_auth_context(&config, store).unwrap();

        let result = context.verify(&generated.secret, None).await.unwrap();
        assert!(result.is_valid());

        let result = context.verify("sk_not_ours", None).await.unwrap();
        assert_eq!(result.outcome(), "malformed_key");
    }
}
