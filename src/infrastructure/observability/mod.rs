//! Observability infrastructure

pub mod metrics;

pub use self::metrics::{
    record_authorization, record_cache_invalidation, record_cache_lookup, record_key_verification,
    CacheLookup,
};
