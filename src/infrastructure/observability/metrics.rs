//! Metrics recording
//!
//! Counters go through the `metrics` facade. Nothing is exported until the
//! host process installs a recorder.

use metrics::counter;

use crate::domain::CacheNamespace;

/// How a cache lookup was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    /// Joined a computation already in flight
    Coalesced,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
        }
    }
}

/// Record a read-through cache lookup
pub fn record_cache_lookup(namespace: CacheNamespace, lookup: CacheLookup) {
    let labels = [
        ("namespace", namespace.as_str().to_string()),
        ("result", lookup.as_str().to_string()),
    ];

    counter!("keygate_cache_requests_total", &labels).increment(1);
}

/// Record an explicit invalidation
pub fn record_cache_invalidation(namespace: CacheNamespace) {
    counter!("keygate_cache_invalidations_total", "namespace" => namespace.as_str()).increment(1);
}

/// Record the outcome of a key verification
pub fn record_key_verification(outcome: &'static str) {
    counter!("keygate_key_verifications_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of a verify-then-evaluate check
pub fn record_authorization(outcome: &'static str) {
    counter!("keygate_authorizations_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_labels() {
        assert_eq!(CacheLookup::Hit.as_str(), "hit");
        assert_eq!(CacheLookup::Miss.as_str(), "miss");
        assert_eq!(CacheLookup::Coalesced.as_str(), "coalesced");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(CacheNamespace::KeyByHash, CacheLookup::Miss);
        record_cache_invalidation(CacheNamespace::KeyByHash);
        record_key_verification("valid");
        record_authorization("permission_denied");
    }
}
