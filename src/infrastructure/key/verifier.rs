//! Key verification pipeline
//!
//! Turns a presented secret into a [`Principal`] or a typed rejection:
//! format check, hash lookup, state checks, workspace binding and permission
//! resolution, short-circuiting on the first failure. Only a request that
//! passes all of them (and its permission query, when authorizing) is
//! counted against the key's rate limit and usage.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::domain::cache::CacheNamespace;
use crate::domain::key::{KeyId, KeyRecord, KeyStore, RoleId, WorkspaceId};
use crate::domain::permission::{PermissionQuery, PermissionSet};
use crate::domain::verification::{
    AuthorizationError, InvalidReason, Principal, VerificationResult,
};
use crate::domain::DomainError;
use crate::infrastructure::cache::ReadThroughCache;
use crate::infrastructure::observability::record_key_verification;

use super::hasher::KeyHasher;
use super::rate_limiter::RateLimiter;

/// A key that passed every check but has not been charged yet
struct PendingVerification {
    record: KeyRecord,
    principal: Principal,
}

/// Verifies secrets against a [`KeyStore`] through the shared cache
#[derive(Debug)]
pub struct KeyVerifier<S>
where
    S: KeyStore + 'static,
{
    store: Arc<S>,
    cache: Arc<ReadThroughCache>,
    rate_limiter: Arc<RateLimiter>,
    hasher: KeyHasher,
    root_key_wildcard: bool,
}

impl<S: KeyStore + 'static> KeyVerifier<S> {
    pub fn new(store: Arc<S>, cache: Arc<ReadThroughCache>) -> Self {
        Self {
            store,
            cache,
            rate_limiter: Arc::new(RateLimiter::new()),
            hasher: KeyHasher::new(),
            root_key_wildcard: true,
        }
    }

    pub fn with_hasher(mut self, hasher: KeyHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Whether root keys implicitly hold the universal grant `*`
    pub fn with_root_key_wildcard(mut self, enabled: bool) -> Self {
        self.root_key_wildcard = enabled;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ReadThroughCache> {
        &self.cache
    }

    pub fn hasher(&self) -> &KeyHasher {
        &self.hasher
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Verify `secret`, optionally binding it to `workspace_id`
    ///
    /// `Err` means the store could not be read and is never a rejection.
    pub async fn verify(
        &self,
        secret: &str,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<VerificationResult, DomainError> {
        let result = match self.resolve(secret, workspace_id).await {
            Ok(Ok(pending)) => self.admit(pending).await,
            Ok(Err(reason)) => Ok(VerificationResult::Invalid(reason)),
            Err(e) => Err(e),
        };

        match &result {
            Ok(verification) => Self::observe(verification.outcome()),
            Err(e) => Self::observe_failure(e),
        }
        result
    }

    /// Verify `secret` and require its permissions to satisfy `query`
    ///
    /// The key is only charged (rate limit hit, usage) once the query holds.
    pub async fn authorize(
        &self,
        secret: &str,
        query: &PermissionQuery,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<Principal, AuthorizationError> {
        let pending = match self.resolve(secret, workspace_id).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(reason)) => {
                Self::observe(reason.as_str());
                return Err(reason.into());
            }
            Err(e) => {
                Self::observe_failure(&e);
                return Err(AuthorizationError::Internal(e));
            }
        };

        let evaluation = pending.principal.evaluate(query);
        if !evaluation.valid {
            let message = evaluation.message;
            info!(
                key_id = %pending.principal.key_id,
                workspace_id = %pending.principal.workspace_id,
                detail = %message,
                "Permission denied"
            );
            Self::observe("valid");
            return Err(AuthorizationError::PermissionDenied { message });
        }

        match self.admit(pending).await {
            Ok(verification) => {
                Self::observe(verification.outcome());
                Ok(verification.into_result()?)
            }
            Err(e) => {
                Self::observe_failure(&e);
                Err(AuthorizationError::Internal(e))
            }
        }
    }

    fn observe(outcome: &'static str) {
        debug!(outcome, "Key verification finished");
        record_key_verification(outcome);
    }

    fn observe_failure(e: &DomainError) {
        error!(error = %e, "Key verification failed on backing store");
        record_key_verification("internal");
    }

    /// Every check that can reject the key, without charging it
    async fn resolve(
        &self,
        secret: &str,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<Result<PendingVerification, InvalidReason>, DomainError> {
        if let Err(e) = self.hasher.check_format(secret) {
            debug!(reason = %e, "Rejecting malformed key");
            return Ok(Err(InvalidReason::MalformedKey));
        }

        let hash = self.hasher.hash(secret);
        let Some(record) = self.find_key(hash).await? else {
            return Ok(Err(InvalidReason::NotFound));
        };
        debug!(key_id = %record.id(), "Resolved key record");

        if let Some(reason) = self.check_state(&record).await {
            return Ok(Err(reason));
        }

        if let Some(expected) = workspace_id {
            if record.effective_workspace_id() != expected {
                debug!(
                    key_id = %record.id(),
                    expected = %expected,
                    actual = %record.effective_workspace_id(),
                    "Key bound to another workspace"
                );
                return Ok(Err(InvalidReason::WorkspaceMismatch));
            }
        }

        let mut granted_permissions = self.resolve_permissions(record.id()).await?;
        if record.is_root_key() && self.root_key_wildcard {
            granted_permissions = granted_permissions.union(PermissionSet::universal());
        }

        let principal = Principal {
            key_id: record.id().clone(),
            workspace_id: record.effective_workspace_id().clone(),
            is_root_key: record.is_root_key(),
            granted_permissions,
            owner_id: record.owner_id().map(str::to_string),
            remaining: record.remaining(),
        };

        Ok(Ok(PendingVerification { record, principal }))
    }

    /// Count the request against the key's rate limit and usage
    async fn admit(&self, pending: PendingVerification) -> Result<VerificationResult, DomainError> {
        let PendingVerification {
            record,
            mut principal,
        } = pending;

        if let Some(rate_limit) = record.rate_limit() {
            let result = self
                .rate_limiter
                .check_and_record(record.id().as_str(), rate_limit)
                .await;

            // Lost a race for the last slot since `check_state`
            if !result.allowed {
                return Ok(VerificationResult::Invalid(InvalidReason::RateLimited));
            }
        }

        match self.consume_usage(&record).await? {
            Ok(remaining) => principal.remaining = remaining,
            Err(reason) => return Ok(VerificationResult::Invalid(reason)),
        }

        Ok(VerificationResult::Valid(principal))
    }

    async fn find_key(&self, hash: String) -> Result<Option<KeyRecord>, DomainError> {
        let store = Arc::clone(&self.store);
        let id = hash.clone();

        self.cache
            .get_or_compute(CacheNamespace::KeyByHash, &id, move || async move {
                store.find_key_by_hash(&hash).await
            })
            .await
    }

    /// First failing state check, in precedence order
    async fn check_state(&self, record: &KeyRecord) -> Option<InvalidReason> {
        if record.is_deleted() {
            return Some(InvalidReason::NotFound);
        }

        if !record.is_enabled() {
            return Some(InvalidReason::Disabled);
        }

        if record.is_expired_at(Utc::now()) {
            return Some(InvalidReason::Expired);
        }

        if record.is_usage_exhausted() {
            return Some(InvalidReason::UsageExceeded);
        }

        if let Some(rate_limit) = record.rate_limit() {
            let result = self
                .rate_limiter
                .check(record.id().as_str(), rate_limit)
                .await;

            if !result.allowed {
                debug!(
                    key_id = %record.id(),
                    limit = result.limit,
                    reset_in_ms = result.reset_in.as_millis() as u64,
                    "Key rate limited"
                );
                return Some(InvalidReason::RateLimited);
            }
        }

        None
    }

    /// Direct grants plus role grants, cached per key
    async fn resolve_permissions(&self, key_id: &KeyId) -> Result<PermissionSet, DomainError> {
        let store = Arc::clone(&self.store);
        let owned_id = key_id.clone();

        let permissions = self
            .cache
            .get_or_compute(
                CacheNamespace::PermissionsByKeyId,
                key_id.as_str(),
                move || async move {
                    let mut granted = store.find_permissions_for_key(&owned_id).await?;

                    let roles: Vec<RoleId> = store
                        .find_roles_for_key(&owned_id)
                        .await?
                        .into_iter()
                        .collect();
                    if !roles.is_empty() {
                        granted.extend(store.find_permissions_for_roles(&roles).await?);
                    }

                    Ok(Some(granted))
                },
            )
            .await?;

        Ok(permissions.unwrap_or_default())
    }

    /// Consume one verification from a usage-limited key
    async fn consume_usage(
        &self,
        record: &KeyRecord,
    ) -> Result<Result<Option<i64>, InvalidReason>, DomainError> {
        if !record.is_usage_limited() {
            return Ok(Ok(None));
        }

        let remaining = self.store.decrement_remaining(record.id()).await?;

        // The cached record carries the old counter
        if let Err(e) = self
            .cache
            .invalidate(CacheNamespace::KeyByHash, record.hash())
            .await
        {
            error!(key_id = %record.id(), error = %e, "Failed to invalidate key after usage");
        }

        match remaining {
            Some(remaining) => Ok(Ok(Some(remaining))),
            None => Ok(Err(InvalidReason::UsageExceeded)),
        }
    }
}
