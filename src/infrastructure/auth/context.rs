//! Authorization context
//!
//! The one place route handlers reach the key store, the shared cache and
//! the verifier. Built once per process and passed around explicitly.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::cache::CacheNamespace;
use crate::domain::key::{KeyRecord, KeyStore, WorkspaceId};
use crate::domain::permission::PermissionQuery;
use crate::domain::verification::{AuthorizationError, Principal, VerificationResult};
use crate::domain::DomainError;
use crate::infrastructure::cache::ReadThroughCache;
use crate::infrastructure::key::KeyVerifier;
use crate::infrastructure::observability::record_authorization;

/// Dependency container for verification and authorization
#[derive(Debug)]
pub struct AuthContext<S>
where
    S: KeyStore + 'static,
{
    verifier: KeyVerifier<S>,
}

impl<S: KeyStore + 'static> AuthContext<S> {
    pub fn new(verifier: KeyVerifier<S>) -> Self {
        Self { verifier }
    }

    pub fn store(&self) -> &Arc<S> {
        self.verifier.store()
    }

    pub fn cache(&self) -> &Arc<ReadThroughCache> {
        self.verifier.cache()
    }

    pub fn verifier(&self) -> &KeyVerifier<S> {
        &self.verifier
    }

    pub async fn verify(
        &self,
        secret: &str,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<VerificationResult, DomainError> {
        self.verifier.verify(secret, workspace_id).await
    }

    /// Verify `secret` and require its permissions to satisfy `query`
    ///
    /// The denial detail is logged and kept out of the public message. A
    /// denied request does not count against the key's usage or rate limit.
    pub async fn root_key_auth(
        &self,
        secret: &str,
        query: &PermissionQuery,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<Principal, AuthorizationError> {
        let result = self.authorize(secret, query, workspace_id).await;

        let outcome = match &result {
            Ok(_) => "authorized",
            Err(e) => e.outcome(),
        };
        record_authorization(outcome);

        result
    }

    async fn authorize(
        &self,
        secret: &str,
        query: &PermissionQuery,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<Principal, AuthorizationError> {
        let principal = self.verifier.authorize(secret, query, workspace_id).await?;

        debug!(key_id = %principal.key_id, query = %query, "Authorized");
        Ok(principal)
    }

    /// Drop a cached entry after a committed write
    pub async fn invalidate(&self, namespace: CacheNamespace, id: &str) -> Result<(), DomainError> {
        self.cache().invalidate(namespace, id).await
    }

    pub async fn invalidate_namespace(
        &self,
        namespace: CacheNamespace,
    ) -> Result<usize, DomainError> {
        self.cache().invalidate_namespace(namespace).await
    }

    /// Drop everything cached about a key and reset its rate limit window
    ///
    /// Every step is attempted even if an earlier one fails. The first
    /// failure is returned.
    pub async fn invalidate_key(&self, record: &KeyRecord) -> Result<(), DomainError> {
        let key_id = record.id().as_str();

        let steps = [
            (CacheNamespace::KeyByHash, record.hash()),
            (CacheNamespace::KeyById, key_id),
            (CacheNamespace::PermissionsByKeyId, key_id),
        ];

        let mut first_error = None;
        for (namespace, id) in steps {
            if let Err(e) = self.invalidate(namespace, id).await {
                warn!(key_id, namespace = %namespace, error = %e, "Failed to invalidate key entry");
                first_error.get_or_insert(e);
            }
        }
        self.verifier.rate_limiter().reset(key_id).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
