//! Data store lookup contract consumed by the verification pipeline

use std::collections::BTreeSet;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::{KeyId, KeyRecord, RoleId};
use crate::domain::permission::PermissionSet;
use crate::domain::DomainError;

/// Read access to keys, roles and permissions
///
/// Every call is fallible and may block on a database round trip; callers
/// reach it through the read-through cache.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Find a key by the hash of its secret, including soft-deleted keys
    async fn find_key_by_hash(&self, hash: &str) -> Result<Option<KeyRecord>, DomainError>;

    /// Permissions attached directly to the key
    async fn find_permissions_for_key(&self, key_id: &KeyId) -> Result<PermissionSet, DomainError>;

    /// Roles the key is a member of
    async fn find_roles_for_key(&self, key_id: &KeyId) -> Result<BTreeSet<RoleId>, DomainError>;

    /// Union of the permissions attached to the given roles
    async fn find_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> Result<PermissionSet, DomainError>;

    /// Atomically consume one verification from a usage-limited key
    ///
    /// Returns the remaining count after consumption, or `None` when the key
    /// had no verifications left (nothing is consumed in that case).
    async fn decrement_remaining(&self, key_id: &KeyId) -> Result<Option<i64>, DomainError>;
}
