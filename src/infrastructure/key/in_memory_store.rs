//! In-memory key store

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::key::{KeyId, KeyRecord, KeyStore, RoleId};
use crate::domain::permission::PermissionSet;
use crate::domain::DomainError;

/// Store operation, for call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
    FindKeyByHash,
    FindPermissionsForKey,
    FindRolesForKey,
    FindPermissionsForRoles,
    DecrementRemaining,
}

impl StoreCall {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        match self {
            Self::FindKeyByHash => 0,
            Self::FindPermissionsForKey => 1,
            Self::FindRolesForKey => 2,
            Self::FindPermissionsForRoles => 3,
            Self::DecrementRemaining => 4,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    keys: HashMap<String, KeyRecord>,
    /// hash -> key id
    hash_index: HashMap<String, String>,
    key_permissions: HashMap<String, PermissionSet>,
    key_roles: HashMap<String, BTreeSet<RoleId>>,
    role_permissions: HashMap<String, PermissionSet>,
}

/// Reference [`KeyStore`] kept entirely in memory
///
/// Counts every lookup so callers can observe how often the cache falls
/// through, and can be switched into a failing mode to exercise outage
/// handling.
#[derive(Debug)]
pub struct InMemoryKeyStore {
    state: Arc<RwLock<StoreState>>,
    calls: [AtomicUsize; StoreCall::COUNT],
    failing: AtomicBool,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            calls: Default::default(),
            failing: AtomicBool::new(false),
        }
    }

    /// Add a key; ids and hashes must be unique
    pub async fn insert_key(&self, record: KeyRecord) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let id = record.id().as_str().to_string();

        if state.keys.contains_key(&id) {
            return Err(DomainError::validation(format!(
                "Key with ID '{}' already exists",
                id
            )));
        }

        if state.hash_index.contains_key(record.hash()) {
            return Err(DomainError::validation(format!(
                "Key with hash of '{}' already exists",
                record.start()
            )));
        }

        state.hash_index.insert(record.hash().to_string(), id.clone());
        state.keys.insert(id, record);
        Ok(())
    }

    /// Attach permissions directly to a key
    pub async fn grant_permissions(
        &self,
        key_id: &KeyId,
        permissions: PermissionSet,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        Self::ensure_key(&state, key_id)?;

        state
            .key_permissions
            .entry(key_id.as_str().to_string())
            .or_default()
            .extend(permissions);
        Ok(())
    }

    /// Replace the permissions attached directly to a key
    pub async fn set_permissions(
        &self,
        key_id: &KeyId,
        permissions: PermissionSet,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        Self::ensure_key(&state, key_id)?;

        state
            .key_permissions
            .insert(key_id.as_str().to_string(), permissions);
        Ok(())
    }

    /// Create or replace a role's permissions
    pub async fn define_role(&self, role_id: RoleId, permissions: PermissionSet) {
        let mut state = self.state.write().await;
        state
            .role_permissions
            .insert(role_id.as_str().to_string(), permissions);
    }

    pub async fn assign_role(&self, key_id: &KeyId, role_id: RoleId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        Self::ensure_key(&state, key_id)?;

        if !state.role_permissions.contains_key(role_id.as_str()) {
            return Err(DomainError::not_found(format!(
                "Role '{}' not found",
                role_id
            )));
        }

        state
            .key_roles
            .entry(key_id.as_str().to_string())
            .or_default()
            .insert(role_id);
        Ok(())
    }

    /// Mark a key deleted; the record stays readable by hash
    pub async fn soft_delete_key(&self, key_id: &KeyId) -> Result<bool, DomainError> {
        self.modify_key(key_id, |record| {
            if record.is_deleted() {
                false
            } else {
                record.soft_delete();
                true
            }
        })
        .await
    }

    pub async fn set_enabled(&self, key_id: &KeyId, enabled: bool) -> Result<(), DomainError> {
        self.modify_key(key_id, |record| record.set_enabled(enabled))
            .await
    }

    pub async fn set_remaining(
        &self,
        key_id: &KeyId,
        remaining: Option<i64>,
    ) -> Result<(), DomainError> {
        self.modify_key(key_id, |record| record.set_remaining(remaining))
            .await
    }

    pub async fn get_key(&self, key_id: &KeyId) -> Option<KeyRecord> {
        self.state.read().await.keys.get(key_id.as_str()).cloned()
    }

    /// Make every lookup fail with a storage error until switched off
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self, call: StoreCall) -> usize {
        self.calls[call.index()].load(Ordering::SeqCst)
    }

    pub fn reset_call_counts(&self) {
        for counter in &self.calls {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn enter(&self, call: StoreCall) -> Result<(), DomainError> {
        self.calls[call.index()].fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::storage("Key store unavailable"));
        }
        Ok(())
    }

    fn ensure_key(state: &StoreState, key_id: &KeyId) -> Result<(), DomainError> {
        if state.keys.contains_key(key_id.as_str()) {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("Key '{}' not found", key_id)))
        }
    }

    async fn modify_key<T>(
        &self,
        key_id: &KeyId,
        f: impl FnOnce(&mut KeyRecord) -> T,
    ) -> Result<T, DomainError> {
        let mut state = self.state.write().await;
        let record = state
            .keys
            .get_mut(key_id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("Key '{}' not found", key_id)))?;

        Ok(f(record))
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn find_key_by_hash(&self, hash: &str) -> Result<Option<KeyRecord>, DomainError> {
        self.enter(StoreCall::FindKeyByHash)?;
        let state = self.state.read().await;

        Ok(state
            .hash_index
            .get(hash)
            .and_then(|id| state.keys.get(id))
            .cloned())
    }

    async fn find_permissions_for_key(&self, key_id: &KeyId) -> Result<PermissionSet, DomainError> {
        self.enter(StoreCall::FindPermissionsForKey)?;
        let state = self.state.read().await;

        Ok(state
            .key_permissions
            .get(key_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn find_roles_for_key(&self, key_id: &KeyId) -> Result<BTreeSet<RoleId>, DomainError> {
        self.enter(StoreCall::FindRolesForKey)?;
        let state = self.state.read().await;

        Ok(state
            .key_roles
            .get(key_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn find_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> Result<PermissionSet, DomainError> {
        self.enter(StoreCall::FindPermissionsForRoles)?;
        let state = self.state.read().await;

        let mut permissions = PermissionSet::new();
        for role_id in role_ids {
            if let Some(granted) = state.role_permissions.get(role_id.as_str()) {
                permissions.extend(granted.iter().cloned());
            }
        }
        Ok(permissions)
    }

    async fn decrement_remaining(&self, key_id: &KeyId) -> Result<Option<i64>, DomainError> {
        self.enter(StoreCall::DecrementRemaining)?;
        let mut state = self.state.write().await;

        let record = state
            .keys
            .get_mut(key_id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("Key '{}' not found", key_id)))?;

        match record.remaining() {
            None => Err(DomainError::validation(format!(
                "Key '{}' is not usage-limited",
                key_id
            ))),
            Some(remaining) if remaining <= 0 => Ok(None),
            Some(remaining) => {
                record.set_remaining(Some(remaining - 1));
                debug!(key_id = %key_id, remaining = remaining - 1, "Consumed key usage");
                Ok(Some(remaining - 1))
            }
        }
    }
}
