//! JSON fixtures for seeding an [`InMemoryKeyStore`]

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::hasher::KeyHasher;
use super::in_memory_store::InMemoryKeyStore;
use crate::domain::key::{KeyId, KeyRecord, RateLimitConfig, RoleId, WorkspaceId};
use crate::domain::permission::PermissionSet;
use crate::domain::DomainError;

/// Number of leading secret characters kept as a key's display `start`
/// when a fixture does not give one
const FIXTURE_START_CHARS: usize = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct RoleFixture {
    pub id: RoleId,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// A key described by its plaintext secret
#[derive(Debug, Clone, Deserialize)]
pub struct KeyFixture {
    pub id: KeyId,
    pub secret: String,
    pub workspace_id: WorkspaceId,
    #[serde(default)]
    pub for_workspace_id: Option<WorkspaceId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: PermissionSet,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

fn default_enabled() -> bool {
    true
}

impl KeyFixture {
    fn into_record(self, hasher: &KeyHasher) -> (KeyRecord, PermissionSet, Vec<RoleId>) {
        let start: String = self.secret.chars().take(FIXTURE_START_CHARS).collect();
        let mut record = KeyRecord::new(
            self.id,
            self.workspace_id,
            hasher.hash(&self.secret),
            start,
        )
        .with_enabled(self.enabled);

        if let Some(workspace_id) = self.for_workspace_id {
            record = record.as_root_key_for(workspace_id);
        }
        if let Some(name) = self.name {
            record = record.with_name(name);
        }
        if let Some(owner_id) = self.owner_id {
            record = record.with_owner_id(owner_id);
        }
        if let Some(remaining) = self.remaining {
            record = record.with_remaining(remaining);
        }
        if let Some(rate_limit) = self.rate_limit {
            record = record.with_rate_limit(rate_limit);
        }
        if let Some(expires_at) = self.expires_at {
            record = record.with_expiration(expires_at);
        }
        if let Some(deleted_at) = self.deleted_at {
            record = record.with_deleted_at(deleted_at);
        }

        (record, self.permissions, self.roles)
    }
}

/// Roles and keys to load into a store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyFixtures {
    #[serde(default)]
    pub roles: Vec<RoleFixture>,
    #[serde(default)]
    pub keys: Vec<KeyFixture>,
}

impl KeyFixtures {
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        serde_json::from_str(json)
            .map_err(|e| DomainError::validation(format!("Invalid key fixtures: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DomainError::configuration(format!(
                "Failed to read fixtures '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Build a store holding these fixtures, hashing secrets with `hasher`
    pub async fn into_store(self, hasher: &KeyHasher) -> Result<InMemoryKeyStore, DomainError> {
        let store = InMemoryKeyStore::new();

        for role in self.roles {
            store.define_role(role.id, role.permissions).await;
        }

        for key in self.keys {
            let (record, permissions, roles) = key.into_record(hasher);
            let key_id = record.id().clone();

            store.insert_key(record).await?;
            store.grant_permissions(&key_id, permissions).await?;
            for role_id in roles {
                store.assign_role(&key_id, role_id).await?;
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::KeyStore;

    const FIXTURES: &str = r#"{
        "roles": [
            { "id": "reader", "permissions": ["api.*.read_api"] }
        ],
        "keys": [
            {
                "id": "key_1",
                "secret": "kg_alpha",
                "workspace_id": "ws_1",
                "permissions": ["api.api_1.update_api"],
                "roles": ["reader"],
                "remaining": 3
            },
            {
                "id": "root_1",
                "secret": "kg_root",
                "workspace_id": "ws_root",
                "for_workspace_id": "ws_1",
                "enabled": false
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_load_fixtures() {
        let hasher = KeyHasher::new();
        let store = KeyFixtures::from_json(FIXTURES)
            .unwrap()
            .into_store(&hasher)
            .await
            .unwrap();

        let key = store
            .find_key_by_hash(&hasher.hash("kg_alpha"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.id().as_str(), "key_1");
        assert_eq!(key.remaining(), Some(3));
        assert_eq!(key.start(), "kg_alph");

        let direct = store.find_permissions_for_key(key.id()).await.unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(store.find_roles_for_key(key.id()).await.unwrap().len(), 1);

        let root = store
            .find_key_by_hash(&hasher.hash("kg_root"))
            .await
            .unwrap()
            .unwrap();
        assert!(root.is_root_key());
        assert!(!root.is_enabled());
        assert_eq!(root.effective_workspace_id().as_str(), "ws_1");
    }

    #[test]
    fn test_invalid_permission_in_fixture() {
        let json = r#"{ "keys": [ {
            "id": "key_1", "secret": "s", "workspace_id": "ws_1",
            "permissions": ["api.read"]
        } ] }"#;

        assert!(KeyFixtures::from_json(json).is_err());
    }

    #[tokio::test]
    async fn test_unknown_role_in_fixture() {
        let json = r#"{ "keys": [ {
            "id": "key_1", "secret": "s", "workspace_id": "ws_1",
            "roles": ["ghost"]
        } ] }"#;

        let result = KeyFixtures::from_json(json)
            .unwrap()
            .into_store(&KeyHasher::new())
            .await;
        assert!(result.is_err());
    }
}
