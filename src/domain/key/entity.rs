//! Key record entity and identifier types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_identifier, IdentifierValidationError};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier after validation
            pub fn new(id: impl Into<String>) -> Result<Self, IdentifierValidationError> {
                let id = id.into();
                validate_identifier($kind, &id)?;
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identifier!(
    /// Key identifier, e.g. `key_3Zx9`
    KeyId,
    "Key"
);

identifier!(
    /// Workspace (tenant) identifier
    WorkspaceId,
    "Workspace"
);

identifier!(
    /// Role identifier
    RoleId,
    "Role"
);

/// Sliding-window request limit attached to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Stored key record as read from the data store
///
/// Only the hash of the secret is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    id: KeyId,
    /// Workspace that owns the key
    workspace_id: WorkspaceId,
    /// For root keys, the workspace the key administers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    for_workspace_id: Option<WorkspaceId>,
    /// One-way hash of the secret
    hash: String,
    /// First characters of the secret, for display
    start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_id: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    /// Remaining verifications for usage-limited keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    /// Soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl KeyRecord {
    /// Create a new, enabled, unlimited key record
    pub fn new(
        id: KeyId,
        workspace_id: WorkspaceId,
        hash: impl Into<String>,
        start: impl Into<String>,
    ) -> Self {
        Self {
            id,
            workspace_id,
            for_workspace_id: None,
            hash: hash.into(),
            start: start.into(),
            name: None,
            owner_id: None,
            enabled: true,
            remaining: None,
            rate_limit: None,
            expires_at: None,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    /// Mark as a root key administering `workspace_id`
    pub fn as_root_key_for(mut self, workspace_id: WorkspaceId) -> Self {
        self.for_workspace_id = Some(workspace_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_remaining(mut self, remaining: i64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_deleted_at(mut self, deleted_at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(deleted_at);
        self
    }

    // Getters

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    pub fn for_workspace_id(&self) -> Option<&WorkspaceId> {
        self.for_workspace_id.as_ref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn remaining(&self) -> Option<i64> {
        self.remaining
    }

    pub fn rate_limit(&self) -> Option<&RateLimitConfig> {
        self.rate_limit.as_ref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // Status checks

    pub fn is_root_key(&self) -> bool {
        self.for_workspace_id.is_some()
    }

    /// Workspace the key acts on: the administered workspace for root keys
    pub fn effective_workspace_id(&self) -> &WorkspaceId {
        self.for_workspace_id.as_ref().unwrap_or(&self.workspace_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_usage_limited(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn is_usage_exhausted(&self) -> bool {
        self.remaining.is_some_and(|remaining| remaining <= 0)
    }

    // Mutators

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_remaining(&mut self, remaining: Option<i64>) {
        self.remaining = remaining;
    }

    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
    }
}
