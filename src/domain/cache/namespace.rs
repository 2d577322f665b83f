//! Cache namespaces and key layout

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

const KEY_SEPARATOR: char = ':';

/// Entity kind a cached value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheNamespace {
    ApiById,
    /// Key records addressed by key id. The verifier never reads it
    KeyById,
    /// Key records as the verifier looks them up, keyed by secret hash
    ///
    /// A write to a key must remove `KeyByHash` under the record's hash, not
    /// only `KeyById`. `AuthContext::invalidate_key` clears both.
    KeyByHash,
    KeysByOwnerId,
    PermissionsByKeyId,
    WorkspaceById,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 6] = [
        Self::ApiById,
        Self::KeyById,
        Self::KeyByHash,
        Self::KeysByOwnerId,
        Self::PermissionsByKeyId,
        Self::WorkspaceById,
    ];

    /// Name used in backend keys and configuration; parsing ignores case
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiById => "apiById",
            Self::KeyById => "keyById",
            Self::KeyByHash => "keyByHash",
            Self::KeysByOwnerId => "keysByOwnerId",
            Self::PermissionsByKeyId => "permissionsByKeyId",
            Self::WorkspaceById => "workspaceById",
        }
    }

    /// Backend key for `id` within this namespace
    pub fn key(&self, id: &str) -> String {
        format!("{}{}{}", self.as_str(), KEY_SEPARATOR, id)
    }

    /// Leading part shared by every backend key of this namespace
    pub fn prefix(&self) -> String {
        format!("{}{}", self.as_str(), KEY_SEPARATOR)
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CacheNamespace {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("Unknown cache namespace '{}'", s)))
    }
}
