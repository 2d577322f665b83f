//! Authenticated caller for a single request

use crate::domain::key::{KeyId, WorkspaceId};
use crate::domain::permission::{evaluate, EvaluationResult, PermissionQuery, PermissionSet};

/// Resolved identity and permissions of the caller
///
/// Built fresh by every verification and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub key_id: KeyId,
    /// Workspace the key acts on
    pub workspace_id: WorkspaceId,
    pub is_root_key: bool,
    /// Direct grants plus role-inherited grants; root keys also hold `*`
    pub granted_permissions: PermissionSet,
    pub owner_id: Option<String>,
    /// Verifications left after this one, for usage-limited keys
    pub remaining: Option<i64>,
}

impl Principal {
    /// Evaluate `query` against this principal's grants
    pub fn evaluate(&self, query: &PermissionQuery) -> EvaluationResult {
        evaluate(query, &self.granted_permissions)
    }
}
