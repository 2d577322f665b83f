//! Resolved set of granted permissions

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::matcher::matches;
use super::string::PermissionString;

/// Flattened set of permissions granted to a principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionString>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding only the universal grant
    pub fn universal() -> Self {
        Self::from_iter([PermissionString::wildcard()])
    }

    pub fn insert(&mut self, permission: PermissionString) -> bool {
        self.0.insert(permission)
    }

    /// Add every permission of `other`
    pub fn extend(&mut self, other: impl IntoIterator<Item = PermissionString>) {
        self.0.extend(other);
    }

    /// Union of two sets
    pub fn union(mut self, other: PermissionSet) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn contains(&self, permission: &PermissionString) -> bool {
        self.0.contains(permission)
    }

    /// Whether any granted permission authorizes `required`
    pub fn grants(&self, required: &PermissionString) -> bool {
        self.0.iter().any(|granted| matches(granted, required))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionString> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PermissionString> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionString>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PermissionSet {
    type Item = PermissionString;
    type IntoIter = std::collections::btree_set::IntoIter<PermissionString>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
