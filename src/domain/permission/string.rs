//! Permission string value type

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The wildcard token, valid as a whole permission or as a single segment
pub const WILDCARD: &str = "*";

const SEGMENT_COUNT: usize = 3;

/// Errors raised when a permission string is malformed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Permission cannot be empty")]
    Empty,

    #[error("Permission '{0}' must have exactly 3 dot-separated segments or be '*'")]
    SegmentCount(String),

    #[error("Permission '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("Permission '{0}' contains whitespace")]
    Whitespace(String),
}

/// Validate a raw permission string
///
/// Rules:
/// - Either the universal wildcard `*`
/// - Or exactly three non-empty segments `resource.instanceId.action`
/// - No whitespace anywhere
pub fn validate_permission(value: &str) -> Result<(), PermissionError> {
    if value.is_empty() {
        return Err(PermissionError::Empty);
    }

    if value.chars().any(char::is_whitespace) {
        return Err(PermissionError::Whitespace(value.to_string()));
    }

    if value == WILDCARD {
        return Ok(());
    }

    let segments: Vec<&str> = value.split('.').collect();

    if segments.len() != SEGMENT_COUNT {
        return Err(PermissionError::SegmentCount(value.to_string()));
    }

    if segments.iter().any(|s| s.is_empty()) {
        return Err(PermissionError::EmptySegment(value.to_string()));
    }

    Ok(())
}

/// A well-formed permission: `resource.instanceId.action` or the universal `*`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionString(String);

impl PermissionString {
    /// Parse and validate a permission string
    pub fn new(value: impl Into<String>) -> Result<Self, PermissionError> {
        let value = value.into();
        validate_permission(&value)?;
        Ok(Self(value))
    }

    /// The universal grant `*`
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    /// Build `resource.instance_id.action` from its parts
    pub fn from_parts(
        resource: &str,
        instance_id: &str,
        action: &str,
    ) -> Result<Self, PermissionError> {
        Self::new(format!("{}.{}.{}", resource, instance_id, action))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the universal `*` grant
    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }

    /// Segments of the permission; a single segment for the universal grant
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    pub fn resource(&self) -> Option<&str> {
        self.part(0)
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.part(1)
    }

    pub fn action(&self) -> Option<&str> {
        self.part(2)
    }

    fn part(&self, index: usize) -> Option<&str> {
        if self.is_wildcard() {
            return None;
        }
        self.0.split('.').nth(index)
    }
}

impl TryFrom<String> for PermissionString {
    type Error = PermissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PermissionString {
    type Error = PermissionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for PermissionString {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<PermissionString> for String {
    fn from(permission: PermissionString) -> Self {
        permission.0
    }
}

impl fmt::Display for PermissionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
