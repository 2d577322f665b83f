//! Authorization error taxonomy

use thiserror::Error;

use super::result::InvalidReason;
use crate::domain::DomainError;

/// Failure of the composed verify-then-evaluate check
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthorizationError {
    #[error("Malformed key")]
    MalformedKey,

    #[error("Key not found")]
    NotFound,

    #[error("Key is disabled")]
    Disabled,

    #[error("Key has expired")]
    Expired,

    #[error("Key usage exceeded")]
    UsageExceeded,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Key does not belong to the requested workspace")]
    WorkspaceMismatch,

    /// `message` names the unmet permissions and is for server-side logs only
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Internal error: {0}")]
    Internal(DomainError),
}

impl AuthorizationError {
    /// Code exposed to callers
    ///
    /// `NotFound` and `WorkspaceMismatch` share a code so cross-tenant keys
    /// are indistinguishable from missing ones.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedKey => "MALFORMED_KEY",
            Self::NotFound | Self::WorkspaceMismatch => "NOT_FOUND",
            Self::Disabled => "DISABLED",
            Self::Expired => "EXPIRED",
            Self::UsageExceeded => "USAGE_EXCEEDED",
            Self::RateLimited => "RATE_LIMITED",
            Self::PermissionDenied { .. } => "INSUFFICIENT_PERMISSIONS",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message exposed to callers
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedKey => "The key is malformed",
            Self::NotFound | Self::WorkspaceMismatch => "The key was not found",
            Self::Disabled => "The key is disabled",
            Self::Expired => "The key has expired",
            Self::UsageExceeded => "The key has no remaining verifications",
            Self::RateLimited => "The key has exceeded its rate limit",
            Self::PermissionDenied { .. } => "insufficient permissions",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Label used for logs and metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MalformedKey => "malformed_key",
            Self::NotFound => "not_found",
            Self::Disabled => "disabled",
            Self::Expired => "expired",
            Self::UsageExceeded => "usage_exceeded",
            Self::RateLimited => "rate_limited",
            Self::WorkspaceMismatch => "workspace_mismatch",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<InvalidReason> for AuthorizationError {
    fn from(reason: InvalidReason) -> Self {
        match reason {
            InvalidReason::MalformedKey => Self::MalformedKey,
            InvalidReason::NotFound => Self::NotFound,
            InvalidReason::Disabled => Self::Disabled,
            InvalidReason::Expired => Self::Expired,
            InvalidReason::UsageExceeded => Self::UsageExceeded,
            InvalidReason::RateLimited => Self::RateLimited,
            InvalidReason::WorkspaceMismatch => Self::WorkspaceMismatch,
        }
    }
}

impl From<DomainError> for AuthorizationError {
    fn from(err: DomainError) -> Self {
        Self::Internal(err)
    }
}
