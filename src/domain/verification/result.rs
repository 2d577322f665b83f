//! Verification outcomes

use std::fmt;

use super::principal::Principal;

/// Why a key failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    MalformedKey,
    NotFound,
    Disabled,
    Expired,
    UsageExceeded,
    RateLimited,
    WorkspaceMismatch,
}

impl InvalidReason {
    /// Internal code, distinct for every reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedKey => "malformed_key",
            Self::NotFound => "not_found",
            Self::Disabled => "disabled",
            Self::Expired => "expired",
            Self::UsageExceeded => "usage_exceeded",
            Self::RateLimited => "rate_limited",
            Self::WorkspaceMismatch => "workspace_mismatch",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of verifying a secret
///
/// Consumed immediately by the caller and never cached.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    Valid(Principal),
    Invalid(InvalidReason),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Valid(principal) => Some(principal),
            Self::Invalid(_) => None,
        }
    }

    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }

    /// Label used for logs and metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Invalid(reason) => reason.as_str(),
        }
    }

    pub fn into_result(self) -> Result<Principal, InvalidReason> {
        match self {
            Self::Valid(principal) => Ok(principal),
            Self::Invalid(reason) => Err(reason),
        }
    }
}
