//! Domain layer - Core authorization types, contracts and algorithms

pub mod cache;
pub mod error;
pub mod key;
pub mod permission;
pub mod verification;

pub use cache::{Cache, CacheExt, CacheNamespace};
pub use error::DomainError;
pub use key::{KeyId, KeyRecord, KeyStore, RateLimitConfig, RoleId, WorkspaceId};
pub use permission::{
    evaluate, matches, EvaluationResult, PermissionError, PermissionQuery, PermissionSet,
    PermissionString, PermissionTemplate, QueryTemplate,
};
pub use verification::{AuthorizationError, InvalidReason, Principal, VerificationResult};
