//! Key domain
//!
//! Key records, identifiers, and the data store contract used to resolve
//! a secret into a key and its permissions.

mod entity;
mod repository;
mod validation;

pub use entity::{KeyId, KeyRecord, RateLimitConfig, RoleId, WorkspaceId};
pub use repository::KeyStore;
pub use validation::{validate_identifier, IdentifierValidationError, MAX_IDENTIFIER_LENGTH};

#[cfg(test)]
pub use repository::MockKeyStore;

impl From<IdentifierValidationError> for crate::domain::DomainError {
    fn from(err: IdentifierValidationError) -> Self {
        Self::validation(err.to_string())
    }
}
