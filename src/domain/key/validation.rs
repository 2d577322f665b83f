//! Identifier validation utilities

use thiserror::Error;

/// Errors that can occur while validating an identifier
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentifierValidationError {
    #[error("{0} ID cannot be empty")]
    Empty(&'static str),

    #[error("{0} ID exceeds maximum length of {1} characters")]
    TooLong(&'static str, usize),

    #[error("{0} ID must start with a letter or number")]
    InvalidStart(&'static str),

    #[error("{0} ID contains invalid character: '{1}'. Only alphanumeric characters, underscores and hyphens are allowed")]
    InvalidCharacter(&'static str, char),
}

pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier such as `key_3Zx9`, `ws_01` or `role-admin`
///
/// Rules:
/// - Cannot be empty
/// - Maximum 64 characters
/// - Only alphanumeric characters, underscores and hyphens
/// - Must start with an alphanumeric character
pub fn validate_identifier(kind: &'static str, id: &str) -> Result<(), IdentifierValidationError> {
    let Some(first) = id.chars().next() else {
        return Err(IdentifierValidationError::Empty(kind));
    };

    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierValidationError::TooLong(kind, MAX_IDENTIFIER_LENGTH));
    }

    if !first.is_ascii_alphanumeric() {
        return Err(IdentifierValidationError::InvalidStart(kind));
    }

    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(IdentifierValidationError::InvalidCharacter(kind, c));
    }

    Ok(())
}
