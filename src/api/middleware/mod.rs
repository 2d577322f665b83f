//! API middleware components

pub mod auth;

pub use auth::{extract_api_key_from_headers, root_key_auth, VerifiedKey};
