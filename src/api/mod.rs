//! API layer - HTTP-facing authentication helpers and error responses

pub mod middleware;
pub mod types;

pub use middleware::{root_key_auth, VerifiedKey};
pub use types::ApiError;
