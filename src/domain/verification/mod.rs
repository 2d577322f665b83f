//! Verification domain - principals, outcomes and authorization errors

mod error;
mod principal;
mod result;

pub use error::AuthorizationError;
pub use principal::Principal;
pub use result::{InvalidReason, VerificationResult};
