//! Infrastructure layer - Cache, key store, verification and observability

pub mod auth;
pub mod cache;
pub mod key;
pub mod logging;
pub mod observability;
