//! Authorization infrastructure
//!
//! The dependency container route handlers use to verify keys, evaluate
//! permission queries and invalidate cached authorization state.

mod context;

pub use context::AuthContext;
