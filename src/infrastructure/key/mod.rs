//! Key infrastructure - hashing, rate limiting, storage and verification

mod fixtures;
mod hasher;
mod in_memory_store;
mod rate_limiter;
mod verifier;

pub use fixtures::{KeyFixture, KeyFixtures, RoleFixture};
pub use hasher::{GeneratedKey, KeyFormatError, KeyHasher, DEFAULT_MAX_KEY_LENGTH};
pub use in_memory_store::{InMemoryKeyStore, StoreCall};
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use verifier::KeyVerifier;
