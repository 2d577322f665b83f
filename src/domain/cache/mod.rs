//! Cache domain - backend abstraction and namespace layout

mod namespace;
mod repository;

pub use namespace::CacheNamespace;
pub use repository::{Cache, CacheExt};
pub(crate) use repository::{decode, encode};

#[cfg(test)]
pub use repository::mock::MockCache;
