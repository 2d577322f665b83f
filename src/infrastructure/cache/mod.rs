//! Cache infrastructure - backends and the read-through layer

mod in_memory;
mod read_through;

pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use read_through::{ReadThroughCache, ReadThroughCacheConfig};
