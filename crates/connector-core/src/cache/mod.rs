//! Response cache stores
//!
//! The interceptor pipeline caches GET responses through the
//! [`CacheStore`] trait. [`MemoryCacheStore`] keeps entries in process.

mod memory;
mod traits;

pub use memory::{CachedResponse, MemoryCacheStore};
pub use traits::CacheStore;
