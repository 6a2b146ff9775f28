//! Key-value cache collaborators and the get-or-compute read path.

use std::sync::Arc;
use std::time::Duration;

mod compute;
mod in_memory;
#[cfg(feature = "redis")]
mod redis_kv;

pub use compute::get_or_compute;
pub use in_memory::InMemoryKvStore;
#[cfg(feature = "redis")]
pub use redis_kv::RedisKvStore;

/// Cache error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The backing store could not be reached or rejected the command.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("value under `{0}` is not an integer")]
    NotAnInteger(String),
}

/// Byte-valued key-value store with optional expiry.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Overwrite `key`. `None` keeps the value until it is overwritten.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Atomically add one to the integer under `key` (missing counts as 0).
    fn incr(&self, key: &str) -> Result<i64, CacheError>;
}

impl<S> KvStore for Arc<S>
where
    S: KvStore + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        (**self).set(key, value, ttl)
    }

    fn incr(&self, key: &str) -> Result<i64, CacheError> {
        (**self).incr(key)
    }
}
