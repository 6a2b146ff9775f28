//! Redis-backed KV store (`GET` / `SET EX` / `INCR`).

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::{CacheError, KvStore};

/// Bounds how long a request waits on an unreachable Redis before falling back.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RedisKvStore {
    client: Arc<redis::Client>,
}

impl RedisKvStore {
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn connection(&self) -> Result<redis::Connection, CacheError> {
        self.client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

impl KvStore for RedisKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection()?;
        redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(|e| CacheError::Unavailable(format!("GET failed: {e}")))
    }

    #[instrument(skip(self, value), fields(bytes = value.len()), err)]
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        cmd.query::<()>(&mut conn)
            .map_err(|e| CacheError::Unavailable(format!("SET failed: {e}")))
    }

    fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.connection()?;
        redis::cmd("INCR").arg(key).query(&mut conn).map_err(|e| {
            if e.kind() == redis::ErrorKind::ResponseError {
                CacheError::NotAnInteger(key.to_string())
            } else {
                CacheError::Unavailable(format!("INCR failed: {e}"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::get_or_compute;

    #[test]
    fn unreachable_redis_is_a_fast_forced_miss() {
        // Nothing listens on port 1, so the connect attempt fails instead of blocking.
        let store = RedisKvStore::new("redis://127.0.0.1:1").unwrap();
        let started = Instant::now();

        assert!(matches!(store.get("svg:complex:v1"), Err(CacheError::Unavailable(_))));
        let (value, hit) = get_or_compute(&store, "svg:complex:v1", Duration::from_secs(60), false, || {
            b"<svg/>".to_vec()
        });

        assert_eq!(value, b"<svg/>");
        assert!(!hit);
        assert!(started.elapsed() <= CONNECT_TIMEOUT * 2);
    }
}
