//! Read-through caching for expensive content.

use std::time::Duration;

use tracing::{debug, warn};

use super::KvStore;

/// Serve `key` from `store`, computing and storing it on a miss.
///
/// Returns the bytes and whether they came from the cache. With `bypass` the
/// cache is neither read nor written. Cache errors count as a miss on read
/// and are ignored on write, so the caller always gets content.
///
/// Concurrent misses for the same key may all compute and write.
pub fn get_or_compute<S, F>(
    store: &S,
    key: &str,
    ttl: Duration,
    bypass: bool,
    compute: F,
) -> (Vec<u8>, bool)
where
    S: KvStore + ?Sized,
    F: FnOnce() -> Vec<u8>,
{
    if bypass {
        debug!(key, "cache bypassed");
        return (compute(), false);
    }

    match store.get(key) {
        Ok(Some(bytes)) => {
            debug!(key, "cache hit");
            return (bytes, true);
        }
        Ok(None) => debug!(key, "cache miss"),
        Err(e) => warn!(key, error = %e, "cache read failed, computing"),
    }

    let bytes = compute();
    if let Err(e) = store.set(key, &bytes, Some(ttl)) {
        warn!(key, error = %e, "cache write failed");
    }
    (bytes, false)
}
