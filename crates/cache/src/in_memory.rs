//! In-memory KV store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::{CacheError, KvStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local KV store with per-key expiry.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Unavailable("kv store lock poisoned".to_string())
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.write().map_err(poisoned)?.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let now = Instant::now();

        let (current, expires_at) = match entries.get(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let n = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
                (n, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| CacheError::NotAnInteger(key.to_string()))?;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn set_then_get() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", b"v1", None).unwrap();
        store.set("k", b"v2", None).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"v2"[..]));
    }

    #[test]
    fn entries_expire() {
        let store = InMemoryKvStore::new();
        store.set("k", b"v", Some(Duration::from_millis(20))).unwrap();
        assert!(store.get("k").unwrap().is_some());

        thread::sleep(Duration::from_millis(40));
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn incr_starts_at_one_and_rejects_text() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.incr("counter").unwrap(), 1);
        assert_eq!(store.incr("counter").unwrap(), 2);
        assert_eq!(store.get("counter").unwrap().as_deref(), Some(&b"2"[..]));

        store.set("text", b"hello", None).unwrap();
        assert_eq!(
            store.incr("text").unwrap_err(),
            CacheError::NotAnInteger("text".to_string())
        );
    }

    #[test]
    fn concurrent_incr_loses_no_updates() {
        let store = Arc::new(InMemoryKvStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.incr("counter").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.incr("counter").unwrap(), 801);
    }
}
