//! Redis-backed dispatch store.
//!
//! - **Records**: `relay:dispatch:<correlation_id>` holding JSON, `EX <ttl>`
//! - **Dead letters**: `relay:dead_letters` list, newest first, capped
//!
//! Updates run as `WATCH`/`MULTI`/`EXEC` transactions and are retried when
//! another writer touched the record in between.

use std::sync::Arc;
use std::time::Duration;

use relay_core::CorrelationId;

use super::{DispatchRecord, DispatchStore, StoreError};
use crate::types::DeadLetterEntry;

const RECORD_KEY_PREFIX: &str = "relay:dispatch:";
const DEAD_LETTER_KEY: &str = "relay:dead_letters";
const DEAD_LETTER_CAPACITY: isize = 1000;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RedisDispatchStore {
    client: Arc<redis::Client>,
    ttl: Duration,
}

impl RedisDispatchStore {
    pub fn new(redis_url: impl AsRef<str>, ttl: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Storage(format!("redis connection error: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            ttl,
        })
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        self.client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(|e| StoreError::Storage(format!("redis connection error: {e}")))
    }

    fn key(correlation_id: CorrelationId) -> String {
        format!("{RECORD_KEY_PREFIX}{correlation_id}")
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }

    /// `SET key value EX ttl NX`. Returns whether the write happened.
    fn write_new(&self, record: &DispatchRecord) -> Result<bool, StoreError> {
        let payload =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut conn = self.connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(record.correlation_id))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs())
            .arg("NX")
            .query(&mut conn)
            .map_err(|e| StoreError::Storage(format!("SET failed: {e}")))?;
        Ok(reply.is_some())
    }
}

fn decode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "record serialization error", e.to_string()))
}

impl DispatchStore for RedisDispatchStore {
    fn insert(&self, record: DispatchRecord) -> Result<(), StoreError> {
        if self.write_new(&record)? {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists(record.correlation_id))
        }
    }

    fn get(&self, correlation_id: CorrelationId) -> Result<Option<DispatchRecord>, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(correlation_id))
            .query(&mut conn)
            .map_err(|e| StoreError::Storage(format!("GET failed: {e}")))?;

        raw.map(|s| serde_json::from_str(&s).map_err(|e| StoreError::Serialization(e.to_string())))
            .transpose()
    }

    fn update_with(
        &self,
        correlation_id: CorrelationId,
        apply: &mut dyn FnMut(&mut DispatchRecord),
    ) -> Result<DispatchRecord, StoreError> {
        let key = Self::key(correlation_id);
        let ttl = self.ttl_secs();
        let mut conn = self.connection()?;

        let updated: Option<DispatchRecord> = redis::transaction(&mut conn, &[&key], |con, pipe| {
            let raw: Option<String> = redis::cmd("GET").arg(&key).query(con)?;
            let Some(raw) = raw else {
                return Ok(Some(None));
            };
            let mut record: DispatchRecord = serde_json::from_str(&raw).map_err(decode_error)?;
            apply(&mut record);
            let payload = serde_json::to_string(&record).map_err(decode_error)?;

            // `None` means EXEC was aborted by a concurrent write; the helper retries.
            let done: Option<()> = pipe
                .cmd("SET")
                .arg(&key)
                .arg(payload)
                .arg("EX")
                .arg(ttl)
                .ignore()
                .query(con)?;
            Ok(done.map(|()| Some(record)))
        })
        .map_err(|e| StoreError::Storage(format!("update failed: {e}")))?;

        updated.ok_or(StoreError::NotFound(correlation_id))
    }

    fn remove(&self, correlation_id: CorrelationId) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let _: u64 = redis::cmd("DEL")
            .arg(Self::key(correlation_id))
            .query(&mut conn)
            .map_err(|e| StoreError::Storage(format!("DEL failed: {e}")))?;
        Ok(())
    }

    fn dead_letter(&self, entry: DeadLetterEntry) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(&entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut conn = self.connection()?;
        redis::pipe()
            .cmd("LPUSH")
            .arg(DEAD_LETTER_KEY)
            .arg(payload)
            .ignore()
            .cmd("LTRIM")
            .arg(DEAD_LETTER_KEY)
            .arg(0)
            .arg(DEAD_LETTER_CAPACITY - 1)
            .ignore()
            .query::<()>(&mut conn)
            .map_err(|e| StoreError::Storage(format!("dead-letter push failed: {e}")))
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(DEAD_LETTER_KEY)
            .arg(0)
            .arg(limit as isize - 1)
            .query(&mut conn)
            .map_err(|e| StoreError::Storage(format!("LRANGE failed: {e}")))?;

        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(|e| StoreError::Serialization(e.to_string())))
            .collect()
    }
}
