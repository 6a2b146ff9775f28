//! In-memory dispatch store for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use relay_core::CorrelationId;

use super::{DispatchRecord, DispatchStore, StoreError};
use crate::types::DeadLetterEntry;

/// Default time a record stays readable after its last write.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(3600);

/// Dead letters kept before the oldest are dropped.
const DEAD_LETTER_CAPACITY: usize = 1000;

#[derive(Debug)]
struct Slot {
    record: DispatchRecord,
    expires_at: Instant,
}

/// Process-local status store with TTL expiry.
#[derive(Debug)]
pub struct InMemoryDispatchStore {
    ttl: Duration,
    records: RwLock<HashMap<CorrelationId, Slot>>,
    dead_letters: RwLock<VecDeque<DeadLetterEntry>>,
}

impl InMemoryDispatchStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_RECORD_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            records: RwLock::new(HashMap::new()),
            dead_letters: RwLock::new(VecDeque::new()),
        }
    }

    /// Number of records that have not expired.
    pub fn live_records(&self) -> Result<usize, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        let now = Instant::now();
        Ok(records.values().filter(|slot| slot.expires_at > now).count())
    }
}

impl Default for InMemoryDispatchStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("dispatch store lock poisoned".to_string())
}

impl DispatchStore for InMemoryDispatchStore {
    fn insert(&self, record: DispatchRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let now = Instant::now();
        records.retain(|_, slot| slot.expires_at > now);

        if records.contains_key(&record.correlation_id) {
            return Err(StoreError::AlreadyExists(record.correlation_id));
        }
        records.insert(
            record.correlation_id,
            Slot {
                record,
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    fn get(&self, correlation_id: CorrelationId) -> Result<Option<DispatchRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(&correlation_id)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| slot.record.clone()))
    }

    fn update_with(
        &self,
        correlation_id: CorrelationId,
        apply: &mut dyn FnMut(&mut DispatchRecord),
    ) -> Result<DispatchRecord, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let now = Instant::now();
        match records.get_mut(&correlation_id) {
            Some(slot) if slot.expires_at > now => {
                apply(&mut slot.record);
                slot.expires_at = now + self.ttl;
                Ok(slot.record.clone())
            }
            _ => Err(StoreError::NotFound(correlation_id)),
        }
    }

    fn remove(&self, correlation_id: CorrelationId) -> Result<(), StoreError> {
        self.records.write().map_err(poisoned)?.remove(&correlation_id);
        Ok(())
    }

    fn dead_letter(&self, entry: DeadLetterEntry) -> Result<(), StoreError> {
        let mut dls = self.dead_letters.write().map_err(poisoned)?;
        dls.push_front(entry);
        dls.truncate(DEAD_LETTER_CAPACITY);
        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        let dls = self.dead_letters.read().map_err(poisoned)?;
        Ok(dls.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use relay_core::{JsonMap, TaskId};

    use super::*;
    use crate::catalog::ChainKind;
    use crate::store::ChainState;
    use crate::types::UnitEnvelope;

    fn record() -> DispatchRecord {
        DispatchRecord::new(
            CorrelationId::new(),
            ChainKind::Simple,
            vec!["simple_job".to_string()],
            TaskId::new(),
        )
    }

    #[test]
    fn insert_get_update() {
        let store = InMemoryDispatchStore::new();
        let rec = record();
        store.insert(rec.clone()).unwrap();

        assert!(matches!(
            store.insert(rec.clone()),
            Err(StoreError::AlreadyExists(id)) if id == rec.correlation_id
        ));

        let updated = store
            .update_with(rec.correlation_id, &mut |r| r.mark_succeeded(0, JsonMap::new(), None))
            .unwrap();
        assert_eq!(updated.state, ChainState::Completed);

        let got = store.get(rec.correlation_id).unwrap().unwrap();
        assert_eq!(got.state, ChainState::Completed);
    }

    #[test]
    fn update_of_unknown_record_fails() {
        let store = InMemoryDispatchStore::new();
        let rec = record();
        assert!(matches!(
            store.update_with(rec.correlation_id, &mut |_| {}),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let store = Arc::new(InMemoryDispatchStore::new());
        let rec = record();
        let id = rec.correlation_id;
        store.insert(rec).unwrap();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        store
                            .update_with(id, &mut |r| r.units[0].attempts += 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(store.get(id).unwrap().unwrap().units[0].attempts, 400);
    }

    #[test]
    fn records_expire_after_ttl() {
        let store = InMemoryDispatchStore::with_ttl(Duration::from_millis(20));
        let rec = record();
        store.insert(rec.clone()).unwrap();
        assert!(store.get(rec.correlation_id).unwrap().is_some());

        thread::sleep(Duration::from_millis(40));
        assert!(store.get(rec.correlation_id).unwrap().is_none());
        assert_eq!(store.live_records().unwrap(), 0);
    }

    #[test]
    fn dead_letters_are_newest_first() {
        let store = InMemoryDispatchStore::new();
        let chain = vec!["simple_job".to_string()];
        for reason in ["first", "second", "third"] {
            let env = UnitEnvelope::for_step(CorrelationId::new(), &chain, 0, JsonMap::new()).unwrap();
            store
                .dead_letter(DeadLetterEntry::new(env, reason.to_string(), 4))
                .unwrap();
        }

        let listed = store.list_dead_letters(2).unwrap();
        let reasons: Vec<_> = listed.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, vec!["third", "second"]);
    }
}
