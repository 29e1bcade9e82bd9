//! Sequence manager.
//!
//! Sequences advance outside transaction control: every `next` is pushed to
//! the engine's versioned sequence cell at once, so values handed to an
//! aborted transaction are never reused and gaps are expected.
//!
//! The mapping from sequence name to engine sequence id lives in the
//! system sequences storage, which lets a restarted database find the cells
//! it advanced before.

use std::sync::Arc;

use dashmap::DashMap;
use jogasaki_common::{ErrorCode, ErrorInfo, JogasakiResult, SequenceId, SYSTEM_SEQUENCES_NAME};
use jogasaki_kvs::{KvsDatabase, PutOption, SequenceVersionedValue, Transaction};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::catalog::SequenceDefinition;

#[derive(Debug)]
struct Entry {
    definition: Arc<SequenceDefinition>,
    id: SequenceId,
    state: Mutex<SequenceVersionedValue>,
}

/// Registers and advances sequences.
#[derive(Debug)]
pub struct SequenceManager {
    kvs: Arc<KvsDatabase>,
    entries: DashMap<String, Arc<Entry>>,
}

impl SequenceManager {
    /// Creates a manager over `kvs`.
    #[must_use]
    pub fn new(kvs: Arc<KvsDatabase>) -> Self {
        Self {
            kvs,
            entries: DashMap::new(),
        }
    }

    /// Registers `definition`, reusing the engine cell recorded for its name
    /// if one exists. Returns the engine sequence id.
    pub fn register(
        &self,
        tx: &Transaction,
        definition: Arc<SequenceDefinition>,
    ) -> JogasakiResult<SequenceId> {
        let storage = self.kvs.get_or_create_storage(SYSTEM_SEQUENCES_NAME);
        let key = definition.name().as_bytes();
        let recorded = match tx.get(&storage, key)? {
            Some(raw) => Some(decode_id(&raw)?),
            None => None,
        };
        let id = match recorded.filter(|id| self.kvs.read_sequence(*id).is_ok()) {
            Some(id) => id,
            None => {
                let id = self.kvs.create_sequence();
                tx.put(&storage, key, &id.as_u64().to_le_bytes(), PutOption::CreateOrUpdate)?;
                id
            }
        };
        let state = self.kvs.read_sequence(id)?;
        debug!(sequence = definition.name(), %id, version = state.version, "sequence registered");
        self.entries.insert(
            definition.name().to_string(),
            Arc::new(Entry {
                definition,
                id,
                state: Mutex::new(state),
            }),
        );
        Ok(id)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn entry(&self, name: &str) -> JogasakiResult<Arc<Entry>> {
        self.entries
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| ErrorInfo::target_not_found(format!("sequence '{name}' not found")))
    }

    /// Advances `name` and returns the new value.
    ///
    /// The value is persisted before returning and survives an abort of
    /// `tx`. An exhausted non-cycling sequence fails with
    /// `InvalidRuntimeValue`.
    pub fn next(&self, tx: &Transaction, name: &str) -> JogasakiResult<i64> {
        let entry = self.entry(name)?;
        let def = &entry.definition;
        let mut state = entry.state.lock();
        let value = if state.version == 0 {
            def.initial_value
        } else {
            step(def, state.value)?
        };
        let version = state.version + 1;
        self.kvs.put_sequence(tx, entry.id, version, value)?;
        *state = SequenceVersionedValue { version, value };
        trace!(sequence = name, value, "sequence advanced");
        Ok(value)
    }

    /// Last value handed out, if any.
    #[must_use]
    pub fn current(&self, name: &str) -> Option<i64> {
        let entry = self.entries.get(name)?;
        let state = entry.state.lock();
        (state.version > 0).then_some(state.value)
    }

    /// Unregisters `name` and drops its engine cell.
    pub fn remove(&self, tx: &Transaction, name: &str) -> JogasakiResult<()> {
        let (_, entry) = self
            .entries
            .remove(name)
            .ok_or_else(|| ErrorInfo::target_not_found(format!("sequence '{name}' not found")))?;
        let storage = self.kvs.get_or_create_storage(SYSTEM_SEQUENCES_NAME);
        tx.remove(&storage, name.as_bytes())?;
        self.kvs.delete_sequence(entry.id)?;
        debug!(sequence = name, "sequence removed");
        Ok(())
    }

    /// Forgets every registration without touching the engine.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

fn decode_id(raw: &[u8]) -> JogasakiResult<SequenceId> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| {
        ErrorInfo::new(ErrorCode::DataCorruption, "malformed sequence mapping")
    })?;
    Ok(SequenceId::new(u64::from_le_bytes(bytes)))
}

fn step(def: &SequenceDefinition, current: i64) -> JogasakiResult<i64> {
    let next = current
        .checked_add(def.increment)
        .filter(|v| (def.min_value..=def.max_value).contains(v));
    match next {
        Some(v) => Ok(v),
        None if def.cycle => Ok(if def.increment > 0 {
            def.min_value
        } else {
            def.max_value
        }),
        None => Err(ErrorInfo::new(
            ErrorCode::InvalidRuntimeValue,
            format!("sequence '{}' exhausted", def.name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jogasaki_kvs::TransactionOptions;

    fn setup() -> (Arc<KvsDatabase>, SequenceManager) {
        let kvs = Arc::new(KvsDatabase::new());
        let manager = SequenceManager::new(Arc::clone(&kvs));
        (kvs, manager)
    }

    #[test]
    fn test_next_advances_from_initial() {
        let (kvs, manager) = setup();
        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        manager.register(&tx, Arc::new(SequenceDefinition::new("S"))).unwrap();
        assert_eq!(manager.current("S"), None);
        assert_eq!(manager.next(&tx, "S").unwrap(), 1);
        assert_eq!(manager.next(&tx, "S").unwrap(), 2);
        assert_eq!(manager.current("S"), Some(2));
    }

    #[test]
    fn test_advance_survives_abort_and_reregistration() {
        let (kvs, manager) = setup();
        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        manager.register(&tx, Arc::new(SequenceDefinition::new("S"))).unwrap();
        tx.commit().unwrap();

        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        assert_eq!(manager.next(&tx, "S").unwrap(), 1);
        tx.abort().unwrap();

        // a restarted manager finds the same cell through the mapping
        let restarted = SequenceManager::new(Arc::clone(&kvs));
        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        restarted.register(&tx, Arc::new(SequenceDefinition::new("S"))).unwrap();
        assert_eq!(restarted.next(&tx, "S").unwrap(), 2);
    }

    #[test]
    fn test_exhaustion_and_cycle() {
        let (kvs, manager) = setup();
        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        let mut def = SequenceDefinition::new("S");
        def.max_value = 2;
        manager.register(&tx, Arc::new(def.clone())).unwrap();
        manager.next(&tx, "S").unwrap();
        manager.next(&tx, "S").unwrap();
        let err = manager.next(&tx, "S").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRuntimeValue);

        def = SequenceDefinition::new("C");
        def.max_value = 2;
        def.cycle = true;
        manager.register(&tx, Arc::new(def)).unwrap();
        let values: Vec<i64> = (0..4).map(|_| manager.next(&tx, "C").unwrap()).collect();
        assert_eq!(values, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_unknown_and_removed() {
        let (kvs, manager) = setup();
        let tx = kvs.begin(TransactionOptions::short()).unwrap();
        assert_eq!(manager.next(&tx, "X").unwrap_err().code(), ErrorCode::TargetNotFound);
        manager.register(&tx, Arc::new(SequenceDefinition::new("X"))).unwrap();
        manager.remove(&tx, "X").unwrap();
        assert!(!manager.contains("X"));
    }
}
