//! The KV engine entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   KvsDatabase                    │
//! │                                                  │
//! │  storages ──▶ name → Storage (ordered, versioned) │
//! │  sequences ─▶ id → (version, value)               │
//! │  blobs ─────▶ id → file | bytes                   │
//! │                                                  │
//! │  begin() ──▶ Transaction (buffered writes)       │
//! └──────────────────────────────────────────────────┘
//! ```

use dashmap::DashMap;
use jogasaki_common::{BlobId, SequenceId, StorageId, TxnId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::blob::{BlobContent, BlobStore};
use crate::error::{KvsError, KvsResult};
use crate::options::TransactionOptions;
use crate::storage::{Storage, StorageHandle};
use crate::transaction::Transaction;

/// Durable state of a sequence: the value together with the version that
/// produced it. Puts with an older version are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceVersionedValue {
    /// Monotonic version of the put.
    pub version: u64,
    /// Sequence value.
    pub value: i64,
}

/// Engine statistics.
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    pub(crate) started: AtomicU64,
    pub(crate) committed: AtomicU64,
    pub(crate) aborted: AtomicU64,
    pub(crate) conflicts: AtomicU64,
}

/// Snapshot of engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatsSnapshot {
    /// Transactions begun.
    pub started: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions aborted (by the caller or by the engine).
    pub aborted: u64,
    /// Aborts caused by write conflicts.
    pub conflicts: u64,
}

impl EngineStatsSnapshot {
    /// Transactions neither committed nor aborted.
    #[must_use]
    pub fn active(&self) -> u64 {
        self.started
            .saturating_sub(self.committed)
            .saturating_sub(self.aborted)
    }
}

#[derive(Debug)]
pub(crate) struct EngineInner {
    storages: DashMap<String, StorageHandle>,
    next_storage_id: AtomicU64,
    next_txn_id: AtomicU64,
    /// Version of the latest commit.
    pub(crate) version: AtomicU64,
    pub(crate) commit_lock: Mutex<()>,
    sequences: DashMap<SequenceId, SequenceVersionedValue>,
    next_sequence_id: AtomicU64,
    pub(crate) blobs: Arc<BlobStore>,
    pub(crate) stats: EngineStats,
}

impl EngineInner {
    pub(crate) fn finish(&self, _txn: TxnId, committed: bool) {
        if committed {
            self.stats.committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.aborted.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// In-memory transactional ordered KV engine.
///
/// Cloning yields another handle to the same engine.
///
/// # Example
///
/// ```rust
/// use jogasaki_kvs::{KvsDatabase, PutOption, TransactionOptions};
///
/// let db = KvsDatabase::new();
/// let storage = db.get_or_create_storage("T0");
/// let tx = db.begin(TransactionOptions::short()).unwrap();
/// tx.put(&storage, b"k", b"v", PutOption::Create).unwrap();
/// tx.commit().unwrap();
/// assert_eq!(storage.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct KvsDatabase {
    inner: Arc<EngineInner>,
}

impl KvsDatabase {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        info!("kvs engine created");
        Self {
            inner: Arc::new(EngineInner {
                storages: DashMap::new(),
                next_storage_id: AtomicU64::new(1),
                next_txn_id: AtomicU64::new(1),
                version: AtomicU64::new(0),
                commit_lock: Mutex::new(()),
                sequences: DashMap::new(),
                next_sequence_id: AtomicU64::new(1),
                blobs: Arc::new(BlobStore::new()),
                stats: EngineStats::default(),
            }),
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begins a transaction.
    pub fn begin(&self, options: TransactionOptions) -> KvsResult<Arc<Transaction>> {
        let id = TxnId::new(self.inner.next_txn_id.fetch_add(1, Ordering::SeqCst));
        for name in &options.write_preserves {
            if !self.inner.storages.contains_key(name) {
                return Err(KvsError::StorageNotFound(name.clone()));
            }
        }
        let start_version = self.inner.version.load(Ordering::Acquire);
        self.inner.stats.started.fetch_add(1, Ordering::Relaxed);
        debug!(txn = %id, kind = ?options.transaction_type, label = ?options.label, "transaction begin");
        Ok(Arc::new(Transaction::new(
            id,
            options,
            start_version,
            Arc::clone(&self.inner),
        )))
    }

    /// Returns engine statistics.
    #[must_use]
    pub fn stats(&self) -> EngineStatsSnapshot {
        let s = &self.inner.stats;
        EngineStatsSnapshot {
            started: s.started.load(Ordering::Relaxed),
            committed: s.committed.load(Ordering::Relaxed),
            aborted: s.aborted.load(Ordering::Relaxed),
            conflicts: s.conflicts.load(Ordering::Relaxed),
        }
    }

    // =========================================================================
    // Storages
    // =========================================================================

    /// Creates a storage; fails if the name is taken.
    pub fn create_storage(&self, name: &str) -> KvsResult<StorageHandle> {
        match self.inner.storages.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(KvsError::StorageAlreadyExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let id = StorageId::new(self.inner.next_storage_id.fetch_add(1, Ordering::Relaxed));
                let storage = Arc::new(Storage::new(id, name));
                slot.insert(Arc::clone(&storage));
                debug!(storage = name, %id, "storage created");
                Ok(storage)
            }
        }
    }

    /// Returns the named storage.
    #[must_use]
    pub fn get_storage(&self, name: &str) -> Option<StorageHandle> {
        self.inner.storages.get(name).map(|s| Arc::clone(s.value()))
    }

    /// Returns the named storage, creating it if needed.
    pub fn get_or_create_storage(&self, name: &str) -> StorageHandle {
        let id = &self.inner.next_storage_id;
        let entry = self.inner.storages.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Storage::new(
                StorageId::new(id.fetch_add(1, Ordering::Relaxed)),
                name,
            ))
        });
        Arc::clone(entry.value())
    }

    /// Deletes the named storage.
    pub fn delete_storage(&self, name: &str) -> KvsResult<()> {
        self.inner
            .storages
            .remove(name)
            .map(|_| debug!(storage = name, "storage deleted"))
            .ok_or_else(|| KvsError::StorageNotFound(name.to_string()))
    }

    /// Returns the storage names in sorted order.
    #[must_use]
    pub fn list_storages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.storages.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    // =========================================================================
    // Sequences
    // =========================================================================

    /// Creates a sequence initialized to `(0, 0)`.
    pub fn create_sequence(&self) -> SequenceId {
        let id = SequenceId::new(self.inner.next_sequence_id.fetch_add(1, Ordering::Relaxed));
        self.inner.sequences.insert(id, SequenceVersionedValue::default());
        id
    }

    /// Stores a sequence value. Takes effect immediately, independent of
    /// the outcome of `tx`; older versions are ignored.
    pub fn put_sequence(
        &self,
        tx: &Transaction,
        id: SequenceId,
        version: u64,
        value: i64,
    ) -> KvsResult<()> {
        if !tx.is_active() {
            return Err(KvsError::InactiveTransaction(tx.id()));
        }
        let mut entry = self
            .inner
            .sequences
            .get_mut(&id)
            .ok_or(KvsError::SequenceNotFound(id))?;
        if version > entry.version {
            *entry = SequenceVersionedValue { version, value };
        }
        Ok(())
    }

    /// Reads the latest stored sequence value.
    pub fn read_sequence(&self, id: SequenceId) -> KvsResult<SequenceVersionedValue> {
        self.inner
            .sequences
            .get(&id)
            .map(|e| *e.value())
            .ok_or(KvsError::SequenceNotFound(id))
    }

    /// Deletes a sequence.
    pub fn delete_sequence(&self, id: SequenceId) -> KvsResult<()> {
        self.inner
            .sequences
            .remove(&id)
            .map(|_| ())
            .ok_or(KvsError::SequenceNotFound(id))
    }

    // =========================================================================
    // BLOBs
    // =========================================================================

    /// Returns the content of a committed or registered BLOB.
    pub fn get_blob(&self, id: BlobId) -> KvsResult<BlobContent> {
        self.inner.blobs.get(id)
    }
}

impl Default for KvsDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{PutOption, ScanRange};
    use crate::transaction::TransactionStatus;
    use bytes::Bytes;

    fn setup() -> (KvsDatabase, StorageHandle) {
        let db = KvsDatabase::new();
        let storage = db.create_storage("T").unwrap();
        (db, storage)
    }

    #[test]
    fn test_put_create_conflict_in_same_transaction() {
        let (db, storage) = setup();
        let tx = db.begin(TransactionOptions::short()).unwrap();
        tx.put(&storage, b"k", b"1", PutOption::Create).unwrap();
        assert_eq!(
            tx.put(&storage, b"k", b"2", PutOption::Create),
            Err(KvsError::AlreadyExists)
        );
        tx.put(&storage, b"k", b"3", PutOption::CreateOrUpdate).unwrap();
        assert_eq!(tx.get(&storage, b"k").unwrap(), Some(Bytes::from_static(b"3")));
        assert_eq!(
            tx.put(&storage, b"x", b"1", PutOption::Update),
            Err(KvsError::NotFound)
        );
    }

    #[test]
    fn test_commit_makes_writes_visible() {
        let (db, storage) = setup();
        let tx1 = db.begin(TransactionOptions::short()).unwrap();
        tx1.put(&storage, b"a", b"1", PutOption::Create).unwrap();

        let tx2 = db.begin(TransactionOptions::short()).unwrap();
        assert_eq!(tx2.get(&storage, b"a").unwrap(), None);

        tx1.commit().unwrap();
        assert_eq!(tx2.get(&storage, b"a").unwrap(), Some(Bytes::from_static(b"1")));
        assert_eq!(tx1.status(), TransactionStatus::Committed);
        assert_eq!(
            tx1.put(&storage, b"b", b"1", PutOption::Create),
            Err(KvsError::InactiveTransaction(tx1.id()))
        );
    }

    #[test]
    fn test_first_committer_wins() {
        let (db, storage) = setup();
        let tx1 = db.begin(TransactionOptions::short()).unwrap();
        let tx2 = db.begin(TransactionOptions::short()).unwrap();
        tx1.put(&storage, b"k", b"1", PutOption::Create).unwrap();
        tx2.put(&storage, b"k", b"2", PutOption::Create).unwrap();
        tx1.commit().unwrap();
        assert!(matches!(tx2.commit(), Err(KvsError::Aborted { .. })));
        assert_eq!(tx2.status(), TransactionStatus::Aborted);
        assert_eq!(storage.get_committed(b"k"), Some(Bytes::from_static(b"1")));
        let stats = db.stats();
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.aborted, 1);
    }

    #[test]
    fn test_abort_discards_writes() {
        let (db, storage) = setup();
        let tx = db.begin(TransactionOptions::short()).unwrap();
        tx.put(&storage, b"k", b"1", PutOption::Create).unwrap();
        tx.abort().unwrap();
        tx.abort().unwrap();
        assert!(storage.is_empty());
        assert_eq!(db.stats().aborted, 1);
        assert_eq!(db.stats().active(), 0);
    }

    #[test]
    fn test_scan_merges_own_writes() {
        let (db, storage) = setup();
        let setup_tx = db.begin(TransactionOptions::short()).unwrap();
        for k in [b"a", b"c", b"e"] {
            setup_tx.put(&storage, k, b"old", PutOption::Create).unwrap();
        }
        setup_tx.commit().unwrap();

        let tx = db.begin(TransactionOptions::short()).unwrap();
        tx.put(&storage, b"b", b"new", PutOption::Create).unwrap();
        assert!(tx.remove(&storage, b"c").unwrap());
        assert!(!tx.remove(&storage, b"z").unwrap());
        let keys: Vec<Vec<u8>> = tx
            .scan(&storage, &ScanRange::all())
            .unwrap()
            .map(|(k, _)| k.as_bytes().to_vec())
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"e".to_vec()]);
    }

    #[test]
    fn test_read_only_and_long_transactions() {
        let (db, storage) = setup();
        let other = db.create_storage("U").unwrap();
        let ro = db.begin(TransactionOptions::read_only()).unwrap();
        assert!(matches!(
            ro.put(&storage, b"k", b"v", PutOption::Create),
            Err(KvsError::ReadOnlyWrite(_))
        ));

        let long = db.begin(TransactionOptions::long(["T"])).unwrap();
        long.put(&storage, b"k", b"v", PutOption::Create).unwrap();
        assert!(matches!(
            long.put(&other, b"k", b"v", PutOption::Create),
            Err(KvsError::WriteWithoutPreserve { .. })
        ));
        assert!(matches!(
            db.begin(TransactionOptions::long(["missing"])),
            Err(KvsError::StorageNotFound(_))
        ));
    }

    #[test]
    fn test_storage_lifecycle() {
        let db = KvsDatabase::new();
        db.create_storage("b").unwrap();
        db.get_or_create_storage("a");
        assert!(matches!(db.create_storage("b"), Err(KvsError::StorageAlreadyExists(_))));
        assert_eq!(db.list_storages(), vec!["a".to_string(), "b".to_string()]);
        db.delete_storage("a").unwrap();
        assert!(db.get_storage("a").is_none());
        assert!(db.delete_storage("a").is_err());
    }

    #[test]
    fn test_sequence_survives_abort() {
        let db = KvsDatabase::new();
        let id = db.create_sequence();
        let tx = db.begin(TransactionOptions::short()).unwrap();
        db.put_sequence(&tx, id, 1, 10).unwrap();
        db.put_sequence(&tx, id, 0, 99).unwrap();
        tx.abort().unwrap();
        assert_eq!(
            db.read_sequence(id).unwrap(),
            SequenceVersionedValue { version: 1, value: 10 }
        );
        assert!(db.put_sequence(&tx, id, 2, 11).is_err());
        db.delete_sequence(id).unwrap();
        assert!(db.read_sequence(id).is_err());
    }

    #[test]
    fn test_blob_pool_follows_transaction() {
        let db = KvsDatabase::new();
        let tx = db.begin(TransactionOptions::short()).unwrap();
        let pool = tx.blob_pool().unwrap();
        let kept = pool.register_data(Bytes::from_static(b"kept")).unwrap();
        let lost = pool.register_data(Bytes::from_static(b"lost")).unwrap();
        pool.publish(&[kept]).unwrap();
        tx.commit().unwrap();
        assert_eq!(
            db.get_blob(kept).unwrap().read_all().unwrap(),
            Bytes::from_static(b"kept")
        );
        assert!(db.get_blob(lost).is_err());
    }

    #[test]
    fn test_dropped_transaction_is_aborted() {
        let (db, storage) = setup();
        {
            let tx = db.begin(TransactionOptions::short()).unwrap();
            tx.put(&storage, b"k", b"v", PutOption::Create).unwrap();
        }
        assert!(storage.is_empty());
        assert_eq!(db.stats().aborted, 1);
    }
}
