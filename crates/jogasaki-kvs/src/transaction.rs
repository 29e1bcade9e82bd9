//! Transactions.
//!
//! ```text
//! ┌────────┐  commit() ok   ┌───────────┐
//! │ Active │───────────────▶│ Committed │
//! └────────┘                └───────────┘
//!     │ abort() / commit() conflict
//!     ▼
//! ┌─────────┐
//! │ Aborted │
//! └─────────┘
//! ```
//!
//! Writes are buffered per transaction and become visible to others at
//! commit. Conflicts are detected at commit: if another transaction
//! committed any key this transaction wrote after it began, this one is
//! aborted (first committer wins). Reads see the transaction's own writes
//! over the latest committed state.

use bytes::Bytes;
use jogasaki_common::{Key, StorageId, TxnId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::blob::BlobPool;
use crate::database::EngineInner;
use crate::error::{KvsError, KvsResult};
use crate::options::{PutOption, ScanRange, TransactionOptions, TransactionType};
use crate::storage::{Storage, StorageHandle};

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Operations are accepted.
    Active,
    /// Committed successfully.
    Committed,
    /// Aborted by the caller or by the engine.
    Aborted,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug)]
struct PendingWrite {
    storage: StorageHandle,
    value: Option<Bytes>,
}

#[derive(Debug)]
struct TxnState {
    status: TransactionStatus,
    writes: BTreeMap<(StorageId, Key), PendingWrite>,
    blob_pool: Option<Arc<BlobPool>>,
}

/// Iterator over the entries returned by [`Transaction::scan`].
#[derive(Debug)]
pub struct ScanCursor {
    entries: std::vec::IntoIter<(Key, Bytes)>,
}

impl Iterator for ScanCursor {
    type Item = (Key, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// A transaction handle.
pub struct Transaction {
    id: TxnId,
    options: TransactionOptions,
    start_version: u64,
    engine: Arc<EngineInner>,
    state: Mutex<TxnState>,
}

impl Transaction {
    pub(crate) fn new(
        id: TxnId,
        options: TransactionOptions,
        start_version: u64,
        engine: Arc<EngineInner>,
    ) -> Self {
        Self {
            id,
            options,
            start_version,
            engine,
            state: Mutex::new(TxnState {
                status: TransactionStatus::Active,
                writes: BTreeMap::new(),
                blob_pool: None,
            }),
        }
    }

    /// Returns the transaction id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the options given at begin.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    /// Returns true while operations are accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    fn ensure_active(&self, state: &TxnState) -> KvsResult<()> {
        if state.status != TransactionStatus::Active {
            return Err(KvsError::InactiveTransaction(self.id));
        }
        Ok(())
    }

    fn visible(&self, state: &TxnState, storage: &Storage, key: &[u8]) -> Option<Bytes> {
        match state.writes.get(&(storage.id(), Key::from_bytes(key))) {
            Some(pending) => pending.value.clone(),
            None => storage.get_committed(key),
        }
    }

    /// Reads the value stored under `key`.
    pub fn get(&self, storage: &Storage, key: &[u8]) -> KvsResult<Option<Bytes>> {
        let state = self.state.lock();
        self.ensure_active(&state)?;
        Ok(self.visible(&state, storage, key))
    }

    /// Writes `value` under `key` with the given conflict policy.
    pub fn put(
        &self,
        storage: &StorageHandle,
        key: &[u8],
        value: &[u8],
        option: PutOption,
    ) -> KvsResult<()> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;
        self.check_writable(storage)?;
        let exists = self.visible(&state, storage, key).is_some();
        match option {
            PutOption::Create if exists => return Err(KvsError::AlreadyExists),
            PutOption::Update if !exists => return Err(KvsError::NotFound),
            _ => {}
        }
        trace!(txn = %self.id, storage = storage.name(), key_len = key.len(), value_len = value.len(), "put");
        state.writes.insert(
            (storage.id(), Key::from_bytes(key)),
            PendingWrite {
                storage: Arc::clone(storage),
                value: Some(Bytes::copy_from_slice(value)),
            },
        );
        Ok(())
    }

    /// Removes the entry under `key`. Returns whether an entry existed.
    pub fn remove(&self, storage: &StorageHandle, key: &[u8]) -> KvsResult<bool> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;
        self.check_writable(storage)?;
        if self.visible(&state, storage, key).is_none() {
            return Ok(false);
        }
        state.writes.insert(
            (storage.id(), Key::from_bytes(key)),
            PendingWrite {
                storage: Arc::clone(storage),
                value: None,
            },
        );
        Ok(true)
    }

    /// Returns the entries in `range` in key order.
    pub fn scan(&self, storage: &Storage, range: &ScanRange) -> KvsResult<ScanCursor> {
        let state = self.state.lock();
        self.ensure_active(&state)?;
        let mut merged: BTreeMap<Key, Bytes> = storage.scan_committed(range).into_iter().collect();
        let sid = storage.id();
        for ((id, key), pending) in state.writes.iter() {
            if *id != sid || !range.contains(key.as_bytes()) {
                continue;
            }
            match &pending.value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(ScanCursor {
            entries: merged.into_iter().collect::<Vec<_>>().into_iter(),
        })
    }

    fn check_writable(&self, storage: &Storage) -> KvsResult<()> {
        match self.options.transaction_type {
            TransactionType::ReadOnly => Err(KvsError::ReadOnlyWrite(self.id)),
            _ if !self.options.is_write_preserved(storage.name()) => {
                Err(KvsError::WriteWithoutPreserve {
                    txn_id: self.id,
                    storage: storage.name().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Returns the transaction's BLOB pool, acquiring it on first use.
    pub fn blob_pool(&self) -> KvsResult<Arc<BlobPool>> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;
        let pool = state
            .blob_pool
            .get_or_insert_with(|| Arc::new(BlobPool::new(Arc::clone(&self.engine.blobs))));
        Ok(Arc::clone(pool))
    }

    /// Commits the transaction.
    ///
    /// On a write conflict the transaction is aborted and `Aborted` is
    /// returned.
    pub fn commit(&self) -> KvsResult<()> {
        let mut state = self.state.lock();
        self.ensure_active(&state)?;

        let _guard = self.engine.commit_lock.lock();
        let conflict = state.writes.iter().find(|((_, key), pending)| {
            pending
                .storage
                .committed_version(key.as_bytes())
                .is_some_and(|v| v > self.start_version)
        });
        if let Some(((_, key), pending)) = conflict {
            let reason = format!("write conflict on {} {:?}", pending.storage.name(), key);
            self.finish_abort(&mut state);
            self.engine.stats.conflicts.fetch_add(1, Ordering::Relaxed);
            debug!(txn = %self.id, %reason, "transaction aborted at commit");
            return Err(KvsError::Aborted {
                txn_id: self.id,
                reason,
            });
        }

        let version = self.engine.version.fetch_add(1, Ordering::AcqRel) + 1;
        let writes = std::mem::take(&mut state.writes);
        let count = writes.len();
        for ((_, key), pending) in writes {
            pending.storage.apply(key, pending.value, version);
        }
        if let Some(pool) = state.blob_pool.take() {
            pool.release(true);
        }
        state.status = TransactionStatus::Committed;
        self.engine.finish(self.id, true);
        debug!(txn = %self.id, version, writes = count, "transaction committed");
        Ok(())
    }

    /// Aborts the transaction. Aborting an aborted transaction is a no-op;
    /// aborting a committed one fails with `InactiveTransaction`.
    pub fn abort(&self) -> KvsResult<()> {
        let mut state = self.state.lock();
        match state.status {
            TransactionStatus::Aborted => Ok(()),
            TransactionStatus::Committed => Err(KvsError::InactiveTransaction(self.id)),
            TransactionStatus::Active => {
                self.finish_abort(&mut state);
                debug!(txn = %self.id, "transaction aborted");
                Ok(())
            }
        }
    }

    fn finish_abort(&self, state: &mut TxnState) {
        state.writes.clear();
        if let Some(pool) = state.blob_pool.take() {
            pool.release(false);
        }
        state.status = TransactionStatus::Aborted;
        self.engine.finish(self.id, false);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.status == TransactionStatus::Active {
            state.writes.clear();
            if let Some(pool) = state.blob_pool.take() {
                pool.release(false);
            }
            state.status = TransactionStatus::Aborted;
            self.engine.finish(self.id, false);
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("type", &self.options.transaction_type)
            .field("status", &state.status)
            .field("writes", &state.writes.len())
            .finish()
    }
}
