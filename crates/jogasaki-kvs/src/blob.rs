//! BLOB/CLOB object store and per-transaction pools.
//!
//! Large objects are registered with a transaction's [`BlobPool`], either as
//! a file on disk or as in-memory bytes. Registration yields a [`BlobId`].
//! Ids stay in the pool until the writer publishes them; when the pool is
//! released (on commit or abort) every registered but unpublished object is
//! discarded and temporary files are removed.

use bytes::Bytes;
use dashmap::DashMap;
use jogasaki_common::BlobId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{KvsError, KvsResult};

/// Content of a stored large object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobContent {
    /// Object backed by a file.
    File {
        /// Location of the file.
        path: PathBuf,
        /// Whether the file is removed when the object is discarded.
        temporary: bool,
    },
    /// Object held in memory.
    Data(Bytes),
}

impl BlobContent {
    /// Reads the full content.
    pub fn read_all(&self) -> KvsResult<Bytes> {
        match self {
            BlobContent::File { path, .. } => Ok(Bytes::from(std::fs::read(path)?)),
            BlobContent::Data(data) => Ok(data.clone()),
        }
    }

    /// Returns the file path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            BlobContent::File { path, .. } => Some(path),
            BlobContent::Data(_) => None,
        }
    }
}

/// Engine-wide registry of large objects.
#[derive(Debug)]
pub(crate) struct BlobStore {
    objects: DashMap<BlobId, BlobContent>,
    next_id: AtomicU64,
}

impl BlobStore {
    pub(crate) fn new() -> Self {
        Self {
            objects: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, content: BlobContent) -> BlobId {
        let id = BlobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.objects.insert(id, content);
        id
    }

    pub(crate) fn get(&self, id: BlobId) -> KvsResult<BlobContent> {
        self.objects
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(KvsError::BlobNotFound(id))
    }

    fn discard(&self, id: BlobId) {
        if let Some((_, BlobContent::File { path, temporary })) = self.objects.remove(&id) {
            let shared = self
                .objects
                .iter()
                .any(|entry| entry.value().path() == Some(path.as_path()));
            if temporary && !shared {
                if let Err(err) = std::fs::remove_file(&path) {
                    warn!(blob = %id, path = %path.display(), error = %err, "failed to remove temporary blob file");
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}

/// Per-transaction pool of registered large objects.
#[derive(Debug)]
pub struct BlobPool {
    store: Arc<BlobStore>,
    registered: Mutex<Vec<BlobId>>,
    published: Mutex<HashSet<BlobId>>,
    released: AtomicBool,
}

impl BlobPool {
    pub(crate) fn new(store: Arc<BlobStore>) -> Self {
        Self {
            store,
            registered: Mutex::new(Vec::new()),
            published: Mutex::new(HashSet::new()),
            released: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> KvsResult<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(KvsError::Io("blob pool already released".into()));
        }
        Ok(())
    }

    fn track(&self, content: BlobContent) -> BlobId {
        let id = self.store.insert(content);
        self.registered.lock().push(id);
        id
    }

    /// Registers a file. The file must exist.
    pub fn register_file(&self, path: impl AsRef<Path>, is_temporary: bool) -> KvsResult<BlobId> {
        self.check_open()?;
        let path = path.as_ref();
        if !path.is_file() {
            return Err(KvsError::Io(format!("blob file not found: {}", path.display())));
        }
        Ok(self.track(BlobContent::File {
            path: path.to_path_buf(),
            temporary: is_temporary,
        }))
    }

    /// Registers in-memory bytes.
    pub fn register_data(&self, data: impl Into<Bytes>) -> KvsResult<BlobId> {
        self.check_open()?;
        Ok(self.track(BlobContent::Data(data.into())))
    }

    /// Registers a new id sharing the content of `id`.
    ///
    /// A duplicated file is never temporary.
    pub fn duplicate(&self, id: BlobId) -> KvsResult<BlobId> {
        self.check_open()?;
        let content = match self.store.get(id)? {
            BlobContent::File { path, .. } => BlobContent::File {
                path,
                temporary: false,
            },
            data => data,
        };
        Ok(self.track(content))
    }

    /// Returns the content registered for `id`.
    pub fn get_blob_file(&self, id: BlobId) -> KvsResult<BlobContent> {
        self.store.get(id)
    }

    /// Marks registered ids as referenced by stored rows.
    pub fn publish(&self, ids: &[BlobId]) -> KvsResult<()> {
        self.check_open()?;
        let registered = self.registered.lock();
        let mut published = self.published.lock();
        for id in ids {
            if registered.contains(id) {
                published.insert(*id);
            } else {
                // objects from earlier transactions are already durable
                self.store.get(*id)?;
            }
        }
        Ok(())
    }

    /// Number of ids registered in this pool.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registered.lock().len()
    }

    /// Releases the pool. Unpublished objects are always discarded; published
    /// ones are kept only when `keep_published` is set (commit).
    pub(crate) fn release(&self, keep_published: bool) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let registered = std::mem::take(&mut *self.registered.lock());
        let published = std::mem::take(&mut *self.published.lock());
        let mut discarded = 0usize;
        for id in registered {
            if keep_published && published.contains(&id) {
                continue;
            }
            self.store.discard(id);
            discarded += 1;
        }
        debug!(discarded, keep_published, "blob pool released");
    }
}
