//! # jogasaki-kvs
//!
//! The transactional ordered key-value engine the Jogasaki execution core
//! writes to.
//!
//! - **Storages**: named ordered maps of key bytes to value bytes
//! - **Transactions**: buffered writes with first-committer-wins validation,
//!   short/long/read-only kinds and `create`/`create_or_update`/`update` puts
//! - **Sequences**: non-transactional `(version, value)` cells
//! - **BLOB pools**: per-transaction registration of large objects
//!
//! ```text
//!   execution core
//!        │ begin / put / get / scan / commit / abort
//!        ▼
//! ┌──────────────┐     ┌──────────────┐
//! │ Transaction  │────▶│   Storage    │  (BTreeMap<Key, versioned value>)
//! └──────────────┘     └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐     ┌──────────────┐
//! │   BlobPool   │────▶│  BlobStore   │
//! └──────────────┘     └──────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod database;
pub mod error;
pub mod options;
pub mod storage;
pub mod transaction;

pub use blob::{BlobContent, BlobPool};
pub use database::{EngineStatsSnapshot, KvsDatabase, SequenceVersionedValue};
pub use error::{KvsError, KvsResult};
pub use options::{PutOption, ScanRange, TransactionOptions, TransactionType};
pub use storage::{Storage, StorageHandle};
pub use transaction::{ScanCursor, Transaction, TransactionStatus};
