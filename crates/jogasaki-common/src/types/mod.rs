//! Type definitions shared by every Jogasaki crate.

mod ids;
mod keys;

pub use ids::{BlobId, DefinitionId, SequenceId, StorageId, TxnId};
pub use keys::Key;
