//! Storage engine error types.

use jogasaki_common::error::{ErrorCode, ErrorInfo};
use jogasaki_common::{BlobId, SequenceId, TxnId};
use thiserror::Error;

/// Errors returned by the KV engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvsError {
    /// `put` with `Create` found an existing entry.
    #[error("entry already exists")]
    AlreadyExists,

    /// `put` with `Update` found no entry.
    #[error("entry not found")]
    NotFound,

    /// The transaction was aborted by the engine (e.g. write conflict).
    #[error("transaction {txn_id} aborted: {reason}")]
    Aborted {
        /// The aborted transaction.
        txn_id: TxnId,
        /// Why the engine aborted it.
        reason: String,
    },

    /// The transaction has already ended.
    #[error("transaction {0} is inactive")]
    InactiveTransaction(TxnId),

    /// Write attempted by a read-only transaction.
    #[error("write operation by read-only transaction {0}")]
    ReadOnlyWrite(TxnId),

    /// A long transaction wrote to a storage outside its write preserves.
    #[error("transaction {txn_id} writes '{storage}' outside its write preserves")]
    WriteWithoutPreserve {
        /// The offending transaction.
        txn_id: TxnId,
        /// The storage name.
        storage: String,
    },

    /// Named storage does not exist.
    #[error("storage '{0}' not found")]
    StorageNotFound(String),

    /// Named storage already exists.
    #[error("storage '{0}' already exists")]
    StorageAlreadyExists(String),

    /// Sequence does not exist.
    #[error("sequence {0} not found")]
    SequenceNotFound(SequenceId),

    /// BLOB id is unknown or was released.
    #[error("blob {0} not found")]
    BlobNotFound(BlobId),

    /// File system error while handling BLOB files.
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored bytes are malformed.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl KvsError {
    /// Returns true if the transaction can no longer be used after this error.
    #[must_use]
    pub fn is_transaction_fatal(&self) -> bool {
        matches!(
            self,
            KvsError::Aborted { .. } | KvsError::InactiveTransaction(_)
        )
    }
}

impl From<std::io::Error> for KvsError {
    fn from(err: std::io::Error) -> Self {
        KvsError::Io(err.to_string())
    }
}

impl From<KvsError> for ErrorInfo {
    fn from(err: KvsError) -> Self {
        let code = match &err {
            KvsError::AlreadyExists => ErrorCode::UniqueConstraintViolation,
            KvsError::NotFound
            | KvsError::StorageNotFound(_)
            | KvsError::SequenceNotFound(_) => ErrorCode::TargetNotFound,
            KvsError::StorageAlreadyExists(_) => ErrorCode::TargetAlreadyExists,
            KvsError::Aborted { .. } => ErrorCode::Aborted,
            KvsError::InactiveTransaction(_) => ErrorCode::InactiveTransaction,
            KvsError::ReadOnlyWrite(_) | KvsError::WriteWithoutPreserve { .. } => {
                ErrorCode::InvalidArgument
            }
            KvsError::BlobNotFound(_) => ErrorCode::InvalidRuntimeValue,
            KvsError::Io(_) => ErrorCode::StorageIoError,
            KvsError::DataCorruption(_) => ErrorCode::DataCorruption,
        };
        ErrorInfo::new(code, err.to_string())
    }
}

/// Result type for KV engine operations.
pub type KvsResult<T> = Result<T, KvsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let info: ErrorInfo = KvsError::AlreadyExists.into();
        assert_eq!(info.code(), ErrorCode::UniqueConstraintViolation);

        let info: ErrorInfo = KvsError::InactiveTransaction(TxnId::new(3)).into();
        assert_eq!(info.code(), ErrorCode::InactiveTransaction);
        assert!(info.message().contains('3'));

        let info: ErrorInfo = KvsError::Io("disk".into()).into();
        assert_eq!(info.code(), ErrorCode::StorageIoError);
    }

    #[test]
    fn test_fatal_errors() {
        assert!(KvsError::Aborted {
            txn_id: TxnId::new(1),
            reason: "conflict".into()
        }
        .is_transaction_fatal());
        assert!(!KvsError::AlreadyExists.is_transaction_fatal());
    }
}
