//! Catalog objects and the provider that owns them.
//!
//! Tables, indexes and sequences are owned by a [`StorageProvider`] and
//! refer to each other by name; nothing holds a pointer into another object.
//!
//! ```text
//!   Table ──columns──▶ Column ──default──▶ Sequence (by name)
//!     ▲
//!     └── Index (by table name); the primary index shares the table's name
//! ```

mod column;
mod provider;
mod table;

use jogasaki_common::{ErrorCode, ErrorInfo};
use thiserror::Error;

pub use column::{Column, ColumnDefault, ColumnFeatures, DefaultFunction};
pub use provider::{CatalogObject, StorageProvider};
pub use table::{Index, IndexFeatures, IndexKey, SequenceDefinition, SortDirection, Table};

/// Errors raised by catalog operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No object of that kind and name.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object kind.
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// An object of that kind and name already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Object kind.
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// A column name that the table does not define.
    #[error("column '{column}' not found in table '{table}'")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A definition that is not well-formed.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// The object is still referenced.
    #[error("'{name}' is still referenced by '{by}'")]
    InUse {
        /// Referenced object.
        name: String,
        /// Referencing object.
        by: String,
    },
}

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

impl From<CatalogError> for ErrorInfo {
    fn from(err: CatalogError) -> Self {
        let code = match &err {
            CatalogError::NotFound { .. } => ErrorCode::TargetNotFound,
            CatalogError::AlreadyExists { .. } => ErrorCode::TargetAlreadyExists,
            CatalogError::UnknownColumn { .. } => ErrorCode::SymbolAnalyze,
            CatalogError::InvalidDefinition(_) => ErrorCode::TypeAnalyze,
            CatalogError::InUse { .. } => ErrorCode::InvalidArgument,
        };
        ErrorInfo::new(code, err.to_string())
    }
}
