//! # jogasaki-server
//!
//! The embedding surface of Jogasaki.
//!
//! - **Lifecycle**: `start` restores the catalog from the system storage
//!   before any statement is admitted; `stop` drops the in-memory catalog
//!   while the storage engine keeps the data.
//! - **Statements**: plans are registered with `prepare`, bound to
//!   parameters with `resolve` and run under a caller transaction with
//!   `execute`.
//! - **Definitions**: DDL shortcuts that persist metadata through the
//!   execution core.
//!
//! # Quick Start
//!
//! ```ignore
//! use jogasaki_server::Database;
//!
//! let db = Database::open_memory()?;
//! db.start()?;
//! db.create_table(CreateTableStatement::new(table, vec![IndexKey::asc("C0")]))?;
//!
//! let handle = db.prepare(statement, VariableTable::new());
//! let exe = db.resolve(handle, &Parameters::new())?;
//! db.transaction(TransactionOptions::short(), |tx| db.execute(tx, &exe))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Database facade: lifecycle, statement handles and execution.
pub mod database;

pub use database::{Database, DatabaseState, DatabaseStats, ExecuteOptions, StatementHandle};
