//! # jogasaki-sql
//!
//! The SQL execution core of Jogasaki.
//!
//! This crate implements:
//! - The field type model and tagged runtime values
//! - Cast and assignment conversion with precision-loss tracking
//! - Scalar expression evaluation
//! - The order-preserving row codec for index keys and values
//! - The write pipeline (insert, upsert, insert-if-absent)
//! - Index scans and primary key lookups
//! - The catalog provider, metadata serializer and sequence manager
//!
//! ```text
//!  plan ──resolve──▶ Executable ──execute──▶ executor
//!                                              │
//!        ┌──────────────┬─────────────┬────────┴────────┐
//!        ▼              ▼             ▼                 ▼
//!      expr ──▶ conv   codec       catalog ◀── serializer
//!        │              │             │
//!        └──── data ◀───┘         sequence
//!                                     │
//!                              jogasaki-kvs
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Packed records and views over them
pub mod accessor;

/// Tables, indexes, sequences and the provider owning them
pub mod catalog;

/// Row codec
pub mod codec;

/// Casts and assignment conversion
pub mod conv;

/// Runtime values
pub mod data;

/// Statement execution
pub mod executor;

/// Scalar expressions
pub mod expr;

/// Field types and record layouts
pub mod meta;

/// Compiled statements and parameter binding
pub mod plan;

/// Sequence manager
pub mod sequence;

/// Metadata serializer
pub mod serializer;

pub use executor::{
    execute, CancelToken, ExecutionResult, RequestContext, ResultSet, WriteStatistics,
};
pub use plan::{resolve, Executable, Parameters, PreparedStatement, Statement, VariableTable};
