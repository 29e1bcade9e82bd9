//! # Jogasaki Database
//!
//! Wires the execution core to a storage engine and owns everything a
//! statement needs between calls: the configuration, the catalog, the
//! sequence manager and the registered statements.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Database                            │
//! │                              │                               │
//! │     ┌────────────────────────┼────────────────────────┐      │
//! │     ▼                        ▼                        ▼      │
//! │ ┌─────────────┐     ┌─────────────────┐     ┌──────────────┐ │
//! │ │ Statements  │     │ StorageProvider │     │ SequenceMgr  │ │
//! │ │ (handles)   │     │ (catalog)       │     │              │ │
//! │ └─────────────┘     └─────────────────┘     └──────────────┘ │
//! │        │                     │                     │         │
//! │        └─────────────────────┼─────────────────────┘         │
//! │                              ▼                               │
//! │                       RequestContext ──▶ execute             │
//! │                              │                               │
//! │                              ▼                               │
//! │                         KvsDatabase                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!   open ──▶ Stopped ──start──▶ Running ──stop──▶ Stopped
//!                      (restore catalog)  (drop catalog)
//! ```

mod engine;
mod handle;

pub use engine::{Database, DatabaseState, DatabaseStats, ExecuteOptions};
pub use handle::StatementHandle;
