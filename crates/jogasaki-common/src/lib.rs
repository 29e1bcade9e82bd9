//! # jogasaki-common
//!
//! Common types, errors, and utilities for the Jogasaki execution engine.
//!
//! This crate provides the foundational pieces shared by every other crate:
//!
//! - **Errors**: stable [`ErrorCode`]s and the structured [`ErrorInfo`]
//! - **Config**: the [`ExecutionConfig`] handed down by the server process
//! - **Types**: identifier newtypes and the order-comparable [`Key`]
//! - **Memory**: the paged memory resource and the LIFO scratch arena
//!
//! ## Example
//!
//! ```rust
//! use jogasaki_common::error::{ErrorCode, ErrorInfo, JogasakiResult};
//!
//! fn check(len: usize) -> JogasakiResult<()> {
//!     if len > 5 {
//!         return Err(ErrorInfo::new(ErrorCode::ValueTooLong, "value exceeds 5 characters"));
//!     }
//!     Ok(())
//! }
//! assert!(check(6).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod memory;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::ExecutionConfig;
pub use constants::*;
pub use error::{ErrorCode, ErrorInfo, JogasakiResult};
pub use types::{BlobId, DefinitionId, Key, SequenceId, StorageId, TxnId};
