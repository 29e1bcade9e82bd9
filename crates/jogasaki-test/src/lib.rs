//! # jogasaki-test
//!
//! End-to-end tests for Jogasaki.
//!
//! This crate contains:
//! - Fixtures driving a [`Database`](jogasaki_server::Database) the way a
//!   SQL front end would
//! - Scenario tests under `tests/`
//! - Property tests for the codec and casts

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Database fixtures and statement builders
pub mod fixtures;
