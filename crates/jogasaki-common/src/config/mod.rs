//! Configuration for Jogasaki.
//!
//! The execution core reads its configuration object from the enclosing
//! server process; it never consults environment variables itself.

mod execution;

pub use execution::ExecutionConfig;
