//! Jogasaki performance benchmarks.
//!
//! - Row codec: key and value encoding and decoding
//! - Write path: INSERT through prepare/resolve/execute
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p jogasaki-bench
//! ```

pub mod utils;
