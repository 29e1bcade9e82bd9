//! Record accessors.
//!
//! [`RecordBuffer`] owns a packed record laid out by a [`RecordMeta`] together
//! with the arena holding its variable-length payloads. [`RecordRef`] is a
//! borrowed read-only view of the same bytes.

mod record;

pub use record::{RecordBuffer, RecordRef};
