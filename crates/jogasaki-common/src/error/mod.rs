//! Error handling for Jogasaki.
//!
//! Errors are *kinds*, not exceptions. Every error that leaves the execution
//! core is an [`ErrorInfo`] carrying a stable [`ErrorCode`], a human message,
//! and an optional supplemental text the client may use to localize.

mod code;
mod info;

pub use code::ErrorCode;
pub use info::ErrorInfo;

/// Result type alias for operations surfacing structured errors.
pub type JogasakiResult<T> = std::result::Result<T, ErrorInfo>;
