//! Runtime values.
//!
//! - [`Triple`]: exact decimal
//! - [`Date`], [`TimeOfDay`], [`TimePoint`]: temporal values
//! - [`BlobReference`], [`ClobReference`]: LOB references
//! - [`Value`]: the tagged value passed between evaluator, casts and codec
//! - [`ValueStore`]: append-only paged column store

mod decimal;
mod lob;
pub mod runtime;
mod temporal;
mod value;
mod value_store;

pub use decimal::{
    digit_count, pow10, DecimalError, RoundingMode, Triple, MAX_DIGITS, MAX_EXPONENT, MIN_EXPONENT,
};
pub use lob::{BlobReference, ClobReference, LobLocator, LobProvenance};
pub use runtime::DataError;
pub use temporal::{
    civil_from_days, days_from_civil, format_offset, parse_time_point_with_offset,
    parse_time_with_offset, Date, TemporalParseError, TimeOfDay, TimePoint, MAX_OFFSET_MINUTES,
    NANOS_PER_DAY, NANOS_PER_SECOND, SECONDS_PER_DAY,
};
pub use value::Value;
pub use value_store::{ValueRange, ValueStore, ValueStoreIter};
