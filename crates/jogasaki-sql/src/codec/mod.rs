//! Row codec.
//!
//! Records are encoded field by field with one of two stream kinds:
//!
//! - **Key** streams are order-preserving: comparing two encoded keys with
//!   `memcmp` gives the same result as comparing the values, honoring each
//!   field's direction and null placement.
//! - **Value** streams are compact and not comparable; the primary-index
//!   value starts with a format version byte.
//!
//! ```text
//!  key   │ null? │ value bytes (complemented when DESC) │ null? │ ...
//!  value │ ver │ flag │ value bytes │ flag │ value bytes │ ...
//! ```

mod key;
mod record;
mod stream;
mod value;

use jogasaki_common::{ErrorCode, ErrorInfo};
use thiserror::Error;

use crate::meta::FieldTypeKind;

pub use key::{decode_key_field, encode_key_field};
pub use record::{FieldOp, RecordCodec};
pub use stream::{encode_with_retry, ReadableStream, WritableStream};
pub use value::{decode_value_field, encode_value_field};

/// Errors raised while encoding or decoding records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Stored bytes do not decode.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The output buffer is smaller than the encoded size.
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes the encoding needs.
        required: usize,
        /// Bytes the buffer holds.
        available: usize,
    },

    /// The kind cannot be part of a key.
    #[error("{0} cannot be used as a key")]
    UnsupportedKeyType(FieldTypeKind),

    /// A value does not match the field kind.
    #[error("expected {expected} value, got {actual}")]
    TypeMismatch {
        /// Field kind.
        expected: FieldTypeKind,
        /// Value kind.
        actual: FieldTypeKind,
    },

    /// NULL for a field declared NOT NULL.
    #[error("null assigned to non-nullable field {0}")]
    NullInNonNullable(usize),

    /// A LOB reference that was never registered.
    #[error("lob reference is not resolved")]
    UnresolvedLob,

    /// Value stream written by an unknown format.
    #[error("unknown value format version {0}")]
    UnknownFormatVersion(u8),
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

impl From<CodecError> for ErrorInfo {
    fn from(err: CodecError) -> Self {
        let code = match &err {
            CodecError::DataCorruption(_) | CodecError::UnknownFormatVersion(_) => {
                ErrorCode::DataCorruption
            }
            CodecError::BufferTooSmall { .. } => ErrorCode::Internal,
            CodecError::UnsupportedKeyType(_) => ErrorCode::UnsupportedRuntimeFeature,
            CodecError::TypeMismatch { .. } => ErrorCode::ValueEvaluationFailure,
            CodecError::NullInNonNullable(_) => ErrorCode::NotNullConstraintViolation,
            CodecError::UnresolvedLob => ErrorCode::InvalidRuntimeValue,
        };
        ErrorInfo::new(code, err.to_string())
    }
}

/// Sort direction of a key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Ascending.
    #[default]
    Ascending,
    /// Descending.
    Descending,
}

/// Placement of NULL relative to other values, before direction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NullOrder {
    /// NULL sorts before every value.
    #[default]
    First,
    /// NULL sorts after every value.
    Last,
}

/// Kind of stream a field is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Order-preserving key stream.
    Key,
    /// Compact value stream.
    Value,
}

/// How a single field is coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodingSpec {
    /// Stream kind.
    pub stream: StreamKind,
    /// Direction; ignored for value streams.
    pub order: Order,
    /// Null placement; ignored for value streams.
    pub null_order: NullOrder,
}

impl CodingSpec {
    /// Ascending key, NULL first.
    pub const KEY_ASCENDING: Self = Self {
        stream: StreamKind::Key,
        order: Order::Ascending,
        null_order: NullOrder::First,
    };

    /// Descending key, NULL first.
    pub const KEY_DESCENDING: Self = Self {
        stream: StreamKind::Key,
        order: Order::Descending,
        null_order: NullOrder::First,
    };

    /// Value stream.
    pub const VALUE: Self = Self {
        stream: StreamKind::Value,
        order: Order::Ascending,
        null_order: NullOrder::First,
    };

    /// Key spec for `order` with NULL first.
    #[must_use]
    pub const fn key(order: Order) -> Self {
        Self {
            stream: StreamKind::Key,
            order,
            null_order: NullOrder::First,
        }
    }

    /// Returns the byte mask applied to key bytes.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> u8 {
        match self.order {
            Order::Ascending => 0x00,
            Order::Descending => 0xff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let info: ErrorInfo = CodecError::DataCorruption("x".into()).into();
        assert_eq!(info.code(), ErrorCode::DataCorruption);
        let info: ErrorInfo = CodecError::UnknownFormatVersion(9).into();
        assert_eq!(info.code(), ErrorCode::DataCorruption);
        let info: ErrorInfo = CodecError::UnsupportedKeyType(FieldTypeKind::Blob).into();
        assert_eq!(info.code(), ErrorCode::UnsupportedRuntimeFeature);
        let info: ErrorInfo = CodecError::NullInNonNullable(0).into();
        assert_eq!(info.code(), ErrorCode::NotNullConstraintViolation);
    }

    #[test]
    fn test_masks() {
        assert_eq!(CodingSpec::KEY_ASCENDING.mask(), 0);
        assert_eq!(CodingSpec::KEY_DESCENDING.mask(), 0xff);
        assert_eq!(CodingSpec::key(Order::Descending), CodingSpec::KEY_DESCENDING);
    }
}
