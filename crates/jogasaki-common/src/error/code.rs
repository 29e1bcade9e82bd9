//! Stable error codes.

use std::fmt;

/// Error codes for categorizing errors.
///
/// The numeric values are stable across versions and grouped by category in
/// the high byte, so clients may branch on either the exact code or the
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided by the caller.
    InvalidArgument = 0x0002,

    // Constraint errors (0x0100 - 0x01FF)
    /// A primary key or unique index already holds the key.
    UniqueConstraintViolation = 0x0100,
    /// NULL assigned to a NOT NULL column.
    NotNullConstraintViolation = 0x0101,
    /// Value exceeds the declared length or precision.
    ValueTooLong = 0x0102,
    /// A runtime value is not acceptable (e.g. exhausted sequence).
    InvalidRuntimeValue = 0x0103,

    // Evaluation errors (0x0200 - 0x02FF)
    /// Type mismatch or cast failure during evaluation.
    ValueEvaluationFailure = 0x0200,
    /// NaN, overflow or division by zero.
    ArithmeticError = 0x0201,

    // Catalog errors (0x0300 - 0x03FF)
    /// Named catalog object does not exist.
    TargetNotFound = 0x0300,
    /// Named catalog object already exists.
    TargetAlreadyExists = 0x0301,
    /// Symbol could not be resolved.
    SymbolAnalyze = 0x0302,
    /// Type analysis failed.
    TypeAnalyze = 0x0303,
    /// Syntax error reported by the compiler.
    Syntax = 0x0304,

    // Transaction / engine errors (0x0400 - 0x04FF)
    /// Transaction is already committed or aborted.
    InactiveTransaction = 0x0400,
    /// The storage engine reported an I/O failure.
    StorageIoError = 0x0401,
    /// Stored bytes could not be decoded.
    DataCorruption = 0x0402,
    /// The storage engine aborted the transaction.
    Aborted = 0x0403,

    // Capability errors (0x0500 - 0x05FF)
    /// The requested feature is not supported at runtime.
    UnsupportedRuntimeFeature = 0x0500,
    /// A placeholder was not bound before execution.
    UnresolvedPlaceholder = 0x0501,

    // Control errors (0x0600 - 0x06FF)
    /// The operation was canceled by the caller.
    OperationCanceled = 0x0600,
    /// The operation timed out.
    Timeout = 0x0601,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Constraint",
            0x02 => "Evaluation",
            0x03 => "Catalog",
            0x04 => "Transaction",
            0x05 => "Capability",
            0x06 => "Control",
            _ => "Unknown",
        }
    }

    /// Returns the symbolic name reported to SQL clients.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Internal => "internal_error",
            Self::InvalidArgument => "invalid_argument",
            Self::UniqueConstraintViolation => "unique_constraint_violation",
            Self::NotNullConstraintViolation => "not_null_constraint_violation",
            Self::ValueTooLong => "value_too_long",
            Self::InvalidRuntimeValue => "invalid_runtime_value",
            Self::ValueEvaluationFailure => "value_evaluation_failure",
            Self::ArithmeticError => "arithmetic_error",
            Self::TargetNotFound => "target_not_found",
            Self::TargetAlreadyExists => "target_already_exists",
            Self::SymbolAnalyze => "symbol_analyze",
            Self::TypeAnalyze => "type_analyze",
            Self::Syntax => "syntax",
            Self::InactiveTransaction => "inactive_transaction",
            Self::StorageIoError => "storage_io_error",
            Self::DataCorruption => "data_corruption",
            Self::Aborted => "aborted",
            Self::UnsupportedRuntimeFeature => "unsupported_runtime_feature",
            Self::UnresolvedPlaceholder => "unresolved_placeholder",
            Self::OperationCanceled => "operation_canceled",
            Self::Timeout => "timeout",
        }
    }

    /// Returns true if the error means the transaction can no longer be used.
    #[must_use]
    pub const fn is_transaction_fatal(&self) -> bool {
        matches!(
            self,
            Self::InactiveTransaction | Self::Aborted | Self::StorageIoError | Self::DataCorruption
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UniqueConstraintViolation.category(), "Constraint");
        assert_eq!(ErrorCode::ArithmeticError.category(), "Evaluation");
        assert_eq!(ErrorCode::TargetAlreadyExists.category(), "Catalog");
        assert_eq!(ErrorCode::InactiveTransaction.category(), "Transaction");
        assert_eq!(ErrorCode::UnresolvedPlaceholder.category(), "Capability");
        assert_eq!(ErrorCode::OperationCanceled.category(), "Control");
    }

    #[test]
    fn test_error_code_stable_values() {
        assert_eq!(ErrorCode::UniqueConstraintViolation.as_u16(), 0x0100);
        assert_eq!(ErrorCode::ValueTooLong.as_u16(), 0x0102);
        assert_eq!(ErrorCode::OperationCanceled.as_u16(), 0x0600);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::ValueTooLong.to_string(), "value_too_long");
        assert_eq!(
            ErrorCode::NotNullConstraintViolation.to_string(),
            "not_null_constraint_violation"
        );
    }
}
