//! Structured error information.

use thiserror::Error;

use super::ErrorCode;

/// A structured error surfaced by statement execution.
///
/// Carries a stable code, a human readable message, and an optional
/// supplemental text.
///
/// # Example
///
/// ```rust
/// use jogasaki_common::error::{ErrorCode, ErrorInfo};
///
/// let err = ErrorInfo::new(ErrorCode::TargetNotFound, "table 'T' not found");
/// assert_eq!(err.code(), ErrorCode::TargetNotFound);
/// assert_eq!(err.to_string(), "target_not_found: table 'T' not found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ErrorInfo {
    code: ErrorCode,
    message: String,
    supplemental_text: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            supplemental_text: None,
        }
    }

    /// Attaches supplemental text.
    #[must_use]
    pub fn with_supplemental_text(mut self, text: impl Into<String>) -> Self {
        self.supplemental_text = Some(text.into());
        self
    }

    /// Returns the error code.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the supplemental text, if any.
    #[must_use]
    pub fn supplemental_text(&self) -> Option<&str> {
        self.supplemental_text.as_deref()
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Creates a target-not-found error.
    #[must_use]
    pub fn target_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TargetNotFound, message)
    }

    /// Creates an unsupported-feature error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedRuntimeFeature, message)
    }

    /// Creates a canceled error.
    #[must_use]
    pub fn canceled() -> Self {
        Self::new(ErrorCode::OperationCanceled, "operation canceled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_display() {
        let err = ErrorInfo::new(ErrorCode::ValueTooLong, "lost precision on VC");
        assert_eq!(err.to_string(), "value_too_long: lost precision on VC");
        assert_eq!(err.message(), "lost precision on VC");
        assert!(err.supplemental_text().is_none());
    }

    #[test]
    fn test_error_info_supplemental() {
        let err = ErrorInfo::canceled().with_supplemental_text("canceled by client");
        assert_eq!(err.code(), ErrorCode::OperationCanceled);
        assert_eq!(err.supplemental_text(), Some("canceled by client"));
    }
}
