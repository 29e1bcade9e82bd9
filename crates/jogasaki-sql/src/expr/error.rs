use jogasaki_common::{ErrorCode, ErrorInfo};
use thiserror::Error;

use crate::conv::CastError;
use crate::data::DecimalError;

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Division by zero, overflow, NaN or invalid temporal components.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    /// Operand types cannot be reconciled.
    #[error("value evaluation failure: {0}")]
    ValueEvaluation(String),
    /// A cast failed.
    #[error(transparent)]
    Cast(#[from] CastError),
    /// The expression needs state the evaluator does not have.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A placeholder was evaluated before being bound.
    #[error("unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),
}

/// Result of an evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

impl From<DecimalError> for EvalError {
    fn from(err: DecimalError) -> Self {
        EvalError::Arithmetic(err.to_string())
    }
}

impl From<EvalError> for ErrorInfo {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Cast(cast) => cast.into(),
            EvalError::Arithmetic(_) => ErrorInfo::new(ErrorCode::ArithmeticError, err.to_string()),
            EvalError::ValueEvaluation(_) => {
                ErrorInfo::new(ErrorCode::ValueEvaluationFailure, err.to_string())
            }
            EvalError::Unsupported(_) => {
                ErrorInfo::new(ErrorCode::UnsupportedRuntimeFeature, err.to_string())
            }
            EvalError::UnresolvedPlaceholder(_) => {
                ErrorInfo::new(ErrorCode::UnresolvedPlaceholder, err.to_string())
            }
        }
    }
}
