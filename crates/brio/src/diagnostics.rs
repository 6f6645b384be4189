use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source position carried on every AST node. 1-based line and column;
/// both zero for synthetic nodes that never came from a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const SYNTHETIC: Position = Position { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0 && self.column == 0
    }

    /// Suffix for error messages: `" at 3:14"`, or empty for synthetic nodes.
    pub fn describe(&self) -> String {
        if self.is_synthetic() {
            String::new()
        } else {
            format!(" at {}:{}", self.line, self.column)
        }
    }
}

/// Discriminant-only view of [`RuntimeError`], for drivers and tests that
/// dispatch on the failure family without caring about the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeMismatch,
    InvalidOperator,
    DivisionByZero,
    CurrencyMismatch,
    UndefinedName,
    ArgumentMismatch,
    InvalidCallTarget,
    InvalidAssignmentTarget,
    IndexOutOfRange,
    ReturnOutsideFunction,
    ConstraintViolation,
    HealingOverflow,
    InvalidValue,
    ResourceExhausted,
}

/// Every failure the runtime can surface. Messages embed the offending
/// source position when one exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid operator: {0}")]
    InvalidOperator(String),
    #[error("division by zero: {0}")]
    DivisionByZero(String),
    #[error("currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("undefined name: {0}")]
    UndefinedName(String),
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),
    #[error("invalid call target: {0}")]
    InvalidCallTarget(String),
    #[error("invalid assignment target: {0}")]
    InvalidAssignmentTarget(String),
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),
    #[error("return outside function: {0}")]
    ReturnOutsideFunction(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("healing overflow: {0}")]
    HealingOverflow(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            RuntimeError::InvalidOperator(_) => ErrorKind::InvalidOperator,
            RuntimeError::DivisionByZero(_) => ErrorKind::DivisionByZero,
            RuntimeError::CurrencyMismatch(_) => ErrorKind::CurrencyMismatch,
            RuntimeError::UndefinedName(_) => ErrorKind::UndefinedName,
            RuntimeError::ArgumentMismatch(_) => ErrorKind::ArgumentMismatch,
            RuntimeError::InvalidCallTarget(_) => ErrorKind::InvalidCallTarget,
            RuntimeError::InvalidAssignmentTarget(_) => ErrorKind::InvalidAssignmentTarget,
            RuntimeError::IndexOutOfRange(_) => ErrorKind::IndexOutOfRange,
            RuntimeError::ReturnOutsideFunction(_) => ErrorKind::ReturnOutsideFunction,
            RuntimeError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            RuntimeError::HealingOverflow(_) => ErrorKind::HealingOverflow,
            RuntimeError::InvalidValue(_) => ErrorKind::InvalidValue,
            RuntimeError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_positions_render_empty() {
        assert_eq!(Position::SYNTHETIC.describe(), "");
        assert_eq!(Position::new(3, 14).describe(), " at 3:14");
    }

    #[test]
    fn error_kind_matches_variant() {
        let err = RuntimeError::CurrencyMismatch("USD vs EUR".to_string());
        assert_eq!(err.kind(), ErrorKind::CurrencyMismatch);
        assert_eq!(err.to_string(), "currency mismatch: USD vs EUR");
    }
}
