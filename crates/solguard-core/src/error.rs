//! Core error types for solguard-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! evaluation and trace-model failure modes shared by every pipeline stage.

use thiserror::Error;

/// Core errors produced by the solguard-core crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A snapshot lookup referenced a variable the model does not declare.
    #[error("unknown state variable: '{name}'")]
    UnknownVariable { name: String },

    /// Operand types did not match the operator.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Concrete integer division or modulo by zero.
    #[error("divide by zero")]
    DivideByZero,

    /// Concrete arithmetic exceeded the i128 domain.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Adjacent trace steps disagree on the intermediate state.
    #[error("trace continuity broken after step {step}")]
    TraceDiscontinuity { step: usize },
}
