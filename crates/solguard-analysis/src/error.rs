//! Analysis error taxonomy.
//!
//! Fatal errors (`Parse`, `UnknownFunction`, `StateDivergence`) abort the run
//! and surface the offending identifier and source location verbatim.
//! `BudgetExceeded` is recoverable at the verifier level: the affected
//! candidate is marked Indeterminate and the run continues.

use solguard_core::CoreError;
use thiserror::Error;

/// Errors produced by the extraction, simulation, and verification stages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// Source text does not conform to the contract grammar. Fatal.
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
    },

    /// An invocation referenced a function absent from the model. Fatal.
    #[error("unknown function: '{name}'")]
    UnknownFunction { name: String },

    /// A simulated write touched a variable the model does not declare.
    /// Fatal -- indicates a model extraction gap, not retried.
    #[error("state divergence: function '{function}' wrote undeclared variable '{variable}'")]
    StateDivergence { variable: String, function: String },

    /// An invocation bound the wrong number or type of arguments. Fatal.
    #[error("invalid invocation of '{function}': {reason}")]
    BadInvocation { function: String, reason: String },

    /// The bounded exploration budget was exhausted. Recoverable: the
    /// affected candidate is marked Indeterminate.
    #[error("exploration budget exceeded: {consumed} steps (budget {budget})")]
    BudgetExceeded { consumed: usize, budget: usize },

    /// Evaluation-level failure bubbled up from the core value domain.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The external predicate suggester misbehaved (transport or schema).
    /// Recoverable: suggestions are optional input.
    #[error("suggester failure: {0}")]
    Suggester(String),
}

impl AnalysisError {
    pub fn parse(line: u32, column: u32, message: impl Into<String>) -> Self {
        AnalysisError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    /// `true` for errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::Parse { .. }
                | AnalysisError::UnknownFunction { .. }
                | AnalysisError::StateDivergence { .. }
                | AnalysisError::BadInvocation { .. }
        )
    }
}
