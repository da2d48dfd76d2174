//! Core types for contract invariant analysis.
//!
//! Defines the extracted contract model (state, functions, expression AST),
//! the value domain shared by concrete and symbolic simulation, execution
//! traces with append-only state snapshots, and the predicate language that
//! invariant candidates are written in. Pure data and evaluation -- no I/O,
//! no pipeline logic.

pub mod error;
pub mod id;
pub mod model;
pub mod predicate;
pub mod snapshot;
pub mod value;

// Re-export commonly used types
pub use error::CoreError;
pub use id::{CandidateId, FunctionId};
pub use model::{
    AssignTarget, BinOp, ContractModel, EnvTerm, Expr, Function, StateVariable, Statement, UnOp,
    VarType, Visibility,
};
pub use predicate::{EvalContext, Outcome, Predicate, Term};
pub use snapshot::{CallEnv, Invocation, StateSnapshot, Trace, TraceStep};
pub use value::{SymExpr, Value};
