//! Stable ID newtypes for engine entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `FunctionId` cannot be accidentally used where a `CandidateId`
//! is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a function within its [`ContractModel`](crate::model::ContractModel),
/// in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

/// Identity of an invariant candidate within a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
