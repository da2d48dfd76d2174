//! Contract analysis: extraction, trace simulation, candidate generation,
//! and verification.
//!
//! The stages compose as a pipeline over [`solguard_core`] types:
//! [`extract::extract`] builds a `ContractModel` from source, [`sim`] and
//! [`scenario`] produce execution traces, [`candidates`] proposes invariant
//! candidates, and [`verify`] classifies each as Holds, Violated, or
//! Indeterminate against the traces.

pub mod candidates;
pub mod error;
pub mod extract;
pub mod scenario;
pub mod sim;
pub mod suggest;
pub mod verify;

pub use candidates::{
    CandidateGenerator, CandidateStrategy, Coverage, InvariantCandidate, Provenance,
    RefinementHint,
};
pub use error::AnalysisError;
pub use extract::extract;
pub use scenario::{build_traces, symbolic_traces, ScenarioConfig};
pub use sim::{SimConfig, Simulator};
pub use suggest::{NullSuggester, PredicateSuggester, Suggestion};
pub use verify::{Verdict, VerificationResult, Verifier, VerifyConfig};
