//! External predicate suggestion boundary.
//!
//! A [`PredicateSuggester`] proposes additional structured predicates for a
//! contract, typically backed by an LLM service. Suggestions enter the
//! pipeline as ordinary candidates with `Suggested` provenance and are
//! verified exactly like heuristic candidates -- a suggestion is never
//! trusted, only proposed.

use serde::{Deserialize, Serialize};

use solguard_core::model::ContractModel;
use solguard_core::predicate::Predicate;
use solguard_core::CandidateId;

use crate::candidates::{Coverage, InvariantCandidate, Provenance};
use crate::error::AnalysisError;

/// A structured predicate proposal for one function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Function the predicate constrains.
    pub function: String,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    pub predicate: Predicate,
}

impl Suggestion {
    pub fn into_candidate(self) -> InvariantCandidate {
        InvariantCandidate {
            id: CandidateId(0),
            title: self
                .title
                .unwrap_or_else(|| format!("Suggested Invariant for `{}`", self.function)),
            function: self.function,
            description: self.description,
            predicate: self.predicate,
            provenance: Provenance::Suggested,
            coverage: Coverage::Plain,
            refined: false,
        }
    }
}

pub trait PredicateSuggester {
    /// Proposes predicates for the contract. `source` is the verbatim
    /// contract text; `model` the extracted form. Suggestions naming unknown
    /// functions or state are filtered out downstream by verification.
    fn suggest(
        &self,
        source: &str,
        model: &ContractModel,
    ) -> Result<Vec<Suggestion>, AnalysisError>;
}

/// Suggester used when no external service is configured.
pub struct NullSuggester;

impl PredicateSuggester for NullSuggester {
    fn suggest(
        &self,
        _source: &str,
        _model: &ContractModel,
    ) -> Result<Vec<Suggestion>, AnalysisError> {
        Ok(Vec::new())
    }
}
