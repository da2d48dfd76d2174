//! Invariant candidate generation.
//!
//! Candidates are proposed by a polymorphic strategy set: each heuristic is
//! an independent [`CandidateStrategy`] keyed by its provenance tag, never a
//! special-cased branch in one monolithic function. Generation is exploratory
//! and may produce false leads by design -- correctness is established only
//! by the verifier.
//!
//! Proposed predicates range over `pre.*`, `post.*`, parameters, and
//! environment terms exclusively; function locals are inlined via
//! let-substitution before a predicate is built.

mod delta;
mod derivation;
mod guard;

pub use delta::DeltaStrategy;
pub use derivation::DerivationStrategy;
pub use guard::GuardStrategy;

use std::collections::HashMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use solguard_core::model::{ContractModel, Expr, Statement};
use solguard_core::predicate::{Predicate, Term};
use solguard_core::snapshot::{Trace, TraceStep};
use solguard_core::CandidateId;
use tracing::debug;

/// Which heuristic produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Pre/post delta over a numeric state variable.
    Delta,
    /// Stored-vs-fresh inequality at function entry (reentrancy-style).
    Guard,
    /// State variable derived from a pure expression.
    Derivation,
    /// Proposed by the external predicate suggester.
    Suggested,
}

impl Provenance {
    pub fn tag(&self) -> &'static str {
        match self {
            Provenance::Delta => "delta-invariant",
            Provenance::Guard => "guard-invariant",
            Provenance::Derivation => "derivation-invariant",
            Provenance::Suggested => "suggested-invariant",
        }
    }
}

/// What trace coverage the verifier must see before this candidate may be
/// classified Holds. Insufficient coverage yields Indeterminate, never Holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coverage {
    /// No structural coverage requirement beyond evaluated steps.
    Plain,
    /// Both outcomes of the condition must appear among evaluated steps.
    Branch(Predicate),
    /// The guarded function must both revert and complete at least once.
    RevertAndComplete,
}

/// An unverified invariant candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCandidate {
    pub id: CandidateId,
    /// Name of the function this candidate constrains.
    pub function: String,
    /// Report heading, e.g. "Consecutive Wins Invariant".
    pub title: String,
    /// Natural-language description of the invariant.
    pub description: String,
    pub predicate: Predicate,
    pub provenance: Provenance,
    pub coverage: Coverage,
    /// Set once a candidate has been refined; blocks further retries.
    pub refined: bool,
}

/// Counterexample context handed back to a strategy when the verifier
/// rejects one of its candidates.
#[derive(Debug, Clone)]
pub struct RefinementHint {
    pub counterexample: Option<TraceStep>,
    pub reason: String,
}

/// A single candidate-proposal heuristic.
pub trait CandidateStrategy: Send + Sync {
    fn provenance(&self) -> Provenance;

    /// Proposes candidates for the model, optionally guided by example
    /// traces. Candidate IDs are assigned by the generator afterwards.
    fn propose(&self, model: &ContractModel, traces: &[Trace]) -> Vec<InvariantCandidate>;

    /// Produces a refined candidate from a rejected one. Default: no
    /// refinement.
    fn refine(
        &self,
        _candidate: &InvariantCandidate,
        _hint: &RefinementHint,
    ) -> Option<InvariantCandidate> {
        None
    }
}

/// Runs the strategy set and deduplicates the output by structural predicate
/// equality (blake3 fingerprint of the canonical rendering, scoped per
/// function). Insertion order is preserved.
pub struct CandidateGenerator {
    strategies: Vec<Box<dyn CandidateStrategy>>,
    next_id: u32,
    seen: HashSet<(String, [u8; 32])>,
}

impl CandidateGenerator {
    /// The built-in strategy set: delta, guard, derivation.
    pub fn new() -> Self {
        CandidateGenerator {
            strategies: vec![
                Box::new(DeltaStrategy),
                Box::new(GuardStrategy),
                Box::new(DerivationStrategy),
            ],
            next_id: 0,
            seen: HashSet::new(),
        }
    }

    pub fn generate(
        &mut self,
        model: &ContractModel,
        traces: &[Trace],
    ) -> Vec<InvariantCandidate> {
        let proposals: Vec<InvariantCandidate> = self
            .strategies
            .iter()
            .flat_map(|s| s.propose(model, traces))
            .collect();
        let mut out = Vec::new();
        for candidate in proposals {
            if let Some(c) = self.admit(candidate) {
                out.push(c);
            }
        }
        debug!(candidates = out.len(), "generated invariant candidates");
        out
    }

    /// Admits an externally proposed candidate (suggester path) through the
    /// same dedup gate as the built-in strategies.
    pub fn admit(&mut self, mut candidate: InvariantCandidate) -> Option<InvariantCandidate> {
        let key = (candidate.function.clone(), candidate.predicate.fingerprint());
        if !self.seen.insert(key) {
            return None;
        }
        candidate.id = CandidateId(self.next_id);
        self.next_id += 1;
        Some(candidate)
    }

    /// One-shot refinement of a rejected candidate through its originating
    /// strategy. Returns `None` when the candidate was already refined once
    /// or its strategy declines.
    pub fn refine(
        &mut self,
        candidate: &InvariantCandidate,
        hint: &RefinementHint,
    ) -> Option<InvariantCandidate> {
        if candidate.refined {
            return None;
        }
        let strategy = self
            .strategies
            .iter()
            .find(|s| s.provenance() == candidate.provenance)?;
        let mut refined = strategy.refine(candidate, hint)?;
        // The tracking form can be fingerprint-identical to an earlier
        // strategy proposal; the retry must still run, so skip the dedup
        // gate and only record the fingerprint for later admissions.
        self.seen
            .insert((refined.function.clone(), refined.predicate.fingerprint()));
        refined.id = CandidateId(self.next_id);
        self.next_id += 1;
        Some(refined)
    }
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        CandidateGenerator::new()
    }
}

// ----- shared helpers for strategies ---------------------------------------

/// Walks a body's top-level statements building a map from local name to its
/// defining expression with earlier locals already substituted. Branch-scoped
/// locals are not tracked; strategies only inline entry-block computations.
pub(crate) fn toplevel_locals(body: &[Statement]) -> HashMap<String, Expr> {
    let mut locals: HashMap<String, Expr> = HashMap::new();
    for stmt in body {
        if let Statement::Local { name, init, .. } = stmt {
            let inlined = substitute_locals(init, &locals);
            locals.insert(name.clone(), inlined);
        }
    }
    locals
}

fn substitute_locals(expr: &Expr, locals: &HashMap<String, Expr>) -> Expr {
    match expr {
        Expr::Local(name) => locals
            .get(name)
            .cloned()
            .unwrap_or_else(|| Expr::Local(name.clone())),
        Expr::BlockHash(e) => Expr::BlockHash(Box::new(substitute_locals(e, locals))),
        Expr::Cast { ty, expr } => Expr::Cast {
            ty: *ty,
            expr: Box::new(substitute_locals(expr, locals)),
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op: *op,
            expr: Box::new(substitute_locals(expr, locals)),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(substitute_locals(lhs, locals)),
            rhs: Box::new(substitute_locals(rhs, locals)),
        },
        other => other.clone(),
    }
}

/// Converts a body expression to a predicate term with state reads anchored
/// to the pre-state and locals inlined. Returns `None` when a local cannot
/// be resolved (declared inside a branch).
pub(crate) fn expr_to_pre_term(expr: &Expr, locals: &HashMap<String, Expr>) -> Option<Term> {
    match substitute_locals(expr, locals) {
        Expr::Int(v) => Some(Term::Int(v)),
        Expr::Bool(b) => Some(Term::Bool(b)),
        Expr::State(name) => Some(Term::Pre(name)),
        Expr::Param(name) => Some(Term::Param(name)),
        Expr::Local(_) => None,
        Expr::Env(t) => Some(Term::Env(t)),
        Expr::BlockHash(e) => Some(Term::BlockHash(Box::new(expr_to_pre_term(&e, locals)?))),
        Expr::Cast { expr, .. } => expr_to_pre_term(&expr, locals),
        Expr::Unary { op, expr } => Some(Term::Unary {
            op,
            term: Box::new(expr_to_pre_term(&expr, locals)?),
        }),
        Expr::Binary { op, lhs, rhs } => Some(Term::Binary {
            op,
            lhs: Box::new(expr_to_pre_term(&lhs, locals)?),
            rhs: Box::new(expr_to_pre_term(&rhs, locals)?),
        }),
    }
}

/// "consecutiveWins" -> "Consecutive Wins", "last_hash" -> "Last Hash".
pub(crate) fn humanize(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' {
            if !current.is_empty() {
                words.push(current.clone());
                current.clear();
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(current.clone());
            current.clear();
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recursively finds all assignments to state variable `var` in a body.
pub(crate) fn assignments_to<'a>(body: &'a [Statement], var: &str) -> Vec<&'a Expr> {
    let mut out = Vec::new();
    collect_assignments(body, var, &mut out);
    out
}

fn collect_assignments<'a>(body: &'a [Statement], var: &str, out: &mut Vec<&'a Expr>) {
    for stmt in body {
        match stmt {
            Statement::Assign { target, value } => {
                if let solguard_core::model::AssignTarget::State(name) = target {
                    if name == var {
                        out.push(value);
                    }
                }
            }
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_assignments(then_branch, var, out);
                collect_assignments(else_branch, var, out);
            }
            _ => {}
        }
    }
}
