//! Candidate verification against simulated traces.
//!
//! Each candidate is evaluated independently over every completed step of
//! every trace. Concrete evaluation decides True/False outright; symbolic
//! steps contribute a verdict only when the predicate simplifies to a
//! constant -- an unresolved residue is treated as "not contradicted" and
//! neither supports nor blocks the candidate. Insufficient coverage yields
//! Indeterminate, never Holds.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use solguard_core::model::{ContractModel, Function};
use solguard_core::predicate::{EvalContext, Outcome, Predicate};
use solguard_core::snapshot::{Invocation, Trace, TraceStep};
use solguard_core::Value;

use crate::candidates::{
    CandidateGenerator, Coverage, InvariantCandidate, Provenance, RefinementHint,
};

#[derive(Debug, Clone, Copy)]
pub struct VerifyConfig {
    /// Per-candidate cap on predicate evaluations.
    pub max_evaluations: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        VerifyConfig {
            max_evaluations: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Holds,
    Violated,
    Indeterminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub candidate: InvariantCandidate,
    pub verdict: Verdict,
    /// Present exactly when the verdict is Violated.
    pub counterexample: Option<TraceStep>,
    /// Present for Indeterminate verdicts.
    pub reason: Option<String>,
}

impl VerificationResult {
    fn holds(candidate: InvariantCandidate) -> Self {
        VerificationResult {
            candidate,
            verdict: Verdict::Holds,
            counterexample: None,
            reason: None,
        }
    }

    fn violated(candidate: InvariantCandidate, step: TraceStep) -> Self {
        VerificationResult {
            candidate,
            verdict: Verdict::Violated,
            counterexample: Some(step),
            reason: None,
        }
    }

    fn indeterminate(candidate: InvariantCandidate, reason: impl Into<String>) -> Self {
        VerificationResult {
            candidate,
            verdict: Verdict::Indeterminate,
            counterexample: None,
            reason: Some(reason.into()),
        }
    }
}

pub struct Verifier<'a> {
    model: &'a ContractModel,
    config: VerifyConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(model: &'a ContractModel) -> Self {
        Verifier {
            model,
            config: VerifyConfig::default(),
        }
    }

    pub fn with_config(model: &'a ContractModel, config: VerifyConfig) -> Self {
        Verifier { model, config }
    }

    pub fn verify(&self, candidate: &InvariantCandidate, traces: &[Trace]) -> VerificationResult {
        let function = match self.model.function_by_name(&candidate.function) {
            Some(f) => f,
            None => {
                return VerificationResult::indeterminate(
                    candidate.clone(),
                    format!("function `{}` not present in the model", candidate.function),
                )
            }
        };

        let mut evaluated = 0usize;
        let mut reverted_seen = 0usize;
        let mut cond_true = 0usize;
        let mut cond_false = 0usize;
        let mut residues = 0usize;

        for trace in traces {
            for step in &trace.steps {
                if step.invocation.function != candidate.function {
                    continue;
                }
                if !step.completed {
                    reverted_seen += 1;
                    continue;
                }
                if evaluated >= self.config.max_evaluations {
                    return VerificationResult::indeterminate(
                        candidate.clone(),
                        format!(
                            "evaluation budget of {} exhausted",
                            self.config.max_evaluations
                        ),
                    );
                }
                evaluated += 1;

                let params = match bind_params(function, &step.invocation) {
                    Ok(p) => p,
                    Err(reason) => {
                        return VerificationResult::indeterminate(candidate.clone(), reason)
                    }
                };
                let symbolic = step.invocation.args.iter().any(Value::is_symbolic);
                let ctx = EvalContext {
                    pre: &step.pre,
                    post: &step.post,
                    params: &params,
                    env: step.invocation.env(step.pre.seq, symbolic),
                };
                match candidate.predicate.eval(&ctx) {
                    Ok(Outcome::True) => {
                        if let Coverage::Branch(cond) = &candidate.coverage {
                            tally_branch(cond, &ctx, &mut cond_true, &mut cond_false);
                        }
                    }
                    Ok(Outcome::False) => {
                        info!(
                            candidate = %candidate.id,
                            step = step.pre.seq,
                            "candidate violated"
                        );
                        return VerificationResult::violated(candidate.clone(), step.clone());
                    }
                    Ok(Outcome::Unknown(residue)) => {
                        // not contradicted under this symbolic path
                        debug!(candidate = %candidate.id, residue = %residue, "symbolic residue");
                        residues += 1;
                    }
                    Err(err) => {
                        return VerificationResult::indeterminate(
                            candidate.clone(),
                            format!("predicate evaluation failed: {}", err),
                        )
                    }
                }
            }
        }

        if evaluated == 0 {
            return VerificationResult::indeterminate(
                candidate.clone(),
                "no trace completes a call to the guarded function",
            );
        }
        if evaluated == residues {
            return VerificationResult::indeterminate(
                candidate.clone(),
                "every evaluation left a symbolic residue",
            );
        }
        match &candidate.coverage {
            Coverage::Plain => VerificationResult::holds(candidate.clone()),
            Coverage::Branch(_) => {
                if cond_true == 0 || cond_false == 0 {
                    let side = if cond_true == 0 { "true" } else { "false" };
                    VerificationResult::indeterminate(
                        candidate.clone(),
                        format!("branch condition never observed {}", side),
                    )
                } else {
                    VerificationResult::holds(candidate.clone())
                }
            }
            Coverage::RevertAndComplete => {
                if reverted_seen == 0 {
                    VerificationResult::indeterminate(
                        candidate.clone(),
                        "guard branch never exercised: no invocation reverted",
                    )
                } else {
                    VerificationResult::holds(candidate.clone())
                }
            }
        }
    }

    /// Verifies every candidate independently, then retries rejected
    /// guard-provenance candidates once through the generator's refinement
    /// path. Refined results are appended after their originals.
    pub fn verify_all(
        &self,
        candidates: &[InvariantCandidate],
        traces: &[Trace],
        generator: &mut CandidateGenerator,
    ) -> Vec<VerificationResult> {
        let mut results: Vec<VerificationResult> = candidates
            .iter()
            .map(|c| self.verify(c, traces))
            .collect();

        let mut refined_results = Vec::new();
        for result in &results {
            if result.verdict == Verdict::Holds {
                continue;
            }
            if result.candidate.provenance != Provenance::Guard || result.candidate.refined {
                continue;
            }
            let hint = RefinementHint {
                counterexample: result.counterexample.clone(),
                reason: result
                    .reason
                    .clone()
                    .unwrap_or_else(|| "violated".to_string()),
            };
            if let Some(refined) = generator.refine(&result.candidate, &hint) {
                info!(
                    original = %result.candidate.id,
                    refined = %refined.id,
                    "retrying refined guard candidate"
                );
                refined_results.push(self.verify(&refined, traces));
            }
        }
        results.extend(refined_results);
        results
    }
}

fn bind_params(
    function: &Function,
    invocation: &Invocation,
) -> Result<IndexMap<String, Value>, String> {
    if function.params.len() != invocation.args.len() {
        return Err(format!(
            "`{}` expects {} argument(s), invocation supplied {}",
            function.name,
            function.params.len(),
            invocation.args.len()
        ));
    }
    Ok(function
        .params
        .iter()
        .zip(&invocation.args)
        .map(|((name, _), value)| (name.clone(), value.clone()))
        .collect())
}

fn tally_branch(
    cond: &Predicate,
    ctx: &EvalContext<'_>,
    cond_true: &mut usize,
    cond_false: &mut usize,
) {
    match cond.eval(ctx) {
        Ok(Outcome::True) => *cond_true += 1,
        Ok(Outcome::False) => *cond_false += 1,
        _ => {}
    }
}
