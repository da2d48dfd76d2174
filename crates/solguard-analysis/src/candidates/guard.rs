//! Guard heuristic: stored-vs-fresh inequality at function entry.
//!
//! A function that compares a state variable against a freshly computed
//! value and reverts on equality is treated as a replay/reentrancy guard.
//! The proposed invariant asserts the inequality over every completed call;
//! the verifier additionally requires the guard to both fire and pass at
//! least once before the candidate may be classified Holds.

use std::collections::HashMap;

use solguard_core::model::{AssignTarget, BinOp, ContractModel, Expr, Function, Statement};
use solguard_core::predicate::{Predicate, Term};
use solguard_core::snapshot::Trace;
use solguard_core::CandidateId;

use super::{
    expr_to_pre_term, humanize, CandidateStrategy, Coverage, InvariantCandidate, Provenance,
    RefinementHint,
};

pub struct GuardStrategy;

impl CandidateStrategy for GuardStrategy {
    fn provenance(&self) -> Provenance {
        Provenance::Guard
    }

    fn propose(&self, model: &ContractModel, _traces: &[Trace]) -> Vec<InvariantCandidate> {
        let mut out = Vec::new();
        for function in &model.functions {
            out.extend(entry_guards(model, function));
        }
        out
    }

    /// A rejected inequality guard is retried once in its tracking form:
    /// instead of asserting the stored value differs from the fresh one on
    /// entry, assert the stored value equals the fresh one on exit. That is
    /// the property that makes the guard effective on the next call.
    fn refine(
        &self,
        candidate: &InvariantCandidate,
        _hint: &RefinementHint,
    ) -> Option<InvariantCandidate> {
        let (var, fresh) = match &candidate.predicate {
            Predicate::Atom(Term::Binary { op: BinOp::Ne, lhs, rhs }) => match (&**lhs, &**rhs) {
                (Term::Pre(var), fresh) => (var.clone(), fresh.clone()),
                (fresh, Term::Pre(var)) => (var.clone(), fresh.clone()),
                _ => return None,
            },
            _ => return None,
        };
        Some(InvariantCandidate {
            id: CandidateId(0),
            function: candidate.function.clone(),
            title: format!("{} Tracking", humanize(&var)),
            description: format!(
                "`{}` always holds the freshly computed value after a completed call.",
                var
            ),
            predicate: Predicate::atom(Term::binary(
                BinOp::Eq,
                Term::Post(var),
                fresh,
            )),
            provenance: Provenance::Guard,
            coverage: Coverage::Plain,
            refined: true,
        })
    }
}

/// Scans the entry block, stopping at the first state write, for either
/// `if (stored == fresh) { revert; }` or `require(stored != fresh)` where
/// `stored` is a state variable the function later overwrites.
fn entry_guards(model: &ContractModel, function: &Function) -> Vec<InvariantCandidate> {
    let mut out = Vec::new();
    let mut locals: HashMap<String, Expr> = HashMap::new();
    for stmt in &function.body {
        match stmt {
            Statement::Local { name, init, .. } => {
                let inlined = resolve(init, &locals);
                locals.insert(name.clone(), inlined);
            }
            Statement::Assign {
                target: AssignTarget::State(_),
                ..
            } => break,
            Statement::If {
                cond, then_branch, ..
            } => {
                if !branch_reverts(then_branch) {
                    continue;
                }
                if let Expr::Binary { op: BinOp::Eq, lhs, rhs } = cond {
                    if let Some(c) = guard_candidate(model, function, lhs, rhs, &locals) {
                        out.push(c);
                    }
                }
            }
            Statement::Require { cond, .. } => {
                if let Expr::Binary { op: BinOp::Ne, lhs, rhs } = cond {
                    if let Some(c) = guard_candidate(model, function, lhs, rhs, &locals) {
                        out.push(c);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn resolve(expr: &Expr, locals: &HashMap<String, Expr>) -> Expr {
    match expr {
        Expr::Local(name) => locals.get(name).cloned().unwrap_or_else(|| expr.clone()),
        Expr::BlockHash(e) => Expr::BlockHash(Box::new(resolve(e, locals))),
        Expr::Cast { ty, expr } => Expr::Cast {
            ty: *ty,
            expr: Box::new(resolve(expr, locals)),
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op: *op,
            expr: Box::new(resolve(expr, locals)),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(resolve(lhs, locals)),
            rhs: Box::new(resolve(rhs, locals)),
        },
        other => other.clone(),
    }
}

fn branch_reverts(branch: &[Statement]) -> bool {
    branch.iter().any(|s| {
        matches!(s, Statement::Revert)
            || matches!(s, Statement::Require { cond: Expr::Bool(false), .. })
    })
}

fn guard_candidate(
    model: &ContractModel,
    function: &Function,
    lhs: &Expr,
    rhs: &Expr,
    locals: &HashMap<String, Expr>,
) -> Option<InvariantCandidate> {
    let lhs = resolve(lhs, locals);
    let rhs = resolve(rhs, locals);
    let (var, fresh) = match (&lhs, &rhs) {
        (Expr::State(name), fresh) => (name.clone(), fresh),
        (fresh, Expr::State(name)) => (name.clone(), fresh),
        _ => return None,
    };
    // only stored values the function refreshes behave like a guard
    if !function.writes.contains(&var) {
        return None;
    }
    if model.state_var(&var)?.constant.is_some() {
        return None;
    }
    let fresh_term = expr_to_pre_term(fresh, locals)?;
    Some(InvariantCandidate {
        id: CandidateId(0),
        function: function.name.clone(),
        title: format!("{} Reentrancy Guard", humanize(&var)),
        description: format!(
            "Every completed call observes `{}` different from the freshly computed `{}`, so an immediate replay in the same block reverts.",
            var, fresh_term,
        ),
        predicate: Predicate::atom(Term::binary(
            BinOp::Ne,
            Term::Pre(var),
            fresh_term,
        )),
        provenance: Provenance::Guard,
        coverage: Coverage::RevertAndComplete,
        refined: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    const GUARDED: &str = r#"
        contract Flip {
            uint256 lastHash;
            uint256 public wins;
            function flip(bool guess) public returns (bool) {
                uint256 fresh = uint256(blockhash(block.number - 1));
                if (lastHash == fresh) {
                    revert();
                }
                lastHash = fresh;
                if (guess) {
                    wins++;
                } else {
                    wins = 0;
                }
                return true;
            }
        }
    "#;

    #[test]
    fn entry_revert_guard_is_proposed() {
        let model = extract(GUARDED).unwrap();
        let candidates = GuardStrategy.propose(&model, &[]);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.function, "flip");
        assert_eq!(c.title, "Last Hash Reentrancy Guard");
        assert_eq!(
            c.predicate.to_string(),
            "pre.lastHash != blockhash(block.number - 1)"
        );
        assert_eq!(c.coverage, Coverage::RevertAndComplete);
    }

    #[test]
    fn require_form_is_proposed() {
        let src = r#"
            contract C {
                uint256 seen;
                function step(uint256 x) public {
                    require(seen != x, "replay");
                    seen = x;
                }
            }
        "#;
        let model = extract(src).unwrap();
        let candidates = GuardStrategy.propose(&model, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].predicate.to_string(), "pre.seen != x");
    }

    #[test]
    fn comparison_after_state_write_is_not_a_guard() {
        let src = r#"
            contract C {
                uint256 seen;
                function step(uint256 x) public {
                    seen = x;
                    if (seen == x) {
                        revert();
                    }
                }
            }
        "#;
        let model = extract(src).unwrap();
        assert!(GuardStrategy.propose(&model, &[]).is_empty());
    }

    #[test]
    fn refinement_flips_to_tracking_form() {
        let model = extract(GUARDED).unwrap();
        let original = GuardStrategy.propose(&model, &[]).remove(0);
        let hint = RefinementHint {
            counterexample: None,
            reason: "coverage".into(),
        };
        let refined = GuardStrategy.refine(&original, &hint).unwrap();
        assert!(refined.refined);
        assert_eq!(
            refined.predicate.to_string(),
            "post.lastHash == blockhash(block.number - 1)"
        );
    }
}
