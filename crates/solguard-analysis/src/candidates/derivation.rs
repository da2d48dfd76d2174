//! Derivation heuristic: state variables recomputed from scratch.
//!
//! An unconditional top-level assignment whose right-hand side does not read
//! the assigned variable itself proposes an exact post-state equation: after
//! every completed call the variable equals the (local-inlined) expression
//! over pre-state, parameters, and environment terms.

use solguard_core::model::{AssignTarget, BinOp, ContractModel, Statement};
use solguard_core::predicate::{Predicate, Term};
use solguard_core::snapshot::Trace;
use solguard_core::CandidateId;

use super::{
    expr_to_pre_term, humanize, toplevel_locals, CandidateStrategy, Coverage, InvariantCandidate,
    Provenance,
};

pub struct DerivationStrategy;

impl CandidateStrategy for DerivationStrategy {
    fn provenance(&self) -> Provenance {
        Provenance::Derivation
    }

    fn propose(&self, model: &ContractModel, _traces: &[Trace]) -> Vec<InvariantCandidate> {
        let mut out = Vec::new();
        for function in &model.functions {
            let locals = toplevel_locals(&function.body);
            for stmt in &function.body {
                let (var, value) = match stmt {
                    Statement::Assign {
                        target: AssignTarget::State(name),
                        value,
                    } => (name, value),
                    _ => continue,
                };
                if model
                    .state_var(var)
                    .map(|v| v.constant.is_some())
                    .unwrap_or(true)
                {
                    continue;
                }
                let mut reads = std::collections::BTreeSet::new();
                value.collect_state_reads(&mut reads);
                // self-referential updates are delta territory
                if reads.contains(var) {
                    continue;
                }
                let term = match expr_to_pre_term(value, &locals) {
                    Some(t) => t,
                    None => continue,
                };
                out.push(InvariantCandidate {
                    id: CandidateId(0),
                    function: function.name.clone(),
                    title: format!("{} Derivation", humanize(var)),
                    description: format!(
                        "`{}` equals `{}` after every completed call to `{}`.",
                        var, term, function.name,
                    ),
                    predicate: Predicate::atom(Term::binary(
                        BinOp::Eq,
                        Term::Post(var.to_string()),
                        term,
                    )),
                    provenance: Provenance::Derivation,
                    coverage: Coverage::Plain,
                    refined: false,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    #[test]
    fn fresh_assignment_becomes_post_equation() {
        let src = r#"
            contract C {
                uint256 lastHash;
                function touch() public {
                    uint256 fresh = uint256(blockhash(block.number - 1));
                    lastHash = fresh;
                }
            }
        "#;
        let model = extract(src).unwrap();
        let candidates = DerivationStrategy.propose(&model, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].predicate.to_string(),
            "post.lastHash == blockhash(block.number - 1)"
        );
        assert_eq!(candidates[0].title, "Last Hash Derivation");
    }

    #[test]
    fn self_referential_update_is_skipped() {
        let src = r#"
            contract C {
                uint256 n;
                function f() public {
                    n = n + 1;
                }
            }
        "#;
        let model = extract(src).unwrap();
        assert!(DerivationStrategy.propose(&model, &[]).is_empty());
    }

    #[test]
    fn branch_local_assignments_are_ignored() {
        let src = r#"
            contract C {
                uint256 n;
                function f(bool p) public {
                    if (p) {
                        n = 7;
                    }
                }
            }
        "#;
        let model = extract(src).unwrap();
        assert!(DerivationStrategy.propose(&model, &[]).is_empty());
    }

    #[test]
    fn parameter_assignment_is_proposed() {
        let src = r#"
            contract C {
                uint256 stored;
                function set(uint256 x) public {
                    stored = x + 1;
                }
            }
        "#;
        let model = extract(src).unwrap();
        let candidates = DerivationStrategy.propose(&model, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].predicate.to_string(),
            "post.stored == (x + 1)"
        );
    }
}
