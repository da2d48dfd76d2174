//! Delta heuristic: pre/post relations over numeric counters.
//!
//! Looks for two shapes per mutable numeric state variable:
//!   * a branch that increments the counter on one arm and resets it on the
//!     other, yielding a conditional delta predicate;
//!   * bodies where every write is an increment, yielding a monotonicity
//!     predicate.

use solguard_core::model::{BinOp, ContractModel, Expr, Function, Statement};
use solguard_core::predicate::{Predicate, Term};
use solguard_core::snapshot::Trace;
use solguard_core::CandidateId;

use super::{
    assignments_to, expr_to_pre_term, humanize, toplevel_locals, CandidateStrategy, Coverage,
    InvariantCandidate, Provenance,
};

pub struct DeltaStrategy;

impl CandidateStrategy for DeltaStrategy {
    fn provenance(&self) -> Provenance {
        Provenance::Delta
    }

    fn propose(&self, model: &ContractModel, _traces: &[Trace]) -> Vec<InvariantCandidate> {
        let mut out = Vec::new();
        for function in &model.functions {
            for var in &function.writes {
                let declared = match model.state_var(var) {
                    Some(v) => v,
                    None => continue,
                };
                if !declared.ty.is_numeric() || declared.constant.is_some() {
                    continue;
                }
                if let Some(c) = conditional_delta(function, var) {
                    out.push(c);
                } else if let Some(c) = monotonic(function, var) {
                    out.push(c);
                }
            }
        }
        out
    }
}

/// `e` as `var + c` (or `var - c`), returning the signed delta.
fn as_increment(expr: &Expr, var: &str) -> Option<i128> {
    let is_var = |e: &Expr| matches!(e, Expr::State(name) if name == var);
    if let Expr::Binary { op, lhs, rhs } = expr {
        match op {
            BinOp::Add => {
                if is_var(lhs) {
                    if let Expr::Int(c) = **rhs {
                        return Some(c);
                    }
                }
                if is_var(rhs) {
                    if let Expr::Int(c) = **lhs {
                        return Some(c);
                    }
                }
            }
            BinOp::Sub => {
                if is_var(lhs) {
                    if let Expr::Int(c) = **rhs {
                        return Some(-c);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn as_reset(expr: &Expr) -> Option<i128> {
    match expr {
        Expr::Int(v) => Some(*v),
        _ => None,
    }
}

/// `if (cond) { var += c } else { var = k }` (arms in either order) becomes
/// `post.var == pre.var + c if cond else post.var == k`.
fn conditional_delta(function: &Function, var: &str) -> Option<InvariantCandidate> {
    let locals = toplevel_locals(&function.body);
    for stmt in &function.body {
        let (cond, then_branch, else_branch) = match stmt {
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => (cond, then_branch, else_branch),
            _ => continue,
        };
        let then_writes = assignments_to(then_branch, var);
        let else_writes = assignments_to(else_branch, var);
        if then_writes.len() != 1 || else_writes.len() != 1 {
            continue;
        }
        let cond_term = match expr_to_pre_term(cond, &locals) {
            Some(t) => t,
            None => continue,
        };
        let shaped = match (
            as_increment(then_writes[0], var),
            as_reset(else_writes[0]),
        ) {
            (Some(delta), Some(reset)) => Some((cond_term.clone(), delta, reset, false)),
            _ => match (as_reset(then_writes[0]), as_increment(else_writes[0], var)) {
                (Some(reset), Some(delta)) => Some((cond_term, delta, reset, true)),
                _ => None,
            },
        };
        let (cond_term, delta, reset, flipped) = match shaped {
            Some(s) => s,
            None => continue,
        };

        let stepped = Predicate::atom(Term::binary(
            BinOp::Eq,
            Term::Post(var.to_string()),
            Term::binary(BinOp::Add, Term::Pre(var.to_string()), Term::Int(delta)),
        ));
        let cleared = Predicate::atom(Term::binary(
            BinOp::Eq,
            Term::Post(var.to_string()),
            Term::Int(reset),
        ));
        let (then_p, else_p) = if flipped {
            (cleared, stepped)
        } else {
            (stepped, cleared)
        };
        let cond_p = Predicate::atom(cond_term.clone());
        let verb = if delta >= 0 { "increments" } else { "decreases" };
        return Some(InvariantCandidate {
            id: CandidateId(0),
            function: function.name.clone(),
            title: format!("{} Invariant", humanize(var)),
            description: format!(
                "`{var}` {verb} by {step} when `{cond}` holds and resets to {reset} otherwise.",
                var = var,
                verb = verb,
                step = delta.abs(),
                cond = cond_term,
                reset = reset,
            ),
            predicate: Predicate::ite(cond_p.clone(), then_p, else_p),
            provenance: Provenance::Delta,
            coverage: Coverage::Branch(cond_p),
            refined: false,
        });
    }
    None
}

/// Every write is an increment by a positive constant.
fn monotonic(function: &Function, var: &str) -> Option<InvariantCandidate> {
    let writes = assignments_to(&function.body, var);
    if writes.is_empty() {
        return None;
    }
    for value in &writes {
        match as_increment(value, var) {
            Some(c) if c > 0 => {}
            _ => return None,
        }
    }
    Some(InvariantCandidate {
        id: CandidateId(0),
        function: function.name.clone(),
        title: format!("{} Monotonicity", humanize(var)),
        description: format!("`{}` never decreases across a completed call.", var),
        predicate: Predicate::atom(Term::binary(
            BinOp::Ge,
            Term::Post(var.to_string()),
            Term::Pre(var.to_string()),
        )),
        provenance: Provenance::Delta,
        coverage: Coverage::Plain,
        refined: false,
    })
}
