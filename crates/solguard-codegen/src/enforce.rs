//! Enforcement rule synthesis for verified invariants.
//!
//! Only `Holds` results produce rules. Each rule carries a Solidity snippet
//! illustrating how the invariant would be enforced on-chain: an entry
//! `require`, a post-state `assert` modifier, a reentrancy mutex, or a
//! private helper that keeps a guarded counter update atomic. Synthesis is
//! deterministic: the same results in the same order produce structurally
//! identical rules.

use serde::{Deserialize, Serialize};
use tracing::debug;

use solguard_analysis::{Provenance, Verdict, VerificationResult};
use solguard_core::model::{BinOp, ContractModel, EnvTerm};
use solguard_core::predicate::{Predicate, Term};
use solguard_core::CandidateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleKind {
    /// `require(...)` at function entry.
    Precondition,
    /// Post-state `assert(...)` wrapped in a modifier.
    Postcondition,
    /// Mutex modifier for guard invariants on externally calling functions.
    ReentrancyLock,
    /// Conditional counter update moved into a private helper so the guard
    /// and the mutation cannot interleave.
    AtomicUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementRule {
    pub candidate: CandidateId,
    pub function: String,
    pub kind: RuleKind,
    pub description: String,
    /// Illustrative Solidity enforcing the invariant.
    pub solidity: String,
}

/// Synthesizes enforcement rules from verification results, in input order.
pub fn synthesize(
    model: &ContractModel,
    results: &[VerificationResult],
) -> Vec<EnforcementRule> {
    let mut rules = Vec::new();
    for result in results {
        if result.verdict != Verdict::Holds {
            continue;
        }
        let candidate = &result.candidate;
        let external_calls = model
            .function_by_name(&candidate.function)
            .map(|f| f.external_calls)
            .unwrap_or(false);

        let rule = match (candidate.provenance, candidate.refined) {
            (Provenance::Guard, false) if external_calls => reentrancy_lock(candidate),
            (Provenance::Guard, false) => precondition(candidate),
            (Provenance::Delta, _) => match delta_shape(&candidate.predicate) {
                Some(shape) => atomic_update(candidate, &shape),
                None => postcondition(candidate),
            },
            _ => postcondition(candidate),
        };
        debug!(candidate = %rule.candidate, kind = ?rule.kind, "synthesized rule");
        rules.push(rule);
    }
    rules
}

/// Renders a term as a Solidity expression. `pre.x` becomes the bare state
/// variable when read at entry, or the `prefix`-snapshotted copy when read
/// after mutation; `post.x` is always the bare variable.
fn term_to_sol(term: &Term, pre_prefix: Option<&str>) -> String {
    match term {
        Term::Int(v) => v.to_string(),
        Term::Bool(b) => b.to_string(),
        Term::Pre(name) => match pre_prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name.clone(),
        },
        Term::Post(name) => name.clone(),
        Term::Param(name) => name.clone(),
        Term::Env(t) => match t {
            EnvTerm::BlockNumber => "block.number".to_string(),
            EnvTerm::BlockTimestamp => "block.timestamp".to_string(),
            EnvTerm::MsgValue => "msg.value".to_string(),
            EnvTerm::MsgSender => "msg.sender".to_string(),
        },
        Term::BlockHash(arg) => format!("uint256(blockhash({}))", term_to_sol(arg, pre_prefix)),
        Term::Unary { op, term } => match op {
            solguard_core::model::UnOp::Not => format!("!({})", term_to_sol(term, pre_prefix)),
            solguard_core::model::UnOp::Neg => format!("-({})", term_to_sol(term, pre_prefix)),
        },
        Term::Binary { op, lhs, rhs } => {
            let wrap = |t: &Term| match t {
                Term::Binary { .. } => format!("({})", term_to_sol(t, pre_prefix)),
                _ => term_to_sol(t, pre_prefix),
            };
            format!("{} {} {}", wrap(lhs), op.symbol(), wrap(rhs))
        }
    }
}

fn collect_pre_vars(term: &Term, out: &mut Vec<String>) {
    match term {
        Term::Pre(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Term::BlockHash(t) | Term::Unary { term: t, .. } => collect_pre_vars(t, out),
        Term::Binary { lhs, rhs, .. } => {
            collect_pre_vars(lhs, out);
            collect_pre_vars(rhs, out);
        }
        _ => {}
    }
}

fn predicate_pre_vars(predicate: &Predicate, out: &mut Vec<String>) {
    match predicate {
        Predicate::Atom(t) => collect_pre_vars(t, out),
        Predicate::Not(p) => predicate_pre_vars(p, out),
        Predicate::And(a, b) | Predicate::Or(a, b) | Predicate::Implies(a, b) => {
            predicate_pre_vars(a, out);
            predicate_pre_vars(b, out);
        }
        Predicate::Ite {
            cond,
            then,
            otherwise,
        } => {
            predicate_pre_vars(cond, out);
            predicate_pre_vars(then, out);
            predicate_pre_vars(otherwise, out);
        }
    }
}

fn predicate_to_sol(predicate: &Predicate, pre_prefix: Option<&str>) -> String {
    match predicate {
        Predicate::Atom(t) => term_to_sol(t, pre_prefix),
        Predicate::Not(p) => format!("!({})", predicate_to_sol(p, pre_prefix)),
        Predicate::And(a, b) => format!(
            "({}) && ({})",
            predicate_to_sol(a, pre_prefix),
            predicate_to_sol(b, pre_prefix)
        ),
        Predicate::Or(a, b) => format!(
            "({}) || ({})",
            predicate_to_sol(a, pre_prefix),
            predicate_to_sol(b, pre_prefix)
        ),
        Predicate::Implies(a, b) => format!(
            "!({}) || ({})",
            predicate_to_sol(a, pre_prefix),
            predicate_to_sol(b, pre_prefix)
        ),
        Predicate::Ite {
            cond,
            then,
            otherwise,
        } => format!(
            "({}) ? ({}) : ({})",
            predicate_to_sol(cond, pre_prefix),
            predicate_to_sol(then, pre_prefix),
            predicate_to_sol(otherwise, pre_prefix)
        ),
    }
}

fn precondition(
    candidate: &solguard_analysis::InvariantCandidate,
) -> EnforcementRule {
    let check = predicate_to_sol(&candidate.predicate, None);
    EnforcementRule {
        candidate: candidate.id,
        function: candidate.function.clone(),
        kind: RuleKind::Precondition,
        description: format!(
            "Reject calls to `{}` that would break the invariant before any state changes.",
            candidate.function
        ),
        solidity: format!("require({}, \"invariant precondition\");", check),
    }
}

fn postcondition(
    candidate: &solguard_analysis::InvariantCandidate,
) -> EnforcementRule {
    let mut pre_vars = Vec::new();
    predicate_pre_vars(&candidate.predicate, &mut pre_vars);
    let mut body = String::new();
    for var in &pre_vars {
        body.push_str(&format!("    uint256 _pre_{var} = {var};\n", var = var));
    }
    body.push_str("    _;\n");
    body.push_str(&format!(
        "    assert({});\n",
        predicate_to_sol(&candidate.predicate, Some("_pre_"))
    ));
    let modifier = sanitize_ident(&candidate.title);
    EnforcementRule {
        candidate: candidate.id,
        function: candidate.function.clone(),
        kind: RuleKind::Postcondition,
        description: format!(
            "Assert the invariant after every state mutation in `{}`.",
            candidate.function
        ),
        solidity: format!("modifier {}() {{\n{}}}", modifier, body),
    }
}

fn reentrancy_lock(
    candidate: &solguard_analysis::InvariantCandidate,
) -> EnforcementRule {
    EnforcementRule {
        candidate: candidate.id,
        function: candidate.function.clone(),
        kind: RuleKind::ReentrancyLock,
        description: format!(
            "`{}` makes external calls while relying on a stored-value guard; a mutex prevents reentrant interleavings.",
            candidate.function
        ),
        solidity: concat!(
            "bool private _locked;\n",
            "modifier nonReentrant() {\n",
            "    require(!_locked, \"reentrant call\");\n",
            "    _locked = true;\n",
            "    _;\n",
            "    _locked = false;\n",
            "}"
        )
        .to_string(),
    }
}

/// Components of a conditional delta predicate:
/// `post.var == pre.var + delta if cond else post.var == reset`.
struct DeltaShape {
    var: String,
    cond: Predicate,
    delta: i128,
    reset: i128,
}

fn delta_shape(predicate: &Predicate) -> Option<DeltaShape> {
    let (cond, then, otherwise) = match predicate {
        Predicate::Ite {
            cond,
            then,
            otherwise,
        } => (cond, then, otherwise),
        _ => return None,
    };
    let (var, delta) = match &**then {
        Predicate::Atom(Term::Binary { op: BinOp::Eq, lhs, rhs }) => match (&**lhs, &**rhs) {
            (Term::Post(var), Term::Binary { op: BinOp::Add, lhs, rhs }) => {
                match (&**lhs, &**rhs) {
                    (Term::Pre(pre), Term::Int(d)) if pre == var => (var.clone(), *d),
                    _ => return None,
                }
            }
            _ => return None,
        },
        _ => return None,
    };
    let reset = match &**otherwise {
        Predicate::Atom(Term::Binary { op: BinOp::Eq, lhs, rhs }) => match (&**lhs, &**rhs) {
            (Term::Post(v), Term::Int(r)) if *v == var => *r,
            _ => return None,
        },
        _ => return None,
    };
    Some(DeltaShape {
        var,
        cond: (**cond).clone(),
        delta,
        reset,
    })
}

fn atomic_update(
    candidate: &solguard_analysis::InvariantCandidate,
    shape: &DeltaShape,
) -> EnforcementRule {
    let helper = format!("_settle{}", capitalize(&shape.var));
    let solidity = format!(
        "function {helper}(bool hit) private {{\n    if (hit) {{\n        {var} += {delta};\n    }} else {{\n        {var} = {reset};\n    }}\n}}\n// call site: {helper}({cond});",
        helper = helper,
        var = shape.var,
        delta = shape.delta,
        reset = shape.reset,
        cond = predicate_to_sol(&shape.cond, None),
    );
    EnforcementRule {
        candidate: candidate.id,
        function: candidate.function.clone(),
        kind: RuleKind::AtomicUpdate,
        description: format!(
            "Move the conditional update of `{}` into one helper so the branch and the write cannot interleave with other state changes.",
            shape.var
        ),
        solidity,
    }
}

fn sanitize_ident(title: &str) -> String {
    let mut out = String::new();
    for (i, word) in title.split_whitespace().enumerate() {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.is_empty() {
            continue;
        }
        if i == 0 {
            out.push_str(&cleaned.to_lowercase());
        } else {
            out.push_str(&capitalize(&cleaned.to_lowercase()));
        }
    }
    if out.is_empty() {
        out.push_str("invariant");
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
