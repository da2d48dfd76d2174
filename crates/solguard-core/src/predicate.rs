//! Invariant predicates over (pre, post) snapshot pairs.
//!
//! A [`Predicate`] is built from [`Term`]s that reference the pre-state
//! (`pre.X`), the post-state (`post.X`), invocation parameters, and
//! environment terms. Local variables never appear: candidate strategies
//! inline them at proposal time.
//!
//! Evaluation is three-valued: a predicate over a symbolic step may leave a
//! residue that neither simplifies to true nor to false, in which case the
//! outcome is [`Outcome::Unknown`] and the verifier may not claim Holds.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{BinOp, EnvTerm, UnOp};
use crate::snapshot::{CallEnv, StateSnapshot};
use crate::value::{SymExpr, Value};

/// A value-producing term of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Int(i128),
    Bool(bool),
    /// Value of a state variable in the pre-state snapshot.
    Pre(String),
    /// Value of a state variable in the post-state snapshot.
    Post(String),
    /// An invocation argument, by parameter name.
    Param(String),
    Env(EnvTerm),
    BlockHash(Box<Term>),
    Unary { op: UnOp, term: Box<Term> },
    Binary { op: BinOp, lhs: Box<Term>, rhs: Box<Term> },
}

impl Term {
    pub fn binary(op: BinOp, lhs: Term, rhs: Term) -> Term {
        Term::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Evaluates this term for one trace step.
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<Value, CoreError> {
        match self {
            Term::Int(v) => Ok(Value::Int(*v)),
            Term::Bool(b) => Ok(Value::Bool(*b)),
            Term::Pre(name) => ctx.pre.get(name).cloned(),
            Term::Post(name) => ctx.post.get(name).cloned(),
            Term::Param(name) => {
                ctx.params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CoreError::UnknownVariable {
                        name: format!("param {}", name),
                    })
            }
            Term::Env(t) => Ok(ctx.env.term(t)),
            Term::BlockHash(arg) => {
                let v = arg.eval(ctx)?;
                Ok(ctx.env.blockhash(&v))
            }
            Term::Unary { op, term } => {
                let v = term.eval(ctx)?;
                Value::unary(*op, &v)
            }
            Term::Binary { op, lhs, rhs } => {
                let l = lhs.eval(ctx)?;
                let r = rhs.eval(ctx)?;
                Value::binary(*op, &l, &r)
            }
        }
    }
}

/// Everything a predicate needs to evaluate one trace step.
pub struct EvalContext<'a> {
    pub pre: &'a StateSnapshot,
    pub post: &'a StateSnapshot,
    /// Invocation arguments keyed by parameter name.
    pub params: &'a IndexMap<String, Value>,
    pub env: CallEnv,
}

/// Three-valued evaluation outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    True,
    False,
    /// Symbolic residue that did not simplify to a constant.
    Unknown(SymExpr),
}

/// A predicate over one (pre, post) snapshot pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    /// A boolean-valued term, e.g. `post.x == pre.x + 1`.
    Atom(Term),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Implies(Box<Predicate>, Box<Predicate>),
    /// `then if cond else otherwise` -- the conditional-delta shape.
    Ite {
        cond: Box<Predicate>,
        then: Box<Predicate>,
        otherwise: Box<Predicate>,
    },
}

impl Predicate {
    pub fn atom(term: Term) -> Predicate {
        Predicate::Atom(term)
    }

    pub fn ite(cond: Predicate, then: Predicate, otherwise: Predicate) -> Predicate {
        Predicate::Ite {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Evaluates the predicate for one trace step. Unknown propagates: a
    /// connective over an Unknown operand is Unknown unless the other operand
    /// already decides it (e.g. `false && unknown` is False).
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<Outcome, CoreError> {
        match self {
            Predicate::Atom(term) => match term.eval(ctx)? {
                Value::Bool(true) => Ok(Outcome::True),
                Value::Bool(false) => Ok(Outcome::False),
                Value::Sym(e) => {
                    let s = e.simplify();
                    match s.as_const_bool() {
                        Some(true) => Ok(Outcome::True),
                        Some(false) => Ok(Outcome::False),
                        None => Ok(Outcome::Unknown(s)),
                    }
                }
                other => Err(CoreError::TypeMismatch {
                    expected: "Bool".into(),
                    got: other.type_name().into(),
                }),
            },
            Predicate::Not(p) => Ok(match p.eval(ctx)? {
                Outcome::True => Outcome::False,
                Outcome::False => Outcome::True,
                Outcome::Unknown(e) => Outcome::Unknown(
                    SymExpr::Unary {
                        op: UnOp::Not,
                        expr: Box::new(e),
                    }
                    .simplify(),
                ),
            }),
            Predicate::And(a, b) => Ok(match (a.eval(ctx)?, b.eval(ctx)?) {
                (Outcome::False, _) | (_, Outcome::False) => Outcome::False,
                (Outcome::True, other) | (other, Outcome::True) => other,
                (Outcome::Unknown(x), Outcome::Unknown(y)) => Outcome::Unknown(
                    SymExpr::Binary {
                        op: BinOp::And,
                        lhs: Box::new(x),
                        rhs: Box::new(y),
                    }
                    .simplify(),
                ),
            }),
            Predicate::Or(a, b) => Ok(match (a.eval(ctx)?, b.eval(ctx)?) {
                (Outcome::True, _) | (_, Outcome::True) => Outcome::True,
                (Outcome::False, other) | (other, Outcome::False) => other,
                (Outcome::Unknown(x), Outcome::Unknown(y)) => Outcome::Unknown(
                    SymExpr::Binary {
                        op: BinOp::Or,
                        lhs: Box::new(x),
                        rhs: Box::new(y),
                    }
                    .simplify(),
                ),
            }),
            Predicate::Implies(a, b) => {
                Predicate::Or(Box::new(Predicate::Not(a.clone())), b.clone()).eval(ctx)
            }
            Predicate::Ite {
                cond,
                then,
                otherwise,
            } => match cond.eval(ctx)? {
                Outcome::True => then.eval(ctx),
                Outcome::False => otherwise.eval(ctx),
                Outcome::Unknown(c) => {
                    // Condition undecided: the invariant holds only if both
                    // arms hold; one decided-false arm leaves it unknown,
                    // both false makes it false.
                    match (then.eval(ctx)?, otherwise.eval(ctx)?) {
                        (Outcome::True, Outcome::True) => Ok(Outcome::True),
                        (Outcome::False, Outcome::False) => Ok(Outcome::False),
                        _ => Ok(Outcome::Unknown(c)),
                    }
                }
            },
        }
    }

    /// Stable structural fingerprint used to deduplicate candidates: the
    /// blake3 hash of the canonical rendering.
    pub fn fingerprint(&self) -> [u8; 32] {
        *blake3::hash(self.to_string().as_bytes()).as_bytes()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Int(v) => write!(f, "{}", v),
            Term::Bool(b) => write!(f, "{}", b),
            Term::Pre(name) => write!(f, "pre.{}", name),
            Term::Post(name) => write!(f, "post.{}", name),
            Term::Param(name) => write!(f, "{}", name),
            Term::Env(t) => match t {
                EnvTerm::BlockNumber => write!(f, "block.number"),
                EnvTerm::BlockTimestamp => write!(f, "block.timestamp"),
                EnvTerm::MsgValue => write!(f, "msg.value"),
                EnvTerm::MsgSender => write!(f, "msg.sender"),
            },
            Term::BlockHash(arg) => write!(f, "blockhash({})", arg),
            Term::Unary { op, term } => match op {
                UnOp::Not => write!(f, "!({})", term),
                UnOp::Neg => write!(f, "-({})", term),
            },
            Term::Binary { op, lhs, rhs } => {
                // Parenthesize nested binaries only; leaves stay bare so the
                // canonical rendering reads like the report's pseudo-predicates.
                fn side(f: &mut fmt::Formatter<'_>, t: &Term) -> fmt::Result {
                    match t {
                        Term::Binary { .. } => write!(f, "({})", t),
                        _ => write!(f, "{}", t),
                    }
                }
                side(f, lhs)?;
                write!(f, " {} ", op.symbol())?;
                side(f, rhs)
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Atom(t) => write!(f, "{}", t),
            Predicate::Not(p) => write!(f, "!({})", p),
            Predicate::And(a, b) => write!(f, "({}) && ({})", a, b),
            Predicate::Or(a, b) => write!(f, "({}) || ({})", a, b),
            Predicate::Implies(a, b) => write!(f, "({}) => ({})", a, b),
            Predicate::Ite {
                cond,
                then,
                otherwise,
            } => write!(f, "{} if {} else {}", then, cond, otherwise),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn snap(seq: u64, pairs: &[(&str, Value)]) -> StateSnapshot {
        let mut values = IndexMap::new();
        for (k, v) in pairs {
            values.insert(k.to_string(), v.clone());
        }
        StateSnapshot::new(seq, values)
    }

    fn ctx<'a>(
        pre: &'a StateSnapshot,
        post: &'a StateSnapshot,
        params: &'a IndexMap<String, Value>,
    ) -> EvalContext<'a> {
        EvalContext {
            pre,
            post,
            params,
            env: CallEnv {
                block_number: 1,
                symbolic: false,
            },
        }
    }

    /// `post.count == pre.count + 1`
    fn increment_pred() -> Predicate {
        Predicate::atom(Term::binary(
            BinOp::Eq,
            Term::Post("count".into()),
            Term::binary(BinOp::Add, Term::Pre("count".into()), Term::Int(1)),
        ))
    }

    #[test]
    fn increment_predicate_evaluates_true() {
        let pre = snap(0, &[("count", Value::Int(3))]);
        let post = snap(1, &[("count", Value::Int(4))]);
        let params = IndexMap::new();
        let out = increment_pred().eval(&ctx(&pre, &post, &params)).unwrap();
        assert_eq!(out, Outcome::True);
    }

    #[test]
    fn increment_predicate_evaluates_false() {
        let pre = snap(0, &[("count", Value::Int(3))]);
        let post = snap(1, &[("count", Value::Int(0))]);
        let params = IndexMap::new();
        let out = increment_pred().eval(&ctx(&pre, &post, &params)).unwrap();
        assert_eq!(out, Outcome::False);
    }

    #[test]
    fn symbolic_step_yields_unknown_residue() {
        let pre = snap(0, &[("count", Value::symbol("c0"))]);
        let post = snap(1, &[("count", Value::symbol("c1"))]);
        let params = IndexMap::new();
        let out = increment_pred().eval(&ctx(&pre, &post, &params)).unwrap();
        assert!(matches!(out, Outcome::Unknown(_)));
    }

    #[test]
    fn symbolic_tautology_simplifies_to_true() {
        // post.count == pre.count when both are the same symbol
        let pred = Predicate::atom(Term::binary(
            BinOp::Eq,
            Term::Post("count".into()),
            Term::Pre("count".into()),
        ));
        let pre = snap(0, &[("count", Value::symbol("c"))]);
        let post = snap(1, &[("count", Value::symbol("c"))]);
        let params = IndexMap::new();
        assert_eq!(pred.eval(&ctx(&pre, &post, &params)).unwrap(), Outcome::True);
    }

    #[test]
    fn ite_selects_branch_by_condition() {
        // post.count == pre.count + 1 if flag else post.count == 0
        let pred = Predicate::ite(
            Predicate::atom(Term::Param("flag".into())),
            increment_pred(),
            Predicate::atom(Term::binary(
                BinOp::Eq,
                Term::Post("count".into()),
                Term::Int(0),
            )),
        );
        let pre = snap(0, &[("count", Value::Int(3))]);
        let post = snap(1, &[("count", Value::Int(0))]);
        let mut params = IndexMap::new();
        params.insert("flag".to_string(), Value::Bool(false));
        assert_eq!(pred.eval(&ctx(&pre, &post, &params)).unwrap(), Outcome::True);

        params.insert("flag".to_string(), Value::Bool(true));
        assert_eq!(
            pred.eval(&ctx(&pre, &post, &params)).unwrap(),
            Outcome::False
        );
    }

    #[test]
    fn missing_param_is_an_error() {
        let pred = Predicate::atom(Term::Param("nope".into()));
        let pre = snap(0, &[]);
        let post = snap(1, &[]);
        let params = IndexMap::new();
        assert!(pred.eval(&ctx(&pre, &post, &params)).is_err());
    }

    #[test]
    fn canonical_rendering_matches_report_form() {
        let pred = Predicate::ite(
            Predicate::atom(Term::binary(
                BinOp::Eq,
                Term::Param("side".into()),
                Term::Param("guess".into()),
            )),
            increment_pred(),
            Predicate::atom(Term::binary(
                BinOp::Eq,
                Term::Post("count".into()),
                Term::Int(0),
            )),
        );
        assert_eq!(
            pred.to_string(),
            "post.count == (pre.count + 1) if side == guess else post.count == 0"
        );
    }

    #[test]
    fn fingerprint_is_structural() {
        let a = increment_pred();
        let b = increment_pred();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = Predicate::atom(Term::binary(
            BinOp::Eq,
            Term::Post("count".into()),
            Term::Int(0),
        ));
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
