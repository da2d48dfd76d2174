//! Runtime value representation for the trace simulator.
//!
//! A [`Value`] is either concrete (integer/boolean) or symbolic: a
//! [`SymExpr`] algebraic expression over named symbols. Arithmetic on
//! concrete operands evaluates immediately; as soon as one operand is
//! symbolic the result stays symbolic, so a symbolic invocation turns state
//! transitions into algebraic expressions rather than evaluated values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{BinOp, UnOp};

/// A concrete or symbolic runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Int(i128),
    Bool(bool),
    Sym(SymExpr),
}

/// A symbolic expression over opaque named symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymExpr {
    Const(i128),
    ConstBool(bool),
    /// Opaque symbol: a symbolic argument or environment term, e.g. `arg:guess`
    /// or `env:blockhash@3`.
    Sym(String),
    Unary {
        op: UnOp,
        expr: Box<SymExpr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<SymExpr>,
        rhs: Box<SymExpr>,
    },
    /// Branch merge: the value is `then` when `cond` holds, `otherwise` when
    /// it does not. Produced when the simulator merges a symbolic branch.
    Ite {
        cond: Box<SymExpr>,
        then: Box<SymExpr>,
        otherwise: Box<SymExpr>,
    },
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Sym(SymExpr::Sym(name.into()))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Value::Sym(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::Sym(_) => "Sym",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Lifts this value into the symbolic domain.
    pub fn to_sym(&self) -> SymExpr {
        match self {
            Value::Int(v) => SymExpr::Const(*v),
            Value::Bool(b) => SymExpr::ConstBool(*b),
            Value::Sym(e) => e.clone(),
        }
    }

    /// Applies a binary operator. Concrete operands evaluate immediately;
    /// any symbolic operand produces a (simplified) symbolic result.
    pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, CoreError> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => concrete_int_binary(op, *a, *b),
            (Value::Bool(a), Value::Bool(b)) => concrete_bool_binary(op, *a, *b),
            (Value::Sym(_), _) | (_, Value::Sym(_)) => {
                let expr = SymExpr::Binary {
                    op,
                    lhs: Box::new(lhs.to_sym()),
                    rhs: Box::new(rhs.to_sym()),
                };
                Ok(Value::from_sym(expr.simplify()))
            }
            _ => Err(CoreError::TypeMismatch {
                expected: lhs.type_name().into(),
                got: rhs.type_name().into(),
            }),
        }
    }

    /// Applies a unary operator with the same concrete/symbolic split as
    /// [`Value::binary`].
    pub fn unary(op: UnOp, val: &Value) -> Result<Value, CoreError> {
        match (op, val) {
            (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnOp::Neg, Value::Int(v)) => Ok(Value::Int(-v)),
            (_, Value::Sym(e)) => {
                let expr = SymExpr::Unary {
                    op,
                    expr: Box::new(e.clone()),
                };
                Ok(Value::from_sym(expr.simplify()))
            }
            (UnOp::Not, other) => Err(CoreError::TypeMismatch {
                expected: "Bool".into(),
                got: other.type_name().into(),
            }),
            (UnOp::Neg, other) => Err(CoreError::TypeMismatch {
                expected: "Int".into(),
                got: other.type_name().into(),
            }),
        }
    }

    /// Folds a constant symbolic expression back into a concrete value.
    fn from_sym(expr: SymExpr) -> Value {
        match expr {
            SymExpr::Const(v) => Value::Int(v),
            SymExpr::ConstBool(b) => Value::Bool(b),
            other => Value::Sym(other),
        }
    }
}

fn concrete_int_binary(op: BinOp, a: i128, b: i128) -> Result<Value, CoreError> {
    let checked = |r: Option<i128>| {
        r.map(Value::Int).ok_or(CoreError::ArithmeticOverflow)
    };
    match op {
        BinOp::Add => checked(a.checked_add(b)),
        BinOp::Sub => checked(a.checked_sub(b)),
        BinOp::Mul => checked(a.checked_mul(b)),
        BinOp::Div => {
            if b == 0 {
                Err(CoreError::DivideByZero)
            } else {
                checked(a.checked_div(b))
            }
        }
        BinOp::Mod => {
            if b == 0 {
                Err(CoreError::DivideByZero)
            } else {
                checked(a.checked_rem(b))
            }
        }
        BinOp::Eq => Ok(Value::Bool(a == b)),
        BinOp::Ne => Ok(Value::Bool(a != b)),
        BinOp::Lt => Ok(Value::Bool(a < b)),
        BinOp::Le => Ok(Value::Bool(a <= b)),
        BinOp::Gt => Ok(Value::Bool(a > b)),
        BinOp::Ge => Ok(Value::Bool(a >= b)),
        BinOp::And | BinOp::Or => Err(CoreError::TypeMismatch {
            expected: "Bool".into(),
            got: "Int".into(),
        }),
    }
}

fn concrete_bool_binary(op: BinOp, a: bool, b: bool) -> Result<Value, CoreError> {
    match op {
        BinOp::And => Ok(Value::Bool(a && b)),
        BinOp::Or => Ok(Value::Bool(a || b)),
        BinOp::Eq => Ok(Value::Bool(a == b)),
        BinOp::Ne => Ok(Value::Bool(a != b)),
        _ => Err(CoreError::TypeMismatch {
            expected: "Int".into(),
            got: "Bool".into(),
        }),
    }
}

impl SymExpr {
    /// Bottom-up simplification: constant folding, identity elimination,
    /// `x == x`, double negation. Returns a `Const`/`ConstBool` when the
    /// expression has no free symbols left.
    pub fn simplify(&self) -> SymExpr {
        match self {
            SymExpr::Const(_) | SymExpr::ConstBool(_) | SymExpr::Sym(_) => self.clone(),
            SymExpr::Unary { op, expr } => {
                let inner = expr.simplify();
                match (op, &inner) {
                    (UnOp::Not, SymExpr::ConstBool(b)) => SymExpr::ConstBool(!b),
                    (UnOp::Neg, SymExpr::Const(v)) => SymExpr::Const(-v),
                    (UnOp::Not, SymExpr::Unary { op: UnOp::Not, expr: e }) => (**e).clone(),
                    _ => SymExpr::Unary {
                        op: *op,
                        expr: Box::new(inner),
                    },
                }
            }
            SymExpr::Binary { op, lhs, rhs } => {
                let l = lhs.simplify();
                let r = rhs.simplify();
                if let (SymExpr::Const(a), SymExpr::Const(b)) = (&l, &r) {
                    if let Ok(v) = concrete_int_binary(*op, *a, *b) {
                        return v.to_sym();
                    }
                }
                if let (SymExpr::ConstBool(a), SymExpr::ConstBool(b)) = (&l, &r) {
                    if let Ok(v) = concrete_bool_binary(*op, *a, *b) {
                        return v.to_sym();
                    }
                }
                match (op, &l, &r) {
                    // x == x / x <= x / x >= x are tautologies; x != x is not.
                    (BinOp::Eq | BinOp::Le | BinOp::Ge, a, b) if a == b => {
                        SymExpr::ConstBool(true)
                    }
                    (BinOp::Ne | BinOp::Lt | BinOp::Gt, a, b) if a == b => {
                        SymExpr::ConstBool(false)
                    }
                    (BinOp::Add, e, SymExpr::Const(0)) | (BinOp::Add, SymExpr::Const(0), e) => {
                        e.clone()
                    }
                    (BinOp::Sub, e, SymExpr::Const(0)) => e.clone(),
                    (BinOp::Mul, e, SymExpr::Const(1)) | (BinOp::Mul, SymExpr::Const(1), e) => {
                        e.clone()
                    }
                    (BinOp::Mul, _, SymExpr::Const(0)) | (BinOp::Mul, SymExpr::Const(0), _) => {
                        SymExpr::Const(0)
                    }
                    (BinOp::And, e, SymExpr::ConstBool(true))
                    | (BinOp::And, SymExpr::ConstBool(true), e) => e.clone(),
                    (BinOp::And, _, SymExpr::ConstBool(false))
                    | (BinOp::And, SymExpr::ConstBool(false), _) => SymExpr::ConstBool(false),
                    (BinOp::Or, e, SymExpr::ConstBool(false))
                    | (BinOp::Or, SymExpr::ConstBool(false), e) => e.clone(),
                    (BinOp::Or, _, SymExpr::ConstBool(true))
                    | (BinOp::Or, SymExpr::ConstBool(true), _) => SymExpr::ConstBool(true),
                    _ => SymExpr::Binary {
                        op: *op,
                        lhs: Box::new(l),
                        rhs: Box::new(r),
                    },
                }
            }
            SymExpr::Ite {
                cond,
                then,
                otherwise,
            } => {
                let c = cond.simplify();
                let t = then.simplify();
                let o = otherwise.simplify();
                match c.as_const_bool() {
                    Some(true) => t,
                    Some(false) => o,
                    None if t == o => t,
                    None => SymExpr::Ite {
                        cond: Box::new(c),
                        then: Box::new(t),
                        otherwise: Box::new(o),
                    },
                }
            }
        }
    }

    /// Returns the constant boolean this expression simplifies to, if any.
    pub fn as_const_bool(&self) -> Option<bool> {
        match self {
            SymExpr::ConstBool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Const(v) => write!(f, "{}", v),
            SymExpr::ConstBool(b) => write!(f, "{}", b),
            SymExpr::Sym(name) => write!(f, "{}", name),
            SymExpr::Unary { op, expr } => match op {
                UnOp::Not => write!(f, "!({})", expr),
                UnOp::Neg => write!(f, "-({})", expr),
            },
            SymExpr::Binary { op, lhs, rhs } => {
                write!(f, "({} {} {})", lhs, op.symbol(), rhs)
            }
            SymExpr::Ite {
                cond,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", cond, then, otherwise),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Sym(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_arithmetic() {
        assert_eq!(
            Value::binary(BinOp::Add, &Value::Int(3), &Value::Int(5)).unwrap(),
            Value::Int(8)
        );
        assert_eq!(
            Value::binary(BinOp::Eq, &Value::Int(3), &Value::Int(3)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn divide_by_zero_traps() {
        let err = Value::binary(BinOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(matches!(err, CoreError::DivideByZero));
    }

    #[test]
    fn symbolic_operand_stays_symbolic() {
        let v = Value::binary(BinOp::Add, &Value::symbol("x"), &Value::Int(1)).unwrap();
        assert!(v.is_symbolic());
        assert_eq!(format!("{}", v), "(x + 1)");
    }

    #[test]
    fn symbolic_identity_folds_back_to_concrete() {
        // x + 0 simplifies to x; (x - x) == 0 simplifies all the way to true
        let x = Value::symbol("x");
        let v = Value::binary(BinOp::Add, &x, &Value::Int(0)).unwrap();
        assert_eq!(v, Value::symbol("x"));

        // x - x does not fold (no cancellation rule) but x == x does
        let diff = Value::binary(BinOp::Sub, &x, &x).unwrap();
        assert!(diff.is_symbolic());
        let eq = Value::binary(BinOp::Eq, &x, &x).unwrap();
        assert_eq!(eq, Value::Bool(true));
    }

    #[test]
    fn simplifier_handles_boolean_identities() {
        let e = SymExpr::Binary {
            op: BinOp::And,
            lhs: Box::new(SymExpr::Sym("p".into())),
            rhs: Box::new(SymExpr::ConstBool(true)),
        };
        assert_eq!(e.simplify(), SymExpr::Sym("p".into()));

        let e = SymExpr::Binary {
            op: BinOp::Or,
            lhs: Box::new(SymExpr::Sym("p".into())),
            rhs: Box::new(SymExpr::ConstBool(true)),
        };
        assert_eq!(e.simplify().as_const_bool(), Some(true));
    }

    #[test]
    fn double_negation_cancels() {
        let e = SymExpr::Unary {
            op: UnOp::Not,
            expr: Box::new(SymExpr::Unary {
                op: UnOp::Not,
                expr: Box::new(SymExpr::Sym("p".into())),
            }),
        };
        assert_eq!(e.simplify(), SymExpr::Sym("p".into()));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let err = Value::binary(BinOp::Add, &Value::Int(1), &Value::Bool(true)).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn concrete_arithmetic_matches_i128(a in -10_000i128..10_000, b in -10_000i128..10_000) {
                for (op, expected) in [
                    (BinOp::Add, a + b),
                    (BinOp::Sub, a - b),
                    (BinOp::Mul, a * b),
                ] {
                    let v = Value::binary(op, &Value::Int(a), &Value::Int(b)).unwrap();
                    prop_assert_eq!(v, Value::Int(expected));
                }
            }

            #[test]
            fn comparisons_are_exhaustive_and_exclusive(a in any::<i64>(), b in any::<i64>()) {
                let (a, b) = (a as i128, b as i128);
                let lt = Value::binary(BinOp::Lt, &Value::Int(a), &Value::Int(b)).unwrap();
                let eq = Value::binary(BinOp::Eq, &Value::Int(a), &Value::Int(b)).unwrap();
                let gt = Value::binary(BinOp::Gt, &Value::Int(a), &Value::Int(b)).unwrap();
                let truths = [lt, eq, gt]
                    .iter()
                    .filter(|v| **v == Value::Bool(true))
                    .count();
                prop_assert_eq!(truths, 1);
            }

            #[test]
            fn additive_identity_folds_for_any_symbol(name in "[a-z][a-z0-9]{0,8}") {
                let v = Value::binary(BinOp::Add, &Value::symbol(name.clone()), &Value::Int(0)).unwrap();
                prop_assert_eq!(v, Value::symbol(name));
            }

            #[test]
            fn self_equality_folds_true(name in "[a-z][a-z0-9]{0,8}") {
                let x = Value::symbol(name);
                let v = Value::binary(BinOp::Eq, &x, &x).unwrap();
                prop_assert_eq!(v, Value::Bool(true));
            }
        }
    }
}
