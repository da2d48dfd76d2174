//! Semantic contract model: state variables, functions, and a statement AST.
//!
//! [`ContractModel`] is the extractor's output and the input to every later
//! pipeline stage. It is created once per run and never mutated afterwards --
//! the `reads`/`writes`/`external_calls` summaries on each [`Function`] are
//! derived from the body AST at construction time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::FunctionId;

/// Declared type of a state variable, parameter, or local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarType {
    /// Unsigned integer (`uint`, `uint256`). Modeled as `i128` at runtime.
    Uint,
    Bool,
    Address,
}

impl VarType {
    /// Returns `true` for types that participate in arithmetic invariants.
    pub fn is_numeric(&self) -> bool {
        matches!(self, VarType::Uint)
    }
}

/// Visibility of a state variable or function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

/// A declared contract state variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    pub ty: VarType,
    pub visibility: Visibility,
    /// Initializer for `constant` declarations. `None` for mutable state,
    /// which starts from the run's initial snapshot.
    pub constant: Option<i128>,
    /// Declared initializer for mutable state, used when seeding the initial
    /// snapshot. Distinct from `constant`: the variable can still change.
    pub initial: Option<i128>,
}

/// Environment terms observable by contract code. In a concrete simulation
/// these are deterministic functions of the invocation environment; in a
/// symbolic simulation they are opaque symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvTerm {
    BlockNumber,
    BlockTimestamp,
    MsgValue,
    MsgSender,
}

/// Unary expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
}

/// Binary expression operators (arithmetic, comparison, logical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Returns `true` if this operator yields a boolean.
    pub fn is_boolean(&self) -> bool {
        !matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }

    /// Source-level symbol for rendering.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Expression AST. Identifiers are resolved at extraction time into their
/// scope (state variable, parameter, or local), so later stages never guess.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Int(i128),
    Bool(bool),
    /// Read of a declared state variable.
    State(String),
    /// Read of a function parameter.
    Param(String),
    /// Read of a locally declared variable.
    Local(String),
    Env(EnvTerm),
    /// `blockhash(e)` -- a per-block opaque value.
    BlockHash(Box<Expr>),
    /// Value-preserving numeric cast, e.g. `uint256(e)`.
    Cast { ty: VarType, expr: Box<Expr> },
    Unary { op: UnOp, expr: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

impl Expr {
    /// Collects the state variable names read by this expression into `out`.
    pub fn collect_state_reads(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::State(name) => {
                out.insert(name.clone());
            }
            Expr::BlockHash(e) | Expr::Cast { expr: e, .. } | Expr::Unary { expr: e, .. } => {
                e.collect_state_reads(out);
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_state_reads(out);
                rhs.collect_state_reads(out);
            }
            _ => {}
        }
    }
}

/// Assignment target, already resolved to its scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignTarget {
    State(String),
    Local(String),
}

/// Statement AST for function bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Local declaration with initializer: `uint256 x = e;`
    Local {
        name: String,
        ty: VarType,
        init: Expr,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    /// `require(cond)` / `require(cond, "msg")` -- reverts when false.
    Require {
        cond: Expr,
        message: Option<String>,
    },
    /// Unconditional `revert()`.
    Revert,
    Return(Option<Expr>),
    /// External call marker (`x.call(...)`, `x.transfer(...)`). The callee is
    /// outside the model; only the reentrancy-relevant fact is kept.
    ExternalCall { target: Expr },
}

/// A contract function: signature, resolved body AST, and derived summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub visibility: Visibility,
    /// Named, typed parameters in declaration order.
    pub params: Vec<(String, VarType)>,
    pub returns: Option<VarType>,
    pub body: Vec<Statement>,
    /// State variables read anywhere in the body.
    pub reads: BTreeSet<String>,
    /// State variables written anywhere in the body.
    pub writes: BTreeSet<String>,
    /// `true` if the body contains an external call.
    pub external_calls: bool,
}

impl Function {
    /// Builds a function and derives `reads`/`writes`/`external_calls` from
    /// the body.
    pub fn new(
        id: FunctionId,
        name: String,
        visibility: Visibility,
        params: Vec<(String, VarType)>,
        returns: Option<VarType>,
        body: Vec<Statement>,
    ) -> Self {
        let mut reads = BTreeSet::new();
        let mut writes = BTreeSet::new();
        let mut external_calls = false;
        summarize(&body, &mut reads, &mut writes, &mut external_calls);
        Function {
            id,
            name,
            visibility,
            params,
            returns,
            body,
            reads,
            writes,
            external_calls,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param_type(&self, name: &str) -> Option<VarType> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }
}

fn summarize(
    body: &[Statement],
    reads: &mut BTreeSet<String>,
    writes: &mut BTreeSet<String>,
    external_calls: &mut bool,
) {
    for stmt in body {
        match stmt {
            Statement::Local { init, .. } => init.collect_state_reads(reads),
            Statement::Assign { target, value } => {
                value.collect_state_reads(reads);
                if let AssignTarget::State(name) = target {
                    writes.insert(name.clone());
                }
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_state_reads(reads);
                summarize(then_branch, reads, writes, external_calls);
                summarize(else_branch, reads, writes, external_calls);
            }
            Statement::Require { cond, .. } => cond.collect_state_reads(reads),
            Statement::Return(Some(e)) => e.collect_state_reads(reads),
            Statement::Return(None) | Statement::Revert => {}
            Statement::ExternalCall { target } => {
                target.collect_state_reads(reads);
                *external_calls = true;
            }
        }
    }
}

/// The extracted semantic model of one contract. Immutable once built; owned
/// exclusively by a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractModel {
    pub name: String,
    /// State variables in declaration order.
    pub state: Vec<StateVariable>,
    /// Functions in declaration order; `Function::id` is the index here.
    pub functions: Vec<Function>,
}

impl ContractModel {
    pub fn state_var(&self, name: &str) -> Option<&StateVariable> {
        self.state.iter().find(|v| v.name == name)
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Mutable (non-constant) state variables, the domain of snapshots.
    pub fn mutable_state(&self) -> impl Iterator<Item = &StateVariable> {
        self.state.iter().filter(|v| v.constant.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_body() -> Vec<Statement> {
        // if (cond) { count = count + 1; } else { count = 0; }
        vec![Statement::If {
            cond: Expr::Binary {
                op: BinOp::Eq,
                lhs: Box::new(Expr::State("last".into())),
                rhs: Box::new(Expr::Param("x".into())),
            },
            then_branch: vec![Statement::Assign {
                target: AssignTarget::State("count".into()),
                value: Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::State("count".into())),
                    rhs: Box::new(Expr::Int(1)),
                },
            }],
            else_branch: vec![Statement::Assign {
                target: AssignTarget::State("count".into()),
                value: Expr::Int(0),
            }],
        }]
    }

    #[test]
    fn summaries_cover_both_branches() {
        let f = Function::new(
            FunctionId(0),
            "bump".into(),
            Visibility::Public,
            vec![("x".into(), VarType::Uint)],
            None,
            counter_body(),
        );
        assert!(f.reads.contains("count"));
        assert!(f.reads.contains("last"));
        assert!(f.writes.contains("count"));
        assert!(!f.writes.contains("last"));
        assert!(!f.external_calls);
    }

    #[test]
    fn external_call_marker_sets_flag() {
        let f = Function::new(
            FunctionId(0),
            "pay".into(),
            Visibility::Public,
            vec![],
            None,
            vec![Statement::ExternalCall {
                target: Expr::Env(EnvTerm::MsgSender),
            }],
        );
        assert!(f.external_calls);
    }

    #[test]
    fn model_lookup_by_name_and_id() {
        let model = ContractModel {
            name: "C".into(),
            state: vec![StateVariable {
                name: "count".into(),
                ty: VarType::Uint,
                visibility: Visibility::Public,
                constant: None,
                initial: None,
            }],
            functions: vec![Function::new(
                FunctionId(0),
                "bump".into(),
                Visibility::Public,
                vec![("x".into(), VarType::Uint)],
                None,
                counter_body(),
            )],
        };
        assert!(model.state_var("count").is_some());
        assert!(model.state_var("missing").is_none());
        assert_eq!(model.function_by_name("bump").unwrap().id, FunctionId(0));
        assert!(model.function(FunctionId(9)).is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let f = Function::new(
            FunctionId(1),
            "bump".into(),
            Visibility::Public,
            vec![("x".into(), VarType::Uint)],
            Some(VarType::Bool),
            counter_body(),
        );
        let json = serde_json::to_string(&f).unwrap();
        let back: Function = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "bump");
        assert_eq!(back.body, f.body);
    }
}
