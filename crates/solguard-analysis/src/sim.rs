//! Execution trace simulator.
//!
//! Runs a sequence of invocation requests against a [`ContractModel`],
//! producing an append-only [`Trace`] of (invocation, pre, post) steps.
//! Arguments may be concrete or symbolic; a symbolic operand anywhere turns
//! downstream values into algebraic expressions, and a branch on a symbolic
//! condition executes both arms and merges each written variable into an
//! `Ite` expression under the branch condition.
//!
//! Exploration is bounded: every executed statement consumes one unit of the
//! step budget, and exhausting it fails with `BudgetExceeded` instead of
//! looping -- that is the engine's cancellation mechanism.

use indexmap::IndexMap;

use solguard_core::model::{
    AssignTarget, BinOp, ContractModel, Expr, Function, Statement, UnOp,
};
use solguard_core::snapshot::{CallEnv, Invocation, StateSnapshot, Trace, TraceStep};
use solguard_core::value::{SymExpr, Value};
use solguard_core::{CoreError, VarType};
use tracing::trace;

use crate::error::AnalysisError;

/// Simulator limits.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Maximum number of statement evaluations per `run` call.
    pub max_steps: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig { max_steps: 10_000 }
    }
}

/// Simulates invocation sequences over an extracted model.
pub struct Simulator<'a> {
    model: &'a ContractModel,
    config: SimConfig,
}

/// Control flow outcome of a statement or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Return,
    Revert,
}

/// Working state for one invocation: mutable copies of the state variables
/// and the function's locals, plus the shared step budget.
///
/// `path` is the conjunction of conditions under which execution is still
/// live after a symbolic branch whose other arm returned or reverted. While
/// it is set, every write merges with the previous value under the path, so
/// statements after a partially-exiting branch can never fabricate a concrete
/// post-state. `initial_vars` is the pre-invocation state, kept for the full
/// rollback a revert performs on its path.
struct ExecState {
    vars: IndexMap<String, Value>,
    locals: IndexMap<String, Value>,
    initial_vars: IndexMap<String, Value>,
    path: Option<SymExpr>,
}

impl ExecState {
    /// Rolls every state variable back to its pre-invocation value on the
    /// currently live path. With no path condition the revert is total and
    /// the caller discards the state wholesale.
    fn revert_on_path(&mut self) {
        if let Some(path) = self.path.clone() {
            for (name, value) in self.vars.iter_mut() {
                if let Some(initial) = self.initial_vars.get(name) {
                    *value = guarded(&path, initial, value);
                }
            }
        }
    }
}

/// `cond ? on_true : on_false`, collapsed when both sides agree.
fn guarded(cond: &SymExpr, on_true: &Value, on_false: &Value) -> Value {
    if on_true == on_false {
        return on_true.clone();
    }
    Value::Sym(
        SymExpr::Ite {
            cond: Box::new(cond.clone()),
            then: Box::new(on_true.to_sym()),
            otherwise: Box::new(on_false.to_sym()),
        }
        .simplify(),
    )
}

impl<'a> Simulator<'a> {
    pub fn new(model: &'a ContractModel, config: SimConfig) -> Self {
        Simulator { model, config }
    }

    /// Builds the run's initial snapshot: every mutable state variable at its
    /// declared initializer, or the type's zero value.
    pub fn initial_snapshot(model: &ContractModel) -> StateSnapshot {
        let mut values = IndexMap::new();
        for var in model.mutable_state() {
            let value = match (var.initial, var.ty) {
                (Some(v), _) => Value::Int(v),
                (None, VarType::Bool) => Value::Bool(false),
                (None, _) => Value::Int(0),
            };
            values.insert(var.name.clone(), value);
        }
        StateSnapshot::new(0, values)
    }

    /// Runs the invocation sequence from `initial`, returning the trace.
    /// Fatal on unknown functions and undeclared-variable writes; fails with
    /// `BudgetExceeded` when the step budget runs out.
    pub fn run(
        &self,
        invocations: &[Invocation],
        initial: StateSnapshot,
    ) -> Result<Trace, AnalysisError> {
        let mut trace = Trace::new();
        let mut pre = initial;
        let mut budget = self.config.max_steps;

        for invocation in invocations {
            let function = self.model.function_by_name(&invocation.function).ok_or_else(|| {
                AnalysisError::UnknownFunction {
                    name: invocation.function.clone(),
                }
            })?;
            let params = bind_params(function, invocation)?;
            let symbolic = invocation.args.iter().any(Value::is_symbolic);
            let env = invocation.env(pre.seq, symbolic);

            let mut state = ExecState {
                vars: pre.values.clone(),
                locals: IndexMap::new(),
                initial_vars: pre.values.clone(),
                path: None,
            };
            let flow = self.exec_block(&function.body, function, &params, env, &mut state, &mut budget)?;

            let completed = flow != Flow::Revert;
            let post = if completed {
                StateSnapshot::new(pre.seq + 1, state.vars)
            } else {
                StateSnapshot::new(pre.seq + 1, pre.values.clone())
            };
            trace!(
                function = %invocation.function,
                seq = pre.seq,
                completed,
                "simulated invocation"
            );
            trace.steps.push(TraceStep {
                invocation: invocation.clone(),
                pre: pre.clone(),
                post: post.clone(),
                completed,
            });
            pre = post;
        }

        Ok(trace)
    }

    fn exec_block(
        &self,
        body: &[Statement],
        function: &Function,
        params: &IndexMap<String, Value>,
        env: CallEnv,
        state: &mut ExecState,
        budget: &mut usize,
    ) -> Result<Flow, AnalysisError> {
        for stmt in body {
            if *budget == 0 {
                return Err(AnalysisError::BudgetExceeded {
                    consumed: self.config.max_steps,
                    budget: self.config.max_steps,
                });
            }
            *budget -= 1;

            match stmt {
                Statement::Local { name, init, .. } => {
                    let value = self.eval(init, function, params, env, state)?;
                    state.locals.insert(name.clone(), value);
                }
                Statement::Assign { target, value } => {
                    let v = self.eval(value, function, params, env, state)?;
                    self.write(target, v, function, state)?;
                }
                Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                } => {
                    let c = self.eval(cond, function, params, env, state)?;
                    match c {
                        Value::Bool(true) => {
                            match self.exec_block(then_branch, function, params, env, state, budget)? {
                                Flow::Continue => {}
                                other => return Ok(other),
                            }
                        }
                        Value::Bool(false) => {
                            match self.exec_block(else_branch, function, params, env, state, budget)? {
                                Flow::Continue => {}
                                other => return Ok(other),
                            }
                        }
                        Value::Sym(cond_sym) => {
                            let flow = self.exec_symbolic_branch(
                                &cond_sym,
                                then_branch,
                                else_branch,
                                function,
                                params,
                                env,
                                state,
                                budget,
                            )?;
                            match flow {
                                Flow::Continue => {}
                                other => return Ok(other),
                            }
                        }
                        other => {
                            return Err(CoreError::TypeMismatch {
                                expected: "Bool".into(),
                                got: other.type_name().into(),
                            }
                            .into())
                        }
                    }
                }
                Statement::Require { cond, .. } => {
                    let c = self.eval(cond, function, params, env, state)?;
                    match c {
                        Value::Bool(true) => {}
                        Value::Bool(false) => return Ok(self.revert(state)),
                        // A symbolic guard neither passes nor reverts; the
                        // verifier sees the residue through the branch
                        // condition it guards, so execution continues here.
                        Value::Sym(_) => {}
                        other => {
                            return Err(CoreError::TypeMismatch {
                                expected: "Bool".into(),
                                got: other.type_name().into(),
                            }
                            .into())
                        }
                    }
                }
                Statement::Revert => return Ok(self.revert(state)),
                Statement::Return(_) => return Ok(Flow::Return),
                Statement::ExternalCall { target } => {
                    // The callee is outside the model; evaluate the target
                    // for its reads and move on.
                    let _ = self.eval(target, function, params, env, state)?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// A revert with no live path condition aborts the step and the caller
    /// restores the pre-invocation snapshot. Under a path condition only the
    /// live path rolls back; the paths that already returned keep their
    /// writes, so the step completes with a merged post-state.
    fn revert(&self, state: &mut ExecState) -> Flow {
        if state.path.is_some() {
            state.revert_on_path();
            Flow::Return
        } else {
            Flow::Revert
        }
    }

    /// Executes both arms of a branch whose condition is symbolic and merges
    /// every variable they disagree on into an `Ite` under the condition. A
    /// reverting arm contributes the invocation's initial state on its path.
    /// When exactly one arm falls through, the fall-through condition joins
    /// the live path so the rest of the function stays conditional.
    #[allow(clippy::too_many_arguments)]
    fn exec_symbolic_branch(
        &self,
        cond: &SymExpr,
        then_branch: &[Statement],
        else_branch: &[Statement],
        function: &Function,
        params: &IndexMap<String, Value>,
        env: CallEnv,
        state: &mut ExecState,
        budget: &mut usize,
    ) -> Result<Flow, AnalysisError> {
        let mut then_state = ExecState {
            vars: state.vars.clone(),
            locals: state.locals.clone(),
            initial_vars: state.initial_vars.clone(),
            path: state.path.clone(),
        };
        let mut else_state = ExecState {
            vars: state.vars.clone(),
            locals: state.locals.clone(),
            initial_vars: state.initial_vars.clone(),
            path: state.path.clone(),
        };

        let then_flow =
            self.exec_block(then_branch, function, params, env, &mut then_state, budget)?;
        let else_flow =
            self.exec_block(else_branch, function, params, env, &mut else_state, budget)?;

        // A reverting arm rolls its whole path back to the invocation's
        // initial state; with an outer path condition only the live part
        // rolls back.
        if then_flow == Flow::Revert {
            then_state.vars = reverted_vars(state);
            then_state.locals = state.locals.clone();
        }
        if else_flow == Flow::Revert {
            else_state.vars = reverted_vars(state);
            else_state.locals = state.locals.clone();
        }

        state.vars = merge_env(cond, &then_state.vars, &else_state.vars);
        state.locals = merge_env(cond, &then_state.locals, &else_state.locals);

        Ok(match (then_flow, else_flow) {
            (Flow::Revert, Flow::Revert) if state.path.is_none() => Flow::Revert,
            (Flow::Continue, Flow::Continue) => Flow::Continue,
            (Flow::Continue, _) => {
                state.path = Some(conjoin(state.path.take(), cond.clone()));
                Flow::Continue
            }
            (_, Flow::Continue) => {
                let negated = SymExpr::Unary {
                    op: UnOp::Not,
                    expr: Box::new(cond.clone()),
                }
                .simplify();
                state.path = Some(conjoin(state.path.take(), negated));
                Flow::Continue
            }
            // Every live path has exited and any revert is already folded
            // into the merged state, so the step records the merged
            // post-state. A revert that only happens on some paths never
            // counts as a concrete revert.
            _ => Flow::Return,
        })
    }

    fn write(
        &self,
        target: &AssignTarget,
        value: Value,
        function: &Function,
        state: &mut ExecState,
    ) -> Result<(), AnalysisError> {
        match target {
            AssignTarget::State(name) => {
                // Declared-and-mutable check: a miss here is a model
                // extraction gap, fatal by design.
                match self.model.state_var(name) {
                    Some(var) if var.constant.is_none() => {
                        let value = match (&state.path, state.vars.get(name)) {
                            (Some(path), Some(old)) => guarded(path, &value, old),
                            _ => value,
                        };
                        state.vars.insert(name.clone(), value);
                        Ok(())
                    }
                    _ => Err(AnalysisError::StateDivergence {
                        variable: name.clone(),
                        function: function.name.clone(),
                    }),
                }
            }
            AssignTarget::Local(name) => {
                let value = match (&state.path, state.locals.get(name)) {
                    (Some(path), Some(old)) => guarded(path, &value, old),
                    _ => value,
                };
                state.locals.insert(name.clone(), value);
                Ok(())
            }
        }
    }

    fn eval(
        &self,
        expr: &Expr,
        function: &Function,
        params: &IndexMap<String, Value>,
        env: CallEnv,
        state: &ExecState,
    ) -> Result<Value, AnalysisError> {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::State(name) => state
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| AnalysisError::StateDivergence {
                    variable: name.clone(),
                    function: function.name.clone(),
                }),
            Expr::Param(name) => params.get(name).cloned().ok_or_else(|| {
                AnalysisError::BadInvocation {
                    function: function.name.clone(),
                    reason: format!("unbound parameter '{}'", name),
                }
            }),
            Expr::Local(name) => state.locals.get(name).cloned().ok_or_else(|| {
                CoreError::UnknownVariable {
                    name: name.clone(),
                }
                .into()
            }),
            Expr::Env(term) => Ok(env.term(term)),
            Expr::BlockHash(arg) => {
                let v = self.eval(arg, function, params, env, state)?;
                Ok(env.blockhash(&v))
            }
            Expr::Cast { expr, .. } => self.eval(expr, function, params, env, state),
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, function, params, env, state)?;
                Ok(Value::unary(*op, &v)?)
            }
            Expr::Binary { op, lhs, rhs } => {
                // Short-circuit only on concrete booleans; symbolic operands
                // fall through to the algebraic path.
                if *op == BinOp::And {
                    let l = self.eval(lhs, function, params, env, state)?;
                    if l == Value::Bool(false) {
                        return Ok(Value::Bool(false));
                    }
                    let r = self.eval(rhs, function, params, env, state)?;
                    return Ok(Value::binary(BinOp::And, &l, &r)?);
                }
                if *op == BinOp::Or {
                    let l = self.eval(lhs, function, params, env, state)?;
                    if l == Value::Bool(true) {
                        return Ok(Value::Bool(true));
                    }
                    let r = self.eval(rhs, function, params, env, state)?;
                    return Ok(Value::binary(BinOp::Or, &l, &r)?);
                }
                let l = self.eval(lhs, function, params, env, state)?;
                let r = self.eval(rhs, function, params, env, state)?;
                Ok(Value::binary(*op, &l, &r)?)
            }
        }
    }
}

fn bind_params(
    function: &Function,
    invocation: &Invocation,
) -> Result<IndexMap<String, Value>, AnalysisError> {
    if invocation.args.len() != function.arity() {
        return Err(AnalysisError::BadInvocation {
            function: function.name.clone(),
            reason: format!(
                "expected {} argument(s), got {}",
                function.arity(),
                invocation.args.len()
            ),
        });
    }
    Ok(function
        .params
        .iter()
        .zip(invocation.args.iter())
        .map(|((name, _), value)| (name.clone(), value.clone()))
        .collect())
}

/// The state variables as a reverting arm contributes them: rolled back to
/// the invocation's initial values on the live path, untouched elsewhere.
fn reverted_vars(state: &ExecState) -> IndexMap<String, Value> {
    match &state.path {
        None => state.initial_vars.clone(),
        Some(path) => state
            .vars
            .iter()
            .map(|(name, value)| {
                let rolled = match state.initial_vars.get(name) {
                    Some(initial) => guarded(path, initial, value),
                    None => value.clone(),
                };
                (name.clone(), rolled)
            })
            .collect(),
    }
}

fn conjoin(path: Option<SymExpr>, cond: SymExpr) -> SymExpr {
    match path {
        None => cond,
        Some(p) => SymExpr::Binary {
            op: BinOp::And,
            lhs: Box::new(p),
            rhs: Box::new(cond),
        }
        .simplify(),
    }
}

fn merge_env(
    cond: &SymExpr,
    then_vars: &IndexMap<String, Value>,
    else_vars: &IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    let mut merged = IndexMap::new();
    for (name, then_v) in then_vars {
        match else_vars.get(name) {
            Some(else_v) if else_v == then_v => {
                merged.insert(name.clone(), then_v.clone());
            }
            Some(else_v) => {
                let ite = SymExpr::Ite {
                    cond: Box::new(cond.clone()),
                    then: Box::new(then_v.to_sym()),
                    otherwise: Box::new(else_v.to_sym()),
                }
                .simplify();
                merged.insert(name.clone(), Value::Sym(ite));
            }
            // Locals declared only inside the arm go out of scope.
            None => {}
        }
    }
    merged
}
