//! Recursive-descent parser producing a [`ContractModel`].
//!
//! Identifiers are resolved during parsing: every name in a function body is
//! classified as a parameter, local, or declared state variable, and
//! `constant` state variables are inlined to their values. A name that
//! matches none of these scopes is a parse error, so extraction gaps surface
//! here rather than as divergence deep in the simulator.

use std::collections::HashMap;

use solguard_core::model::{
    AssignTarget, BinOp, ContractModel, EnvTerm, Expr, Function, StateVariable, Statement, UnOp,
    VarType, Visibility,
};
use solguard_core::FunctionId;

use crate::error::AnalysisError;
use crate::extract::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Mutable state declared so far (resolution target for `Expr::State`).
    state: Vec<StateVariable>,
    /// `constant` declarations, inlined at use sites.
    constants: HashMap<String, i128>,
}

/// Function-body scope: parameters plus a stack of block-local scopes.
struct Scope {
    params: HashMap<String, VarType>,
    locals: Vec<HashMap<String, VarType>>,
}

impl Scope {
    fn new(params: &[(String, VarType)]) -> Self {
        Scope {
            params: params.iter().cloned().collect(),
            locals: vec![HashMap::new()],
        }
    }

    fn push(&mut self) {
        self.locals.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.locals.pop();
    }

    fn declare_local(&mut self, name: &str, ty: VarType) {
        if let Some(top) = self.locals.last_mut() {
            top.insert(name.to_string(), ty);
        }
    }

    fn lookup_local(&self, name: &str) -> Option<VarType> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            state: Vec::new(),
            constants: HashMap::new(),
        }
    }

    pub fn parse_contract(mut self) -> Result<ContractModel, AnalysisError> {
        self.expect(&TokenKind::Contract, "expected 'contract'")?;
        let name = self.expect_ident("expected contract name")?;
        self.expect(&TokenKind::LBrace, "expected '{' after contract name")?;

        let mut functions: Vec<Function> = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Function => {
                    let id = FunctionId(functions.len() as u32);
                    functions.push(self.parse_function(id)?);
                }
                TokenKind::TyUint | TokenKind::TyBool | TokenKind::TyAddress => {
                    self.parse_state_decl()?;
                }
                _ => {
                    return Err(self.err_here("expected state declaration or function"));
                }
            }
        }
        // Anything after the closing brace (other than EOF) is malformed.
        if self.peek().kind != TokenKind::Eof {
            return Err(self.err_here("unexpected tokens after contract body"));
        }

        Ok(ContractModel {
            name,
            state: self.state,
            functions,
        })
    }

    // ----- declarations ---------------------------------------------------

    fn parse_state_decl(&mut self) -> Result<(), AnalysisError> {
        let ty = self.parse_type()?;
        let mut visibility = Visibility::Internal;
        let mut constant = false;
        loop {
            match self.peek().kind {
                TokenKind::Public => {
                    visibility = Visibility::Public;
                    self.bump();
                }
                TokenKind::Private => {
                    visibility = Visibility::Private;
                    self.bump();
                }
                TokenKind::Internal => {
                    visibility = Visibility::Internal;
                    self.bump();
                }
                TokenKind::Constant => {
                    constant = true;
                    self.bump();
                }
                _ => break,
            }
        }
        let name = self.expect_ident("expected state variable name")?;

        let init = if self.eat(&TokenKind::Assign) {
            let expr = self.parse_const_expr()?;
            Some(expr)
        } else {
            None
        };
        self.expect(&TokenKind::Semi, "expected ';' after state declaration")?;

        if constant {
            let value = init.ok_or_else(|| {
                self.err_prev(format!("constant '{}' requires an initializer", name))
            })?;
            self.constants.insert(name.clone(), value);
            self.state.push(StateVariable {
                name,
                ty,
                visibility,
                constant: Some(value),
                initial: None,
            });
        } else {
            self.state.push(StateVariable {
                name,
                ty,
                visibility,
                constant: None,
                initial: init,
            });
        }
        Ok(())
    }

    fn parse_function(&mut self, id: FunctionId) -> Result<Function, AnalysisError> {
        self.expect(&TokenKind::Function, "expected 'function'")?;
        let name = self.expect_ident("expected function name")?;
        self.expect(&TokenKind::LParen, "expected '(' after function name")?;

        let mut params = Vec::new();
        if self.peek().kind != TokenKind::RParen {
            loop {
                let ty = self.parse_type()?;
                let pname = self.expect_ident("expected parameter name")?;
                params.push((pname, ty));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "expected ')' after parameters")?;

        let mut visibility = Visibility::Public;
        let mut returns = None;
        loop {
            match self.peek().kind {
                TokenKind::Public => {
                    visibility = Visibility::Public;
                    self.bump();
                }
                TokenKind::Private => {
                    visibility = Visibility::Private;
                    self.bump();
                }
                TokenKind::Internal => {
                    visibility = Visibility::Internal;
                    self.bump();
                }
                TokenKind::Returns => {
                    self.bump();
                    self.expect(&TokenKind::LParen, "expected '(' after 'returns'")?;
                    returns = Some(self.parse_type()?);
                    self.expect(&TokenKind::RParen, "expected ')' after return type")?;
                }
                _ => break,
            }
        }

        let mut scope = Scope::new(&params);
        let body = self.parse_block(&mut scope)?;
        Ok(Function::new(id, name, visibility, params, returns, body))
    }

    fn parse_type(&mut self) -> Result<VarType, AnalysisError> {
        let ty = match self.peek().kind {
            TokenKind::TyUint => VarType::Uint,
            TokenKind::TyBool => VarType::Bool,
            TokenKind::TyAddress => VarType::Address,
            _ => return Err(self.err_here("expected type")),
        };
        self.bump();
        Ok(ty)
    }

    // ----- statements -----------------------------------------------------

    fn parse_block(&mut self, scope: &mut Scope) -> Result<Vec<Statement>, AnalysisError> {
        self.expect(&TokenKind::LBrace, "expected '{'")?;
        scope.push();
        let mut stmts = Vec::new();
        while self.peek().kind != TokenKind::RBrace {
            if self.peek().kind == TokenKind::Eof {
                return Err(self.err_here("unexpected end of input in block"));
            }
            stmts.push(self.parse_statement(scope)?);
        }
        self.bump(); // consume '}'
        scope.pop();
        Ok(stmts)
    }

    fn parse_statement(&mut self, scope: &mut Scope) -> Result<Statement, AnalysisError> {
        match self.peek().kind.clone() {
            TokenKind::TyUint | TokenKind::TyBool | TokenKind::TyAddress => {
                // Disambiguate a local declaration (`uint256 x = e;`) from a
                // cast expression statement (`uint256(e)...`, only reachable
                // through external-call syntax).
                if matches!(self.peek_ahead(1).kind, TokenKind::Ident(_)) {
                    let ty = self.parse_type()?;
                    let name = self.expect_ident("expected local variable name")?;
                    self.expect(&TokenKind::Assign, "local declaration requires an initializer")?;
                    let init = self.parse_expr(scope)?;
                    self.expect(&TokenKind::Semi, "expected ';' after declaration")?;
                    scope.declare_local(&name, ty);
                    Ok(Statement::Local { name, ty, init })
                } else {
                    self.parse_expr_statement(scope)
                }
            }
            TokenKind::If => self.parse_if(scope),
            TokenKind::Require => {
                self.bump();
                self.expect(&TokenKind::LParen, "expected '(' after 'require'")?;
                let cond = self.parse_expr(scope)?;
                let message = if self.eat(&TokenKind::Comma) {
                    match self.peek().kind.clone() {
                        TokenKind::Str(s) => {
                            self.bump();
                            Some(s)
                        }
                        _ => return Err(self.err_here("expected string message in require")),
                    }
                } else {
                    None
                };
                self.expect(&TokenKind::RParen, "expected ')' after require")?;
                self.expect(&TokenKind::Semi, "expected ';' after require")?;
                Ok(Statement::Require { cond, message })
            }
            TokenKind::Revert => {
                self.bump();
                self.expect(&TokenKind::LParen, "expected '(' after 'revert'")?;
                self.expect(&TokenKind::RParen, "expected ')' after revert")?;
                self.expect(&TokenKind::Semi, "expected ';' after revert")?;
                Ok(Statement::Revert)
            }
            TokenKind::Return => {
                self.bump();
                if self.eat(&TokenKind::Semi) {
                    Ok(Statement::Return(None))
                } else {
                    let expr = self.parse_expr(scope)?;
                    self.expect(&TokenKind::Semi, "expected ';' after return")?;
                    Ok(Statement::Return(Some(expr)))
                }
            }
            _ => self.parse_expr_statement(scope),
        }
    }

    fn parse_if(&mut self, scope: &mut Scope) -> Result<Statement, AnalysisError> {
        self.expect(&TokenKind::If, "expected 'if'")?;
        self.expect(&TokenKind::LParen, "expected '(' after 'if'")?;
        let cond = self.parse_expr(scope)?;
        self.expect(&TokenKind::RParen, "expected ')' after condition")?;
        let then_branch = self.parse_block(scope)?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.peek().kind == TokenKind::If {
                vec![self.parse_if(scope)?]
            } else {
                self.parse_block(scope)?
            }
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    /// Assignment, increment/decrement, or external-call statement.
    fn parse_expr_statement(&mut self, scope: &mut Scope) -> Result<Statement, AnalysisError> {
        // Assignment targets are a bare identifier; anything else must end up
        // as an external call to be a valid statement.
        if let TokenKind::Ident(name) = self.peek().kind.clone() {
            match self.peek_ahead(1).kind {
                TokenKind::Assign
                | TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus => {
                    self.bump();
                    let target = self.resolve_assign_target(&name)?;
                    let read_back = match &target {
                        AssignTarget::State(n) => Expr::State(n.clone()),
                        AssignTarget::Local(n) => Expr::Local(n.clone()),
                    };
                    let value = match self.peek().kind.clone() {
                        TokenKind::Assign => {
                            self.bump();
                            self.parse_expr(scope)?
                        }
                        TokenKind::PlusAssign => {
                            self.bump();
                            let rhs = self.parse_expr(scope)?;
                            Expr::Binary {
                                op: BinOp::Add,
                                lhs: Box::new(read_back),
                                rhs: Box::new(rhs),
                            }
                        }
                        TokenKind::MinusAssign => {
                            self.bump();
                            let rhs = self.parse_expr(scope)?;
                            Expr::Binary {
                                op: BinOp::Sub,
                                lhs: Box::new(read_back),
                                rhs: Box::new(rhs),
                            }
                        }
                        TokenKind::PlusPlus => {
                            self.bump();
                            Expr::Binary {
                                op: BinOp::Add,
                                lhs: Box::new(read_back),
                                rhs: Box::new(Expr::Int(1)),
                            }
                        }
                        TokenKind::MinusMinus => {
                            self.bump();
                            Expr::Binary {
                                op: BinOp::Sub,
                                lhs: Box::new(read_back),
                                rhs: Box::new(Expr::Int(1)),
                            }
                        }
                        _ => unreachable!("guarded by peek_ahead above"),
                    };
                    self.expect(&TokenKind::Semi, "expected ';' after assignment")?;
                    return Ok(Statement::Assign { target, value });
                }
                _ => {}
            }
        }

        // Otherwise: must be an external call statement.
        match self.parse_postfix(scope)? {
            Postfix::ExternalCall { target } => {
                self.expect(&TokenKind::Semi, "expected ';' after external call")?;
                Ok(Statement::ExternalCall { target })
            }
            Postfix::Value(_) => Err(self.err_here("expression is not a valid statement")),
        }
    }

    fn resolve_assign_target(&self, name: &str) -> Result<AssignTarget, AnalysisError> {
        if self.constants.contains_key(name) {
            return Err(self.err_prev(format!("cannot assign to constant '{}'", name)));
        }
        if self.state.iter().any(|v| v.name == name && v.constant.is_none()) {
            Ok(AssignTarget::State(name.to_string()))
        } else {
            Ok(AssignTarget::Local(name.to_string()))
        }
    }

    // ----- expressions ----------------------------------------------------

    fn parse_expr(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        self.parse_or(scope)
    }

    fn parse_or(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        let mut lhs = self.parse_and(scope)?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.parse_and(scope)?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        let mut lhs = self.parse_equality(scope)?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.parse_equality(scope)?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        let mut lhs = self.parse_relational(scope)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational(scope)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        let mut lhs = self.parse_additive(scope)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive(scope)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        let mut lhs = self.parse_multiplicative(scope)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative(scope)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        let mut lhs = self.parse_unary(scope)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary(scope)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        match self.peek().kind {
            TokenKind::Bang => {
                self.bump();
                let expr = self.parse_unary(scope)?;
                Ok(Expr::Unary {
                    op: UnOp::Not,
                    expr: Box::new(expr),
                })
            }
            TokenKind::Minus => {
                self.bump();
                let expr = self.parse_unary(scope)?;
                Ok(Expr::Unary {
                    op: UnOp::Neg,
                    expr: Box::new(expr),
                })
            }
            _ => match self.parse_postfix(scope)? {
                Postfix::Value(e) => Ok(e),
                Postfix::ExternalCall { .. } => {
                    Err(self.err_prev("external calls are statements, not expressions"))
                }
            },
        }
    }

    fn parse_postfix(&mut self, scope: &mut Scope) -> Result<Postfix, AnalysisError> {
        let expr = self.parse_primary(scope)?;
        // Member access: only the external-call markers are modeled.
        while self.peek().kind == TokenKind::Dot {
            self.bump();
            let member = self.expect_ident("expected member name after '.'")?;
            match member.as_str() {
                "call" | "transfer" | "send" | "delegatecall" => {
                    self.expect(&TokenKind::LParen, "expected '(' after call member")?;
                    // Arguments to the callee are outside the model; skip to
                    // the matching ')'.
                    let mut depth = 1usize;
                    loop {
                        match self.peek().kind {
                            TokenKind::LParen => depth += 1,
                            TokenKind::RParen => {
                                depth -= 1;
                                if depth == 0 {
                                    self.bump();
                                    break;
                                }
                            }
                            TokenKind::Eof => {
                                return Err(self.err_here("unterminated call argument list"))
                            }
                            _ => {}
                        }
                        self.bump();
                    }
                    return Ok(Postfix::ExternalCall { target: expr });
                }
                other => {
                    return Err(
                        self.err_prev(format!("unsupported member access '.{}'", other))
                    )
                }
            }
        }
        Ok(Postfix::Value(expr))
    }

    fn parse_primary(&mut self, scope: &mut Scope) -> Result<Expr, AnalysisError> {
        match self.peek().kind.clone() {
            TokenKind::Int(v) => {
                self.bump();
                Ok(Expr::Int(v))
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::Bool(false))
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr(scope)?;
                self.expect(&TokenKind::RParen, "expected ')'")?;
                Ok(expr)
            }
            TokenKind::TyUint | TokenKind::TyBool | TokenKind::TyAddress => {
                let ty = self.parse_type()?;
                self.expect(&TokenKind::LParen, "expected '(' in cast")?;
                let expr = self.parse_expr(scope)?;
                self.expect(&TokenKind::RParen, "expected ')' after cast")?;
                Ok(Expr::Cast {
                    ty,
                    expr: Box::new(expr),
                })
            }
            TokenKind::Ident(name) => {
                self.bump();
                match name.as_str() {
                    "block" => {
                        self.expect(&TokenKind::Dot, "expected '.' after 'block'")?;
                        let member = self.expect_ident("expected member after 'block.'")?;
                        match member.as_str() {
                            "number" => Ok(Expr::Env(EnvTerm::BlockNumber)),
                            "timestamp" => Ok(Expr::Env(EnvTerm::BlockTimestamp)),
                            other => Err(self.err_prev(format!(
                                "unsupported environment term 'block.{}'",
                                other
                            ))),
                        }
                    }
                    "msg" => {
                        self.expect(&TokenKind::Dot, "expected '.' after 'msg'")?;
                        let member = self.expect_ident("expected member after 'msg.'")?;
                        match member.as_str() {
                            "value" => Ok(Expr::Env(EnvTerm::MsgValue)),
                            "sender" => Ok(Expr::Env(EnvTerm::MsgSender)),
                            other => Err(self.err_prev(format!(
                                "unsupported environment term 'msg.{}'",
                                other
                            ))),
                        }
                    }
                    "blockhash" => {
                        self.expect(&TokenKind::LParen, "expected '(' after 'blockhash'")?;
                        let arg = self.parse_expr(scope)?;
                        self.expect(&TokenKind::RParen, "expected ')' after blockhash")?;
                        Ok(Expr::BlockHash(Box::new(arg)))
                    }
                    _ => self.resolve_ident(&name, scope),
                }
            }
            _ => Err(self.err_here("expected expression")),
        }
    }

    /// Classifies an identifier: local (innermost first), parameter, constant
    /// (inlined), then mutable state. Unknown names are parse errors.
    fn resolve_ident(&self, name: &str, scope: &Scope) -> Result<Expr, AnalysisError> {
        if scope.lookup_local(name).is_some() {
            return Ok(Expr::Local(name.to_string()));
        }
        if scope.params.contains_key(name) {
            return Ok(Expr::Param(name.to_string()));
        }
        if let Some(value) = self.constants.get(name) {
            return Ok(Expr::Int(*value));
        }
        if self.state.iter().any(|v| v.name == name) {
            return Ok(Expr::State(name.to_string()));
        }
        Err(self.err_prev(format!("unknown identifier '{}'", name)))
    }

    /// Parses and folds a compile-time constant initializer. Only literals,
    /// previously declared constants, arithmetic, unary minus, and casts are
    /// allowed.
    fn parse_const_expr(&mut self) -> Result<i128, AnalysisError> {
        let mut scope = Scope::new(&[]);
        let start = self.pos;
        let expr = self.parse_expr(&mut scope)?;
        fold_const(&expr).ok_or_else(|| {
            let tok = &self.tokens[start.min(self.tokens.len() - 1)];
            AnalysisError::parse(
                tok.line,
                tok.column,
                "initializer must be a compile-time integer constant",
            )
        })
    }

    // ----- token helpers --------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<(), AnalysisError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.err_here(message))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String, AnalysisError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.err_here(message)),
        }
    }

    fn err_here(&self, message: impl Into<String>) -> AnalysisError {
        let tok = self.peek();
        AnalysisError::parse(tok.line, tok.column, message)
    }

    /// Error anchored at the previously consumed token (for resolution
    /// failures reported after the identifier was eaten).
    fn err_prev(&self, message: impl Into<String>) -> AnalysisError {
        let tok = &self.tokens[self.pos.saturating_sub(1)];
        AnalysisError::parse(tok.line, tok.column, message)
    }
}

enum Postfix {
    Value(Expr),
    ExternalCall { target: Expr },
}

fn fold_const(expr: &Expr) -> Option<i128> {
    match expr {
        Expr::Int(v) => Some(*v),
        Expr::Cast { expr, .. } => fold_const(expr),
        Expr::Unary {
            op: UnOp::Neg,
            expr,
        } => fold_const(expr).map(|v| -v),
        Expr::Binary { op, lhs, rhs } => {
            let a = fold_const(lhs)?;
            let b = fold_const(rhs)?;
            match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div if b != 0 => a.checked_div(b),
                BinOp::Mod if b != 0 => a.checked_rem(b),
                _ => None,
            }
        }
        _ => None,
    }
}
