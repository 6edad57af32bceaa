//! Static pass over expression trees: variable scoping, constant conversion
//! checks and fault-isolated `switch` branches.

use std::sync::{Arc, OnceLock};

use crate::diagnostics::TypeError;
use crate::expr::{Expr, SwitchCase};
use crate::model::{NodeKind, QName, XdmNode};
use crate::runtime::{DynamicContext, Error, ErrorCode, StaticContext};
use crate::xdm::{ExpandedName, sequence_cursor};

static DEFAULT_STATIC_CONTEXT: OnceLock<StaticContext> = OnceLock::new();

fn default_static_ctx() -> &'static StaticContext {
    DEFAULT_STATIC_CONTEXT.get_or_init(StaticContext::default)
}

/// Compile using a lazily initialized default StaticContext
pub fn compile_expr(expr: Expr) -> Result<Expr, Error> {
    Compiler::new(default_static_ctx()).compile(expr)
}

/// Compile with an explicitly provided StaticContext
pub fn compile_expr_with_context(expr: Expr, static_ctx: &StaticContext) -> Result<Expr, Error> {
    Compiler::new(static_ctx).compile(expr)
}

/// Replacement for a branch that failed to compile. Evaluating it raises
/// `err`; never evaluating it means the error is never observed.
pub fn make_error_expression(err: Error) -> Expr {
    Expr::Deferred(err)
}

/// Node type for compile-time evaluation of constant expressions, which
/// never produce nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConstNode {}

impl XdmNode for ConstNode {
    fn kind(&self) -> NodeKind {
        match *self {}
    }
    fn name(&self) -> Option<QName> {
        match *self {}
    }
    fn string_value(&self) -> String {
        match *self {}
    }
}

type CResult<T> = Result<T, Error>;

/// Static pass over an [`Expr`]: resolves variable scopes, checks constant
/// conversions ahead of evaluation and isolates `switch` branch failures.
pub struct Compiler<'a> {
    static_ctx: &'a StaticContext,
    scopes: Vec<ExpandedName>,
    const_ctx: DynamicContext<ConstNode>,
}

impl<'a> Compiler<'a> {
    pub fn new(static_ctx: &'a StaticContext) -> Self {
        let const_ctx = DynamicContext {
            static_ctx: Arc::new(static_ctx.clone()),
            ..Default::default()
        };
        Self {
            static_ctx,
            scopes: Vec::new(),
            const_ctx,
        }
    }

    pub fn compile(&mut self, expr: Expr) -> CResult<Expr> {
        match expr {
            e @ (Expr::Empty | Expr::Literal(_) | Expr::ContextItem | Expr::Deferred(_)) => Ok(e),
            Expr::Sequence(items) => Ok(Expr::Sequence(
                items
                    .into_iter()
                    .map(|e| self.compile(e))
                    .collect::<CResult<Vec<_>>>()?,
            )),
            Expr::VarRef(name) => {
                if !self.in_scope(&name) {
                    return Err(Error::from_code(
                        ErrorCode::XPST0008,
                        format!("undeclared variable ${name}"),
                    ));
                }
                Ok(Expr::VarRef(name))
            }
            Expr::Let {
                name,
                declared,
                value,
                body,
            } => {
                let value = self.compile(*value)?;
                if let Some(ty) = &declared
                    && value.is_constant()
                {
                    let items = value.evaluate(&self.const_ctx)?;
                    ty.cast_all(sequence_cursor(items), &self.const_ctx)?;
                }
                self.scopes.push(name.clone());
                let body = self.compile(*body);
                self.scopes.pop();
                Ok(Expr::Let {
                    name,
                    declared,
                    value: Box::new(value),
                    body: Box::new(body?),
                })
            }
            Expr::Cast { expr, target } => {
                let compiled = self.compile(*expr)?.cast(target);
                self.check_constant(&compiled)?;
                Ok(compiled)
            }
            Expr::InstanceOf { expr, target } => Ok(self.compile(*expr)?.instance_of(target)),
            Expr::Switch { operand, cases } => self.compile_switch(*operand, cases),
            Expr::Delete(target) => Ok(Expr::delete(self.compile(*target)?)),
        }
    }

    /// Update checks run over all cases before any case is compiled; a
    /// failing check aborts the whole switch. Branch compile errors do not.
    fn compile_switch(&mut self, operand: Expr, cases: Vec<SwitchCase>) -> CResult<Expr> {
        let operand = self.compile(operand)?;
        if operand.has_updates() {
            return Err(TypeError::UpdateNotAllowedInSelector.into());
        }
        for case in &cases {
            case.check_updates()?;
        }
        let cases = cases.into_iter().map(|c| c.compile(self)).collect();
        Ok(Expr::switch(operand, cases))
    }

    /// Constant operands are converted once here so conversion failures
    /// surface at compile time. The expression itself is kept; temporal
    /// results depend on the implicit timezone at evaluation.
    fn check_constant(&self, expr: &Expr) -> CResult<()> {
        if expr.is_constant() {
            expr.evaluate(&self.const_ctx)?;
        }
        Ok(())
    }

    fn in_scope(&self, name: &ExpandedName) -> bool {
        self.scopes.iter().rev().any(|n| n == name)
            || self.static_ctx.in_scope_variables.contains(name)
    }
}
