//! Minimal expression tree: enough to host typed bindings, casts and
//! `switch` cases whose branches compile independently.

use core::fmt;
use itertools::Itertools;

use crate::compiler::{Compiler, make_error_expression};
use crate::diagnostics::TypeError;
use crate::model::XdmNode;
use crate::runtime::{DynamicContext, Error, ErrorCode};
use crate::seqtype::{Occurrence, SequenceType};
use crate::types::casting::lexical;
use crate::types::ReturnType;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence, XdmString, sequence_cursor};

#[derive(Debug, Clone)]
pub enum Expr {
    /// `()`
    Empty,
    Literal(XdmAtomicValue),
    Sequence(Vec<Expr>),
    ContextItem,
    VarRef(ExpandedName),
    /// `let $name as declared := value return body`
    Let {
        name: ExpandedName,
        declared: Option<SequenceType>,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// `expr cast as target`
    Cast {
        expr: Box<Expr>,
        target: SequenceType,
    },
    InstanceOf {
        expr: Box<Expr>,
        target: SequenceType,
    },
    Switch {
        operand: Box<Expr>,
        cases: Vec<SwitchCase>,
    },
    /// `delete node target`; the only updating expression.
    Delete(Box<Expr>),
    /// Placeholder for a branch whose compilation failed; raises the captured
    /// error when evaluated.
    Deferred(Error),
}

impl Expr {
    /// String literal; keeps its literal provenance.
    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(XdmAtomicValue::String(XdmString::literal(s)))
    }

    pub fn integer(i: i64) -> Self {
        Expr::Literal(XdmAtomicValue::Integer(i))
    }

    pub fn decimal(d: f64) -> Self {
        Expr::Literal(XdmAtomicValue::Decimal(d))
    }

    pub fn var(local: impl Into<String>) -> Self {
        Expr::VarRef(ExpandedName::local(local))
    }

    pub fn cast(self, target: SequenceType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            target,
        }
    }

    pub fn instance_of(self, target: SequenceType) -> Self {
        Expr::InstanceOf {
            expr: Box::new(self),
            target,
        }
    }

    pub fn bind(
        name: impl Into<String>,
        declared: Option<SequenceType>,
        value: Expr,
        body: Expr,
    ) -> Self {
        Expr::Let {
            name: ExpandedName::local(name),
            declared,
            value: Box::new(value),
            body: Box::new(body),
        }
    }

    pub fn switch(operand: Expr, cases: Vec<SwitchCase>) -> Self {
        Expr::Switch {
            operand: Box::new(operand),
            cases,
        }
    }

    pub fn delete(target: Expr) -> Self {
        Expr::Delete(Box::new(target))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Expr::Deferred(_))
    }

    /// True if the expression or any sub-expression is updating.
    pub fn has_updates(&self) -> bool {
        match self {
            Expr::Delete(_) => true,
            Expr::Empty
            | Expr::Literal(_)
            | Expr::ContextItem
            | Expr::VarRef(_)
            | Expr::Deferred(_) => false,
            Expr::Sequence(items) => items.iter().any(Expr::has_updates),
            Expr::Let { value, body, .. } => value.has_updates() || body.has_updates(),
            Expr::Cast { expr, .. } | Expr::InstanceOf { expr, .. } => expr.has_updates(),
            Expr::Switch { operand, cases } => {
                operand.has_updates() || cases.iter().any(|c| c.exprs.iter().any(Expr::has_updates))
            }
        }
    }

    /// True if the value does not depend on the dynamic context.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Empty | Expr::Literal(_) => true,
            Expr::ContextItem | Expr::VarRef(_) | Expr::Delete(_) | Expr::Deferred(_) => false,
            Expr::Sequence(items) => items.iter().all(Expr::is_constant),
            Expr::Let { value, body, .. } => value.is_constant() && body.is_constant(),
            Expr::Cast { expr, .. } | Expr::InstanceOf { expr, .. } => expr.is_constant(),
            Expr::Switch { operand, cases } => {
                operand.is_constant() && cases.iter().all(|c| c.exprs.iter().all(Expr::is_constant))
            }
        }
    }

    /// Statically known result shape, where the expression declares one.
    pub fn return_type(&self) -> Option<ReturnType> {
        match self {
            Expr::Literal(a) => Some(SequenceType::atomic(a.atomic_type(), Occurrence::ExactlyOne).return_type()),
            Expr::Cast { target, .. } => Some(target.return_type()),
            Expr::InstanceOf { .. } => Some(ReturnType::Other),
            Expr::Let { body, .. } => body.return_type(),
            _ => None,
        }
    }

    pub fn evaluate<N: XdmNode>(&self, ctx: &DynamicContext<N>) -> Result<XdmSequence<N>, Error> {
        match self {
            Expr::Empty => Ok(Vec::new()),
            Expr::Literal(a) => Ok(vec![XdmItem::Atomic(a.clone())]),
            Expr::Sequence(items) => {
                let mut out = Vec::new();
                for e in items {
                    out.extend(e.evaluate(ctx)?);
                }
                Ok(out)
            }
            Expr::ContextItem => ctx
                .context_item
                .clone()
                .map(|it| vec![it])
                .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context item is undefined")),
            Expr::VarRef(name) => ctx.variables.get(name).cloned().ok_or_else(|| {
                Error::from_code(ErrorCode::XPST0008, format!("variable ${name} is not bound"))
            }),
            Expr::Let {
                name,
                declared,
                value,
                body,
            } => {
                let mut bound = value.evaluate(ctx)?;
                if let Some(ty) = declared {
                    bound = ty.cast_all(sequence_cursor(bound), ctx)?;
                }
                body.evaluate(&ctx.with_binding(name.clone(), bound))
            }
            Expr::Cast { expr, target } => {
                let mut items = expr.evaluate(ctx)?.into_iter();
                let first = items.next();
                if items.next().is_some() {
                    return Err(TypeError::CastCardinalityExceeded {
                        target: *target.item_type(),
                        occurrence: target.occurrence(),
                    }
                    .into());
                }
                Ok(target.cast_one(first, expr, ctx)?.into_iter().collect())
            }
            Expr::InstanceOf { expr, target } => {
                let value = expr.evaluate(ctx)?;
                let b = target.instance_of(sequence_cursor(value))?;
                Ok(vec![XdmItem::Atomic(XdmAtomicValue::Boolean(b))])
            }
            Expr::Switch { operand, cases } => {
                let op = single_atomic(operand.evaluate(ctx)?)?;
                for case in cases {
                    if case.matches(op.as_ref(), ctx)? {
                        return case.result().evaluate(ctx);
                    }
                }
                Ok(Vec::new())
            }
            Expr::Delete(target) => {
                let nodes = target.evaluate(ctx)?;
                if nodes.iter().any(|it| matches!(it, XdmItem::Atomic(_))) {
                    return Err(Error::from_code(
                        ErrorCode::XUTY0007,
                        "delete target must be a sequence of nodes",
                    ));
                }
                tracing::debug!(nodes = nodes.len(), "delete collected; pending updates are not applied here");
                Ok(Vec::new())
            }
            Expr::Deferred(err) => Err(err.clone()),
        }
    }
}

/// Atomize a sequence that may hold at most one item.
fn single_atomic<N: XdmNode>(seq: XdmSequence<N>) -> Result<Option<XdmAtomicValue>, Error> {
    let mut it = seq.into_iter();
    let first = it.next().map(XdmItem::atomize);
    if it.next().is_some() {
        return Err(Error::from_code(
            ErrorCode::XPTY0004,
            "switch operand must be a single item or empty",
        ));
    }
    Ok(first)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Empty => f.write_str("()"),
            Expr::Literal(XdmAtomicValue::String(s)) => write!(f, "\"{}\"", s.as_str().replace('"', "\"\"")),
            Expr::Literal(a) => f.write_str(&lexical(a)),
            Expr::Sequence(items) => write!(f, "({})", items.iter().join(", ")),
            Expr::ContextItem => f.write_str("."),
            Expr::VarRef(name) => write!(f, "${name}"),
            Expr::Let {
                name,
                declared,
                value,
                body,
            } => {
                write!(f, "let ${name}")?;
                if let Some(ty) = declared {
                    write!(f, " as {ty}")?;
                }
                write!(f, " := {value} return {body}")
            }
            Expr::Cast { expr, target } => write!(f, "{expr} cast as {target}"),
            Expr::InstanceOf { expr, target } => write!(f, "{expr} instance of {target}"),
            Expr::Switch { operand, cases } => {
                write!(f, "switch({operand})")?;
                cases.iter().try_for_each(|c| write!(f, "{c}"))
            }
            Expr::Delete(target) => write!(f, "delete node {target}"),
            Expr::Deferred(err) => write!(f, "error({})", err.format_code()),
        }
    }
}

/// One case of a `switch`: element 0 is the result expression, the rest are
/// selectors compared against the operand. A case without selectors is the
/// default.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    exprs: Vec<Expr>,
}

impl SwitchCase {
    pub fn new(result: Expr, selectors: Vec<Expr>) -> Self {
        let mut exprs = Vec::with_capacity(selectors.len() + 1);
        exprs.push(result);
        exprs.extend(selectors);
        Self { exprs }
    }

    pub fn default_case(result: Expr) -> Self {
        Self::new(result, Vec::new())
    }

    pub fn result(&self) -> &Expr {
        &self.exprs[0]
    }

    pub fn selectors(&self) -> &[Expr] {
        &self.exprs[1..]
    }

    pub fn is_default(&self) -> bool {
        self.exprs.len() == 1
    }

    /// Selectors must not contain updating expressions; the result branch
    /// may.
    pub fn check_updates(&self) -> Result<(), Error> {
        if self.selectors().iter().any(Expr::has_updates) {
            return Err(TypeError::UpdateNotAllowedInSelector.into());
        }
        Ok(())
    }

    /// Compile every branch independently. A branch that fails to compile is
    /// replaced by a placeholder raising the captured error, so the case as a
    /// whole always compiles.
    pub fn compile(self, compiler: &mut Compiler<'_>) -> Self {
        let exprs = self
            .exprs
            .into_iter()
            .enumerate()
            .map(|(i, e)| match compiler.compile(e) {
                Ok(compiled) => compiled,
                Err(err) => {
                    tracing::debug!(branch = i, code = %err.format_code(), "deferring switch branch error");
                    make_error_expression(err)
                }
            })
            .collect();
        Self { exprs }
    }

    /// Selectors are evaluated in order and only until one matches.
    fn matches<N: XdmNode>(
        &self,
        operand: Option<&XdmAtomicValue>,
        ctx: &DynamicContext<N>,
    ) -> Result<bool, Error> {
        if self.is_default() {
            return Ok(true);
        }
        for selector in self.selectors() {
            let value = single_atomic(selector.evaluate(ctx)?)?;
            let hit = match (operand, value.as_ref()) {
                (None, None) => true,
                (Some(a), Some(b)) => a.deep_eq(b),
                _ => false,
            };
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Display for SwitchCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for selector in self.selectors() {
            write!(f, " case {selector}")?;
        }
        if self.is_default() {
            f.write_str(" default")?;
        }
        write!(f, " return {}", self.result())
    }
}
