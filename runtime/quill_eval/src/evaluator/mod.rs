//! Expression evaluation.
//!
//! `evaluate(expr, scope)` is pure apart from assignments, declarations and
//! whatever registered methods do. Every node counts against the session's
//! evaluation quota before it runs.

mod assign;
mod call;
mod member;

use quill_ir::{BinaryOp, DeclKind, Expr, Literal, Property, PropertyKey};
use quill_value::errors::runtime_error;
use quill_value::{ensure_sufficient_stack, EvalError, EvalResult, Value};
use smallvec::SmallVec;

use crate::operators::{evaluate_binary, evaluate_unary};
use crate::scope::{Mutability, ScopeContext};

pub use assign::CompiledSetter;
pub(crate) use call::capture_options;
pub use member::{get_index, get_member};

/// Evaluated call arguments.
pub type ArgVec = SmallVec<[Value; 4]>;

/// Evaluate one expression in `scope`.
pub fn evaluate(expr: &Expr, scope: &ScopeContext) -> EvalResult {
    scope.session().assert_next_evaluation()?;
    ensure_sufficient_stack(|| eval_expr(expr, scope))
}

fn eval_expr(expr: &Expr, scope: &ScopeContext) -> EvalResult {
    match expr {
        Expr::Identifier(name) => scope.resolve(*name),
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Array(items) => {
            let mut values = ArgVec::new();
            evaluate_args_into(items, scope, &mut values)?;
            Ok(Value::list(values.into_vec()))
        }
        Expr::Object(props) => evaluate_object(props, scope),
        Expr::Spread(_) => Err(runtime_error(
            "spread is only valid in call arguments and array literals",
        )),
        Expr::Unary { op, arg } => {
            let value = resolve_deferred(evaluate(arg, scope)?)?;
            evaluate_unary(&value, *op)
        }
        Expr::Binary { op, left, right } => evaluate_binary_expr(*op, left, right, scope),
        Expr::Conditional {
            test,
            then,
            otherwise,
        } => {
            if resolve_deferred(evaluate(test, scope)?)?.is_truthy() {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Assignment { target, op, value } => {
            assign::evaluate_assignment(expr, target, *op, value, scope)
        }
        Expr::Member {
            object,
            property,
            computed,
        } => member::evaluate_member(expr, object, property, *computed, scope),
        Expr::Call { callee, args } => call::evaluate_call(callee, args, scope),
        Expr::VariableDeclaration { kind, bindings } => {
            let mutability = match kind {
                DeclKind::Const => Mutability::Immutable,
                DeclKind::Let | DeclKind::Var => Mutability::Mutable,
            };
            for binding in bindings {
                let value = match &binding.init {
                    Some(init) => evaluate(init, scope)?,
                    None => Value::Null,
                };
                scope.define_with(binding.name, value, mutability);
            }
            Ok(Value::Null)
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::string(&**s),
    }
}

fn evaluate_binary_expr(op: BinaryOp, left: &Expr, right: &Expr, scope: &ScopeContext) -> EvalResult {
    let lhs = resolve_deferred(evaluate(left, scope)?)?;
    match op {
        BinaryOp::And if !lhs.is_truthy() => Ok(lhs),
        BinaryOp::Or if lhs.is_truthy() => Ok(lhs),
        BinaryOp::Coalesce if !lhs.is_null() => Ok(lhs),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => {
            resolve_deferred(evaluate(right, scope)?)
        }
        _ => {
            let rhs = resolve_deferred(evaluate(right, scope)?)?;
            evaluate_binary(&lhs, &rhs, op)
        }
    }
}

fn evaluate_object(props: &[Property], scope: &ScopeContext) -> EvalResult {
    let mut entries = std::collections::BTreeMap::new();
    for prop in props {
        let key = match &prop.key {
            PropertyKey::Named(name) => name.as_str().to_owned(),
            PropertyKey::Computed(expr) => evaluate(expr, scope)?.to_key(),
        };
        entries.insert(key, evaluate(&prop.value, scope)?);
    }
    Ok(Value::map(entries))
}

/// Evaluate arguments left to right into `out`, flattening spreads in place.
pub fn evaluate_args_into(
    exprs: &[Expr],
    scope: &ScopeContext,
    out: &mut ArgVec,
) -> Result<(), EvalError> {
    for expr in exprs {
        if let Expr::Spread(inner) = expr {
            let value = resolve_deferred(evaluate(inner, scope)?)?;
            match value.items() {
                Some(items) => out.extend(items),
                None if value.is_null() => {}
                None => out.push(value),
            }
        } else {
            out.push(evaluate(expr, scope)?);
        }
    }
    Ok(())
}

/// Resolve deferred values to what they produce.
pub fn resolve_deferred(mut value: Value) -> EvalResult {
    while let Value::Deferred(deferred) = value {
        value = deferred.resolve()?;
    }
    Ok(value)
}
