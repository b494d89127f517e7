//! Calls.
//!
//! Resolution order: a function value bound in scope or args, then a host
//! object method or a function stored in a map (member calls only), then
//! registered methods by name and arity (plain filter, context filter,
//! context block). A member call `a.f(x)` resolves `f` with `a` prepended.

use quill_ir::{Expr, Literal, Name, PropertyKey};
use quill_value::errors::runtime_error;
use quill_value::{EvalError, EvalResult, Value};

use super::{evaluate, evaluate_args_into, resolve_deferred, ArgVec};
use crate::scope::ScopeContext;

/// Error-capture option key binding the error.
const ASSIGN_ERROR: &str = "assignError";
/// Error-capture option key binding the error and clearing the last error.
const CATCH_ERROR: &str = "catchError";

pub(super) fn evaluate_call(callee: &Expr, args: &[Expr], scope: &ScopeContext) -> EvalResult {
    match callee {
        Expr::Identifier(name) => {
            let argv = evaluate_call_args(args, scope)?;
            if let Some(Value::Function(func)) = scope.lookup_binding(*name) {
                return func.call(&argv);
            }
            scope.session().invoke_method(scope, *name, &argv)
        }
        Expr::Member {
            object,
            property,
            computed: false,
        } => match property.as_identifier() {
            Some(name) => call_member(object, name, args, scope),
            None => call_value(callee, args, scope),
        },
        other => call_value(other, args, scope),
    }
}

fn call_member(object: &Expr, name: Name, args: &[Expr], scope: &ScopeContext) -> EvalResult {
    let target = resolve_deferred(evaluate(object, scope)?)?;
    let argv = evaluate_call_args(args, scope)?;
    match &target {
        Value::Object(obj) => {
            if let Some(result) = obj.call_method(name.as_str(), &argv) {
                return result;
            }
        }
        Value::Map(map) => {
            if let Some(Value::Function(func)) = map.get(name.as_str()) {
                return func.call(&argv);
            }
        }
        _ => {}
    }
    let mut full = ArgVec::with_capacity(argv.len() + 1);
    full.push(target);
    full.extend(argv);
    scope.session().invoke_method(scope, name, &full)
}

fn call_value(callee: &Expr, args: &[Expr], scope: &ScopeContext) -> EvalResult {
    let callee = resolve_deferred(evaluate(callee, scope)?)?;
    let argv = evaluate_call_args(args, scope)?;
    match callee {
        Value::Function(func) => func.call(&argv),
        value => Err(runtime_error(format!(
            "{} is not callable",
            value.type_name()
        ))),
    }
}

/// Arguments without a trailing error-capture options object.
fn evaluate_call_args(args: &[Expr], scope: &ScopeContext) -> Result<ArgVec, EvalError> {
    let args = match args.split_last() {
        Some((last, init)) if capture_options(last).is_some() => init,
        _ => args,
    };
    let mut out = ArgVec::new();
    evaluate_args_into(args, scope, &mut out)?;
    Ok(out)
}

/// `(binding, clear)` when `expr` is an `{assignError: 'x'}` or
/// `{catchError: 'x'}` options object.
pub(crate) fn capture_options(expr: &Expr) -> Option<(Name, bool)> {
    let Expr::Object(props) = expr else {
        return None;
    };
    props.iter().find_map(|prop| {
        let PropertyKey::Named(key) = &prop.key else {
            return None;
        };
        let clear = match key.as_str() {
            ASSIGN_ERROR => false,
            CATCH_ERROR => true,
            _ => return None,
        };
        match &prop.value {
            Expr::Literal(Literal::Str(binding)) => Some((Name::intern(binding), clear)),
            _ => None,
        }
    })
}
