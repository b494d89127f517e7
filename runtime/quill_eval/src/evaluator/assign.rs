//! Assignment.
//!
//! Member targets compile a setter the first time a `(target type,
//! expression text)` pair is assigned; the setter is cached on the context
//! and reused by every later render.

use std::sync::Arc;

use quill_ir::{AssignOp, Expr};
use quill_value::errors::{binding_failure, runtime_error};
use quill_value::{EvalError, EvalResult, Value};

use super::member::{binding_error, get_index, get_member, property_name};
use super::{evaluate, resolve_deferred};
use crate::operators::evaluate_binary;
use crate::scope::ScopeContext;

/// `(target, key, value)` setter for one target type.
pub type CompiledSetter = Arc<dyn Fn(&Value, &Value, Value) -> Result<(), EvalError> + Send + Sync>;

pub(super) fn evaluate_assignment(
    expr: &Expr,
    target: &Expr,
    op: AssignOp,
    value: &Expr,
    scope: &ScopeContext,
) -> EvalResult {
    match target {
        Expr::Identifier(name) => {
            let value = compute(op, || scope.resolve(*name), value, scope)?;
            scope.assign(*name, value.clone())?;
            Ok(value)
        }
        Expr::Member {
            object,
            property,
            computed,
        } => {
            let object = resolve_deferred(evaluate(object, scope)?)?;
            if object.is_null() {
                return Err(binding_failure(expr, "cannot assign to a member of null"));
            }
            let key = if *computed {
                evaluate(property, scope)?
            } else {
                Value::string(property_name(property))
            };
            let value = compute(
                op,
                || match &key {
                    Value::Str(name) if !*computed => get_member(&object, name),
                    _ => get_index(&object, &key),
                },
                value,
                scope,
            )?;
            let text = target.to_string();
            let setter = scope
                .context()
                .setter(object.type_name(), &text, || compile_setter(&object));
            setter(&object, &key, value.clone()).map_err(|err| binding_error(expr, err))?;
            Ok(value)
        }
        _ => Err(binding_failure(expr, "invalid assignment target")),
    }
}

fn compute(
    op: AssignOp,
    current: impl FnOnce() -> EvalResult,
    value: &Expr,
    scope: &ScopeContext,
) -> EvalResult {
    let rhs = resolve_deferred(evaluate(value, scope)?)?;
    match op.binary() {
        None => Ok(rhs),
        Some(binary) => evaluate_binary(&current()?, &rhs, binary),
    }
}

fn compile_setter(target: &Value) -> CompiledSetter {
    match target {
        Value::Map(_) => Arc::new(|target, key, value| match target {
            Value::Map(map) => {
                map.insert(key.to_key(), value);
                Ok(())
            }
            other => Err(not_settable(other)),
        }),
        Value::List(_) => Arc::new(|target, key, value| match target {
            Value::List(list) => {
                let index = key
                    .as_int()
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| runtime_error(format!("invalid list index {key}")))?;
                let mut items = list.write();
                if index < items.len() {
                    items[index] = value;
                } else if index == items.len() {
                    items.push(value);
                } else {
                    return Err(runtime_error(format!(
                        "index {index} out of range for list of length {}",
                        items.len()
                    )));
                }
                Ok(())
            }
            other => Err(not_settable(other)),
        }),
        Value::Object(_) => Arc::new(|target, key, value| match (target, key) {
            (Value::Object(obj), Value::Str(name)) => obj.set_member(name, value),
            (Value::Object(obj), key) => obj.set_index(key, value),
            (other, _) => Err(not_settable(other)),
        }),
        _ => Arc::new(|target, _, _| Err(not_settable(target))),
    }
}

fn not_settable(target: &Value) -> EvalError {
    runtime_error(format!("cannot assign members of {}", target.type_name()))
}
