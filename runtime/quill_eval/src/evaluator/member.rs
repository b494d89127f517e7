//! Member and index access.
//!
//! A null target or a missing key yields `null`. Any other failure becomes a
//! binding error carrying the source text of the failing expression.

use quill_ir::Expr;
use quill_value::errors::binding_failure;
use quill_value::{EvalError, EvalErrorKind, EvalResult, Value};

use super::{evaluate, resolve_deferred};
use crate::scope::ScopeContext;

pub(super) fn evaluate_member(
    expr: &Expr,
    object: &Expr,
    property: &Expr,
    computed: bool,
    scope: &ScopeContext,
) -> EvalResult {
    let target = resolve_deferred(evaluate(object, scope)?)?;
    let result = if computed {
        let key = resolve_deferred(evaluate(property, scope)?)?;
        get_index(&target, &key)
    } else {
        get_member(&target, &property_name(property))
    };
    result.map_err(|err| binding_error(expr, err))
}

/// Name of a non-computed property.
pub(super) fn property_name(property: &Expr) -> String {
    match property {
        Expr::Identifier(name) => name.as_str().to_owned(),
        other => other.to_string(),
    }
}

pub(super) fn binding_error(expr: &Expr, err: EvalError) -> EvalError {
    if err.is_fatal() || matches!(err.kind, EvalErrorKind::Binding { .. }) {
        return err;
    }
    binding_failure(expr, err.message())
}

/// `target.name`
pub fn get_member(target: &Value, name: &str) -> EvalResult {
    let value = match target {
        Value::Map(map) => map.get(name),
        Value::List(list) => match name {
            "length" | "count" => Some(Value::from(list.len())),
            _ => None,
        },
        Value::Str(s) => match name {
            "length" => Some(Value::from(s.chars().count())),
            _ => None,
        },
        Value::Pair(pair) => match name {
            "key" | "Key" => Some(pair.0.clone()),
            "value" | "Value" => Some(pair.1.clone()),
            _ => None,
        },
        Value::Error(err) => match name {
            "message" => Some(Value::string(err.message())),
            "kind" => Some(Value::string(err.kind.label())),
            "stackTrace" => Some(Value::string(err.stack_trace())),
            _ => None,
        },
        Value::Function(func) => match name {
            "name" => Some(Value::string(&*func.name)),
            _ => None,
        },
        Value::Object(obj) => match obj.get_member(name)? {
            Some(value) => Some(value),
            None => obj.get_index(&Value::string(name))?,
        },
        _ => None,
    };
    Ok(value.unwrap_or(Value::Null))
}

/// `target[key]`
pub fn get_index(target: &Value, key: &Value) -> EvalResult {
    let value = match target {
        Value::List(list) => key
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| list.get(i)),
        Value::Map(map) => map.get(&key.to_key()),
        Value::Str(s) => key
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::string(c.to_string())),
        Value::Pair(pair) => match key {
            Value::Int(0) => Some(pair.0.clone()),
            Value::Int(1) => Some(pair.1.clone()),
            Value::Str(name) => return get_member(target, name),
            _ => None,
        },
        Value::Object(obj) => match obj.get_index(key)? {
            Some(value) => Some(value),
            None => match key {
                Value::Str(name) => obj.get_member(name)?,
                // Enumerable objects without an indexer: linear scan.
                _ => match (key.as_int().and_then(|i| usize::try_from(i).ok()), obj.items()) {
                    (Some(i), Some(items)) => items.into_iter().nth(i),
                    _ => None,
                },
            },
        },
        Value::Error(_) | Value::Function(_) => match key {
            Value::Str(name) => return get_member(target, name),
            _ => None,
        },
        _ => None,
    };
    Ok(value.unwrap_or(Value::Null))
}
