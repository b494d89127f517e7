//! Operator implementations for the evaluator.
//!
//! Direct enum-based dispatch; the value type set is fixed, so pattern
//! matching is preferred over trait objects. Short-circuit operators
//! (`&&`, `||`, `??`) never reach here: the evaluator handles them before
//! evaluating the right operand.

use std::cmp::Ordering;

use quill_ir::{BinaryOp, UnaryOp};
use quill_value::errors::{runtime_error, type_mismatch};
use quill_value::{EvalResult, Number, Value};

/// Evaluate a non-short-circuit binary operation.
pub fn evaluate_binary(left: &Value, right: &Value, op: BinaryOp) -> EvalResult {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(left, right, op)
        }
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::StrictEq => Ok(Value::Bool(strict_eq(left, right))),
        BinaryOp::StrictNotEq => Ok(Value::Bool(!strict_eq(left, right))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Ok(Value::Bool(compare(left, right).is_some_and(|ord| match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::LtEq => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => Err(runtime_error(format!(
            "'{}' must be evaluated lazily",
            op.symbol()
        ))),
    }
}

/// `+` adds numbers, concatenates strings and lists.
fn add(left: &Value, right: &Value) -> EvalResult {
    match (left, right) {
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            let mut s = left.to_string();
            s.push_str(&right.to_string());
            Ok(Value::string(s))
        }
        (Value::List(a), Value::List(b)) => {
            let mut items = a.snapshot();
            items.extend(b.snapshot());
            Ok(Value::list(items))
        }
        _ => match (Number::from_value(left), Number::from_value(right)) {
            (Some(a), Some(b)) => Ok(a.add(b).into_value()),
            _ => Err(type_mismatch("+", left.type_name(), right.type_name())),
        },
    }
}

fn arithmetic(left: &Value, right: &Value, op: BinaryOp) -> EvalResult {
    let (Some(a), Some(b)) = (Number::coerce(left), Number::coerce(right)) else {
        return Err(type_mismatch(op.symbol(), left.type_name(), right.type_name()));
    };
    let result = match op {
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a.div(b)?,
        BinaryOp::Mod => a.rem(b)?,
        _ => a.pow(b),
    };
    Ok(result.into_value())
}

/// `==`: numbers compare numerically, numeric strings compare to numbers.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(s), other) | (other, Value::Str(s))
            if matches!(other, Value::Int(_) | Value::Float(_)) =>
        {
            match (Number::parse(s), Number::from_value(other)) {
                (Some(a), Some(b)) => a.num_eq(b),
                _ => false,
            }
        }
        _ => left == right,
    }
}

/// `===`: same kind of value, then structural equality.
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    let numeric = |v: &Value| matches!(v, Value::Int(_) | Value::Float(_));
    if numeric(left) && numeric(right) {
        return left == right;
    }
    std::mem::discriminant(left) == std::mem::discriminant(right) && left == right
}

/// Ordering for relational operators; `None` when the values do not compare.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some((**a).cmp(&**b)),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => Number::coerce(left)?.compare(Number::coerce(right)?),
    }
}

/// Evaluate a unary operation.
pub fn evaluate_unary(value: &Value, op: UnaryOp) -> EvalResult {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => Number::coerce(value)
            .map(|n| n.neg().into_value())
            .ok_or_else(|| runtime_error(format!("cannot negate {}", value.type_name()))),
        UnaryOp::Plus => Number::coerce(value)
            .map(Number::into_value)
            .ok_or_else(|| runtime_error(format!("cannot convert {} to a number", value.type_name()))),
    }
}
