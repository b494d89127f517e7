//! Arithmetic, comparison and math.

use std::cmp::Ordering;

use quill_value::errors::runtime_error;
use quill_value::{EvalError, Number, Value};

use super::{integer, number, Def};
use crate::interp::Interpreter;
use crate::obj::{Arity, LispResult, Obj};

pub(super) const BUILTINS: &[Def] = &[
    ("+", Arity::rest(0), add),
    ("*", Arity::rest(0), mul),
    ("-", Arity::rest(1), sub),
    ("/", Arity::rest(2), div),
    ("%", Arity::fixed(2), rem),
    ("mod", Arity::fixed(2), modulo),
    ("<", Arity::fixed(2), less),
    ("number?", Arity::fixed(1), is_number),
    ("zerop", Arity::fixed(1), zerop),
    ("abs", Arity::fixed(1), abs),
    ("sin", Arity::fixed(1), sin),
    ("cos", Arity::fixed(1), cos),
    ("tan", Arity::fixed(1), tan),
    ("exp", Arity::fixed(1), exp),
    ("sqrt", Arity::fixed(1), sqrt),
    ("isqrt", Arity::fixed(1), isqrt),
    ("expt", Arity::fixed(2), expt),
    ("truncate", Arity::rest(1), truncate),
    ("ceiling", Arity::rest(1), ceiling),
    ("floor", Arity::rest(1), floor),
    ("round", Arity::rest(1), round),
    ("logand", Arity::rest(0), logand),
    ("logior", Arity::rest(0), logior),
    ("logxor", Arity::rest(0), logxor),
    ("max", Arity::rest(1), max),
    ("min", Arity::rest(1), min),
];

fn num(n: Number) -> Obj {
    Obj::Atom(n.into_value())
}

fn numbers(list: &Obj) -> Result<Vec<Number>, EvalError> {
    list.to_vec()?.iter().map(number).collect()
}

fn add(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let total = numbers(&a[0])?.into_iter().fold(Number::Int(0), Number::add);
    Ok(num(total))
}

fn mul(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let product = numbers(&a[0])?.into_iter().fold(Number::Int(1), Number::mul);
    Ok(num(product))
}

/// `(- x)` negates; `(- x y ...)` subtracts left to right.
fn sub(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let first = number(&a[0])?;
    let rest = numbers(&a[1])?;
    if rest.is_empty() {
        return Ok(num(first.neg()));
    }
    Ok(num(rest.into_iter().fold(first, Number::sub)))
}

fn div(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let mut acc = number(&a[0])?.div(number(&a[1])?)?;
    for n in numbers(&a[2])? {
        acc = acc.div(n)?;
    }
    Ok(num(acc))
}

fn rem(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(num(number(&a[0])?.rem(number(&a[1])?)?))
}

/// Modulo taking the sign of the divisor.
fn modulo(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let divisor = number(&a[1])?;
    let r = number(&a[0])?.rem(divisor)?;
    let negative = |n: Number| n.compare(Number::Int(0)) == Some(Ordering::Less);
    if !r.is_zero() && negative(r) != negative(divisor) {
        return Ok(num(r.add(divisor)));
    }
    Ok(num(r))
}

fn less(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let ordering = match (&a[0], &a[1]) {
        (Obj::Atom(Value::Str(x)), Obj::Atom(Value::Str(y))) => Some((**x).cmp(&**y)),
        (x, y) => number(x)?.compare(number(y)?),
    };
    Ok(Obj::bool(ordering == Some(Ordering::Less)))
}

fn is_number(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(matches!(
        a[0],
        Obj::Atom(Value::Int(_) | Value::Float(_))
    )))
}

fn zerop(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(number(&a[0])?.is_zero()))
}

fn abs(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(match number(&a[0])? {
        Number::Int(n) => match n.checked_abs() {
            Some(n) => Obj::int(n),
            None => float(-(n as f64)),
        },
        Number::Float(x) => float(x.abs()),
    })
}

fn float(x: f64) -> Obj {
    Obj::Atom(Value::Float(x))
}

fn unary_float(a: &[Obj], f: fn(f64) -> f64) -> LispResult {
    Ok(float(f(number(&a[0])?.as_f64())))
}

fn sin(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    unary_float(a, f64::sin)
}

fn cos(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    unary_float(a, f64::cos)
}

fn tan(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    unary_float(a, f64::tan)
}

fn exp(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    unary_float(a, f64::exp)
}

fn sqrt(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    unary_float(a, f64::sqrt)
}

fn isqrt(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let x = number(&a[0])?.as_f64();
    if x < 0.0 {
        return Err(runtime_error(format!("negative argument: {x}")));
    }
    Ok(Obj::int(x.sqrt() as i64))
}

fn expt(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(num(number(&a[0])?.pow(number(&a[1])?)))
}

/// Round `x`, or `x / divisor`, with `f`. Integral results stay integers.
fn rounding(a: &[Obj], f: fn(f64) -> f64) -> LispResult {
    let x = number(&a[0])?.as_f64();
    let divisors = numbers(&a[1])?;
    let quotient = match divisors.as_slice() {
        [] => x,
        [divisor] if divisor.is_zero() => return Err(runtime_error("division by zero")),
        [divisor] => x / divisor.as_f64(),
        _ => return Err(runtime_error("one or two arguments expected")),
    };
    let rounded = f(quotient);
    if rounded.is_finite() && rounded.abs() < i64::MAX as f64 {
        Ok(Obj::int(rounded as i64))
    } else {
        Ok(float(rounded))
    }
}

fn truncate(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    rounding(a, f64::trunc)
}

fn ceiling(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    rounding(a, f64::ceil)
}

fn floor(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    rounding(a, f64::floor)
}

fn round(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    rounding(a, f64::round_ties_even)
}

fn bitwise(a: &[Obj], identity: i64, f: fn(i64, i64) -> i64) -> LispResult {
    let mut acc = identity;
    for item in a[0].to_vec()? {
        acc = f(acc, integer(&item)?);
    }
    Ok(Obj::int(acc))
}

fn logand(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    bitwise(a, -1, |x, y| x & y)
}

fn logior(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    bitwise(a, 0, |x, y| x | y)
}

fn logxor(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    bitwise(a, 0, |x, y| x ^ y)
}

fn extreme(a: &[Obj], keep: Ordering) -> LispResult {
    let mut best = number(&a[0])?;
    for n in numbers(&a[1])? {
        if n.compare(best) == Some(keep) {
            best = n;
        }
    }
    Ok(num(best))
}

fn max(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    extreme(a, Ordering::Greater)
}

fn min(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    extreme(a, Ordering::Less)
}
