//! Builtins that reach into the render: results, host types, shared source.

use quill_value::errors::runtime_error;
use quill_value::Value;

use super::Def;
use crate::interp::Interpreter;
use crate::obj::{Arity, HostRef, LispResult, Obj};

pub(super) const BUILTINS: &[Def] = &[
    ("return", Arity::fixed(1), return_value),
    ("new", Arity::rest(1), new),
    ("load", Arity::fixed(1), load),
];

/// `(return x)` makes `x` the render's result and halts it.
fn return_value(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    interp.set_return_value(a[0].clone());
    Ok(Obj::Nil)
}

/// `(new "Type" args...)` or `(new 'Type args...)`.
fn new(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    let type_name = match &a[0] {
        Obj::Atom(Value::Str(s)) => s.to_string(),
        Obj::Sym(sym) => sym.name().to_owned(),
        other => return Err(runtime_error(format!("type name expected: {other}"))),
    };
    let args = a[1].to_vec()?;
    interp.call_host(&HostRef::Constructor(type_name), args)
}

/// `(load "path")` evaluates a page as Lisp once and merges its globals.
fn load(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    match &a[0] {
        Obj::Atom(Value::Str(path)) => interp.load(path),
        other => Err(runtime_error(format!("path expected: {other}"))),
    }
}
