//! Strings, printing and symbols.

use quill_value::errors::{lisp_error, runtime_error};
use quill_value::{EvalError, Value};

use super::Def;
use crate::interp::Interpreter;
use crate::obj::{Arity, LispResult, Obj};
use crate::printer::to_string;
use crate::sym::Sym;

pub(super) const GENSYM_COUNTER: &str = "*gensym-counter*";

pub(super) const BUILTINS: &[Def] = &[
    ("str", Arity::rest(0), str),
    ("string", Arity::fixed(1), string),
    ("string-downcase", Arity::fixed(1), downcase),
    ("string-upcase", Arity::fixed(1), upcase),
    ("string?", Arity::fixed(1), is_string),
    ("print", Arity::rest(0), print),
    ("println", Arity::rest(0), println),
    ("prin1", Arity::fixed(1), prin1),
    ("princ", Arity::fixed(1), princ),
    ("terpri", Arity::fixed(0), terpri),
    ("gensym", Arity::fixed(0), gensym),
    ("make-symbol", Arity::fixed(1), make_symbol),
    ("intern", Arity::fixed(1), intern),
    ("symbol-name", Arity::fixed(1), symbol_name),
    ("error", Arity::fixed(1), error),
    ("debug", Arity::fixed(0), debug),
];

fn text(x: &Obj) -> Result<&str, EvalError> {
    match x {
        Obj::Atom(Value::Str(s)) => Ok(s),
        other => Err(runtime_error(format!("string expected: {other}"))),
    }
}

/// Concatenation of the unquoted printed forms.
fn str(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let out: String = a[0].to_vec()?.iter().map(|x| to_string(x, false)).collect();
    Ok(Obj::str(&out))
}

fn string(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    if a[0].is_nil() {
        return Ok(Obj::str(""));
    }
    Ok(Obj::str(&to_string(&a[0], false)))
}

fn downcase(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    if a[0].is_nil() {
        return Ok(Obj::str(""));
    }
    Ok(Obj::str(&text(&a[0])?.to_lowercase()))
}

fn upcase(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    if a[0].is_nil() {
        return Ok(Obj::str(""));
    }
    Ok(Obj::str(&text(&a[0])?.to_uppercase()))
}

fn is_string(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(matches!(a[0], Obj::Atom(Value::Str(_)))))
}

/// Write each argument unquoted; the last argument.
fn print(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    let args = a[0].to_vec()?;
    for x in &args {
        interp.write(&to_string(x, false));
    }
    Ok(args.last().cloned().unwrap_or(Obj::Nil))
}

fn println(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    let last = print(interp, a)?;
    interp.write("\n");
    Ok(last)
}

fn prin1(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    interp.write(&to_string(&a[0], true));
    Ok(a[0].clone())
}

fn princ(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    interp.write(&to_string(&a[0], false));
    Ok(a[0].clone())
}

fn terpri(interp: &mut Interpreter, _: &[Obj]) -> LispResult {
    interp.write("\n");
    Ok(Obj::t())
}

/// Fresh uninterned `G<n>`.
fn gensym(interp: &mut Interpreter, _: &[Obj]) -> LispResult {
    let n = interp
        .global(GENSYM_COUNTER)
        .and_then(|counter| counter.as_value().and_then(Value::as_int))
        .unwrap_or(1);
    interp.define(GENSYM_COUNTER, Obj::int(n + 1));
    Ok(Obj::Sym(Sym::uninterned(&format!("G{n}"))))
}

fn make_symbol(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::Sym(Sym::uninterned(text(&a[0])?)))
}

fn intern(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::Sym(Sym::intern(text(&a[0])?)))
}

fn symbol_name(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    match &a[0] {
        Obj::Sym(sym) => Ok(Obj::str(sym.name())),
        other => Err(runtime_error(format!("symbol expected: {other}"))),
    }
}

/// `(error message)` raises a Lisp error.
fn error(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Err(lisp_error(to_string(&a[0], false)))
}

/// Names of every global, sorted.
fn debug(interp: &mut Interpreter, _: &[Obj]) -> LispResult {
    let mut names: Vec<Sym> = interp.globals().keys().copied().collect();
    names.sort_by_key(|sym| sym.name());
    Ok(Obj::list(names.into_iter().map(Obj::Sym).collect::<Vec<_>>()))
}
