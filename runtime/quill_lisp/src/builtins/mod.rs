//! Native functions installed in every interpreter's globals.
//!
//! Each table maps a name to an [`Arity`] and a body. Bodies receive their
//! arguments already evaluated, a trailing `&rest` parameter packed into a
//! list. A `Runtime` error from a body surfaces as a native fault naming the
//! builtin.

mod lists;
mod numbers;
mod render;
mod text;

use std::sync::Arc;

use quill_value::errors::runtime_error;
use quill_value::{EvalError, Number, Value};

use crate::interp::Globals;
use crate::obj::{Arity, Builtin, BuiltinFn, Obj};
use crate::sym::{syms, Sym};

type Def = (&'static str, Arity, BuiltinFn);

/// Builtins plus the constant globals.
pub(crate) fn globals() -> Globals {
    let mut globals = Globals::default();
    let tables: [&[Def]; 4] = [
        lists::BUILTINS,
        numbers::BUILTINS,
        text::BUILTINS,
        render::BUILTINS,
    ];
    for (name, arity, body) in tables.into_iter().flatten() {
        let builtin = Builtin {
            name: *name,
            arity: *arity,
            body: *body,
        };
        globals.insert(Sym::intern(name), Obj::Builtin(Arc::new(builtin)));
    }
    let s = syms();
    globals.insert(s.t, Obj::t());
    if let Some(list) = globals.get(&s.list).cloned() {
        globals.insert(s.bracket, list);
    }
    globals.insert(Sym::intern(text::GENSYM_COUNTER), Obj::int(1));
    globals.insert(
        Sym::intern("*version*"),
        Obj::list([Obj::str(env!("CARGO_PKG_VERSION")), Obj::str("quill-lisp")]),
    );
    globals
}

fn number(x: &Obj) -> Result<Number, EvalError> {
    x.as_value()
        .and_then(Number::from_value)
        .ok_or_else(|| runtime_error(format!("number expected: {x}")))
}

fn integer(x: &Obj) -> Result<i64, EvalError> {
    x.as_value()
        .and_then(Value::as_int)
        .ok_or_else(|| runtime_error(format!("integer expected: {x}")))
}

fn index(x: &Obj) -> Result<usize, EvalError> {
    let n = integer(x)?;
    usize::try_from(n).map_err(|_| runtime_error(format!("index out of range: {n}")))
}

/// Elements of a cons list, host collection or string.
fn items(x: &Obj) -> Result<Vec<Obj>, EvalError> {
    match x {
        Obj::Nil => Ok(Vec::new()),
        Obj::Cell(_) => x.to_vec(),
        Obj::Atom(Value::Str(s)) => Ok(s.chars().map(|c| Obj::str(&c.to_string())).collect()),
        Obj::Atom(value) => value
            .items()
            .map(|items| items.into_iter().map(Obj::from_value).collect())
            .ok_or_else(|| runtime_error(format!("sequence expected: {x}"))),
        other => Err(runtime_error(format!("sequence expected: {other}"))),
    }
}

/// `items` shaped like `seq`: host collections give host lists, everything
/// else a cons list.
fn shaped_like(seq: &Obj, items: Vec<Obj>) -> Obj {
    match seq {
        Obj::Atom(_) => Obj::Atom(Value::list(items.iter().map(Obj::to_value).collect())),
        _ => Obj::list(items),
    }
}

#[cfg(test)]
mod tests;
