//! Cons cells, sequences and maps.

use std::collections::BTreeMap;

use quill_value::errors::runtime_error;
use quill_value::{Number, Value};

use super::{index, items, number, shaped_like, Def};
use crate::interp::Interpreter;
use crate::obj::{Arity, Cell, LispResult, Obj};

pub(super) const BUILTINS: &[Def] = &[
    ("car", Arity::fixed(1), car),
    ("cdr", Arity::fixed(1), cdr),
    ("cons", Arity::fixed(2), cons),
    ("atom", Arity::fixed(1), atom),
    ("eq", Arity::fixed(2), eq),
    ("eql", Arity::fixed(2), eql),
    ("not", Arity::fixed(1), not),
    ("consp", Arity::fixed(1), consp),
    ("endp", Arity::fixed(1), endp),
    ("seq?", Arity::fixed(1), is_seq),
    ("list", Arity::rest(0), list),
    ("rplaca", Arity::fixed(2), rplaca),
    ("rplacd", Arity::fixed(2), rplacd),
    ("length", Arity::fixed(1), length),
    ("count", Arity::fixed(1), length),
    ("nth", Arity::fixed(2), nth),
    ("skip", Arity::fixed(2), skip),
    ("take", Arity::fixed(2), take),
    ("map", Arity::fixed(2), map),
    ("sum", Arity::fixed(1), sum),
    ("remove", Arity::fixed(2), remove),
    ("subseq", Arity::rest(2), subseq),
    ("to-cons", Arity::fixed(1), to_cons),
    ("to-list", Arity::fixed(1), to_list),
    ("to-array", Arity::fixed(1), to_list),
    ("new-map", Arity::rest(0), new_map),
    ("apply", Arity::fixed(2), apply),
];

fn car(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(a[0].car())
}

fn cdr(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(a[0].cdr())
}

fn cons(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::cons(a[0].clone(), a[1].clone()))
}

fn atom(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(a[0].as_cell().is_none()))
}

fn eq(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(a[0].is_identical(&a[1])))
}

fn eql(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(a[0].is_eql(&a[1])))
}

fn not(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(!a[0].is_truthy()))
}

fn consp(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::bool(a[0].as_cell().is_some()))
}

fn endp(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    match &a[0] {
        Obj::Nil => Ok(Obj::t()),
        Obj::Cell(_) => Ok(Obj::Nil),
        other => Err(runtime_error(format!("list expected: {other}"))),
    }
}

fn is_seq(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let seq = match &a[0] {
        Obj::Cell(_) => true,
        Obj::Atom(Value::Str(_) | Value::List(_) | Value::Map(_)) => true,
        Obj::Atom(Value::Object(obj)) => obj.items().is_some(),
        _ => false,
    };
    Ok(Obj::bool(seq))
}

fn list(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(a[0].clone())
}

fn cell_arg(x: &Obj) -> Result<&Cell, quill_value::EvalError> {
    x.as_cell()
        .ok_or_else(|| runtime_error(format!("cons expected: {x}")))
}

fn rplaca(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    cell_arg(&a[0])?.set_car(a[1].clone());
    Ok(a[1].clone())
}

fn rplacd(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    cell_arg(&a[0])?.set_cdr(a[1].clone());
    Ok(a[1].clone())
}

fn length(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let len = match &a[0] {
        Obj::Atom(Value::Str(s)) => s.chars().count(),
        other => items(other)?.len(),
    };
    Ok(Obj::int(len as i64))
}

/// `(nth seq i)`; `nil` past the end.
fn nth(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    if a[0].is_nil() {
        return Ok(Obj::Nil);
    }
    let i = index(&a[1])?;
    Ok(items(&a[0])?.into_iter().nth(i).unwrap_or(Obj::Nil))
}

/// `(skip n seq)`
fn skip(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let n = index(&a[0])?;
    let rest = items(&a[1])?.into_iter().skip(n).collect();
    Ok(shaped_like(&a[1], rest))
}

/// `(take n seq)`
fn take(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let n = index(&a[0])?;
    let head = items(&a[1])?.into_iter().take(n).collect();
    Ok(shaped_like(&a[1], head))
}

/// `(map f seq)`
fn map(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    if a[1].is_nil() {
        return Ok(Obj::Nil);
    }
    let mut mapped = Vec::new();
    for item in items(&a[1])? {
        mapped.push(interp.apply(&a[0], vec![item])?);
    }
    Ok(shaped_like(&a[1], mapped))
}

fn sum(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let mut acc = Number::Int(0);
    for item in items(&a[0])? {
        acc = acc.add(number(&item)?);
    }
    Ok(Obj::Atom(acc.into_value()))
}

/// `(remove needle seq)`: every occurrence of `needle`, or of a substring
/// when both are strings.
fn remove(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    if let (Obj::Atom(Value::Str(needle)), Obj::Atom(Value::Str(haystack))) = (&a[0], &a[1]) {
        return Ok(Obj::str(&haystack.replace(&**needle, "")));
    }
    let kept = items(&a[1])?
        .into_iter()
        .filter(|item| !item.is_eql(&a[0]))
        .collect();
    Ok(shaped_like(&a[1], kept))
}

/// `(subseq seq start [end])`
fn subseq(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let bounds = a[2].to_vec()?;
    let start = index(&a[1])?;
    let end = bounds.first().map(index).transpose()?;
    if let Obj::Atom(Value::Str(s)) = &a[0] {
        let chars: Vec<char> = s.chars().collect();
        let end = end.unwrap_or(chars.len());
        let slice = chars
            .get(start..end)
            .ok_or_else(|| runtime_error(format!("bad range {start}..{end} of {}", chars.len())))?;
        return Ok(Obj::str(&slice.iter().collect::<String>()));
    }
    let all = items(&a[0])?;
    let end = end.unwrap_or(all.len());
    let slice = all
        .get(start..end)
        .ok_or_else(|| runtime_error(format!("bad range {start}..{end} of {}", all.len())))?;
    Ok(shaped_like(&a[0], slice.to_vec()))
}

fn to_cons(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    Ok(Obj::list(items(&a[0])?))
}

fn to_list(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let values = items(&a[0])?.iter().map(Obj::to_value).collect();
    Ok(Obj::Atom(Value::list(values)))
}

/// `(new-map (list key value) ...)`; keys are strings or symbols, a leading
/// `:` dropped.
fn new_map(_: &mut Interpreter, a: &[Obj]) -> LispResult {
    let mut entries = BTreeMap::new();
    for entry in a[0].to_vec()? {
        let key = match entry.car() {
            Obj::Atom(Value::Str(s)) => s.to_string(),
            Obj::Sym(sym) => sym.name().trim_start_matches(':').to_owned(),
            other => return Err(runtime_error(format!("map key expected: {other}"))),
        };
        entries.insert(key, entry.cdr().car().to_value());
    }
    Ok(Obj::Atom(Value::map(entries)))
}

/// `(apply f args)`
fn apply(interp: &mut Interpreter, a: &[Obj]) -> LispResult {
    let args = items(&a[1])?;
    interp.apply(&a[0], args)
}
