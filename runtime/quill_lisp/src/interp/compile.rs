//! Compiling `(lambda ...)` and `(macro ...)` forms.
//!
//! Parameters become [`Arg`] frame references, macros in the body are
//! expanded once up front, and inner lambdas are compiled to
//! [`Obj::Lambda`] templates that capture their environment when evaluated.

use std::sync::Arc;

use quill_value::errors::lisp_error_with;
use quill_value::EvalError;
use rustc_hash::FxHashMap;

use super::Interpreter;
use crate::obj::{Arg, Arity, Closure, Env, Func, LispResult, Obj};
use crate::quasiquote;
use crate::sym::{syms, Sym};

/// Nesting limit for macro expansion at compile time.
const MAX_MACRO_EXPANSIONS: usize = 20;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FuncKind {
    Lambda,
    Closure,
    Macro,
}

type ArgTable = FxHashMap<Sym, Arg>;

impl Interpreter {
    /// Compile `(params . body)`.
    pub(crate) fn compile(&mut self, form: &Obj, env: &Env, kind: FuncKind) -> LispResult {
        let Obj::Cell(cell) = form else {
            return Err(lisp_error_with("arglist and body expected", form));
        };
        let (table, arity) = arg_table(&cell.car())?;
        let body = scan_for_args(&cell.cdr(), &table);
        let body = self.expand_macros(&body, MAX_MACRO_EXPANSIONS)?;
        let body = self.compile_inners(&body)?;
        let func = Arc::new(Func { arity, body });
        Ok(match kind {
            FuncKind::Lambda => Obj::Lambda(func),
            FuncKind::Closure => Obj::Closure(Arc::new(Closure {
                func,
                env: env.clone(),
            })),
            FuncKind::Macro => Obj::Macro(func),
        })
    }

    /// Expand macro calls and quasiquotes in `x`, up to `count` nestings.
    pub(crate) fn expand_macros(&mut self, x: &Obj, count: usize) -> LispResult {
        let Obj::Cell(cell) = x else {
            return Ok(x.clone());
        };
        if count == 0 {
            return Ok(x.clone());
        }
        let s = syms();
        let head = cell.car();
        match head.as_sym() {
            Some(sym) if sym == s.quote || sym == s.lambda || sym == s.fn_ || sym == s.macro_ => {
                return Ok(x.clone());
            }
            Some(sym) if sym == s.quasiquote => {
                let body = single_operand(x, "bad quasiquote")?;
                let expanded = quasiquote::expand(&body);
                return self.expand_macros(&expanded, count);
            }
            Some(sym) => {
                if let Some(Obj::Macro(func)) = self.globals.get(&sym).cloned() {
                    let expanded = self.expand_macro(&func, &cell.cdr())?;
                    return self.expand_macros(&expanded, count - 1);
                }
            }
            None => {}
        }
        try_map_list(x, |item| self.expand_macros(item, count))
    }

    /// Replace inner lambda forms with compiled templates.
    fn compile_inners(&mut self, x: &Obj) -> LispResult {
        let Obj::Cell(cell) = x else {
            return Ok(x.clone());
        };
        let s = syms();
        match cell.car().as_sym() {
            Some(sym) if sym == s.quote => Ok(x.clone()),
            Some(sym) if sym == s.lambda || sym == s.fn_ => {
                self.compile(&cell.cdr(), &Env::default(), FuncKind::Lambda)
            }
            Some(sym) if sym == s.macro_ => Err(lisp_error_with("nested macro", x)),
            _ => try_map_list(x, |item| self.compile_inners(item)),
        }
    }
}

/// The single operand of `(op x)`.
pub(crate) fn single_operand(form: &Obj, message: &str) -> LispResult {
    let args = form.cdr();
    match &args {
        Obj::Cell(cell) if cell.cdr().is_nil() => Ok(cell.car()),
        _ => Err(lisp_error_with(message, form)),
    }
}

/// Parameter positions and arity of a parameter list. `[a b]` is accepted
/// as well as `(a b)`.
fn arg_table(params: &Obj) -> Result<(ArgTable, Arity), EvalError> {
    let s = syms();
    let params = match params {
        Obj::Cell(cell) if cell.car().as_sym() == Some(s.bracket) => cell.cdr(),
        Obj::Nil | Obj::Cell(_) => params.clone(),
        other => return Err(lisp_error_with("arglist expected", other)),
    };
    let mut table = ArgTable::default();
    let mut rest = false;
    let mut items = params.to_vec()?.into_iter();
    while let Some(item) = items.next() {
        if rest {
            return Err(lisp_error_with("2nd rest", &item));
        }
        let item = if item.as_sym() == Some(s.rest) {
            rest = true;
            match items.next() {
                Some(param) if param.as_sym() != Some(s.rest) => param,
                Some(param) => return Err(lisp_error_with("not a variable", &param)),
                None => return Err(lisp_error_with("not a variable", &params)),
            }
        } else {
            item
        };
        let sym = match &item {
            Obj::Sym(sym) if !sym.is_keyword() => *sym,
            Obj::Arg(arg) => arg.sym,
            other => return Err(lisp_error_with("not a variable", other)),
        };
        if sym == s.t {
            return Err(lisp_error_with("not assignable", sym));
        }
        if table.contains_key(&sym) {
            return Err(lisp_error_with("duplicated argument name", sym));
        }
        let offset = table.len();
        table.insert(sym, Arg { level: 0, offset, sym });
    }
    let fixed = table.len() - usize::from(rest);
    Ok((table, Arity { fixed, rest }))
}

/// Replace parameters with their [`Arg`]s and move free `Arg`s one frame
/// further out.
fn scan_for_args(x: &Obj, table: &ArgTable) -> Obj {
    let s = syms();
    match x {
        Obj::Sym(sym) => table.get(sym).map_or_else(|| x.clone(), |arg| Obj::Arg(*arg)),
        Obj::Arg(arg) => Obj::Arg(table.get(&arg.sym).copied().unwrap_or(Arg {
            level: arg.level + 1,
            ..*arg
        })),
        Obj::Cell(cell) => match cell.car().as_sym() {
            Some(sym) if sym == s.quote => x.clone(),
            Some(sym) if sym == s.quasiquote => {
                Obj::cons(cell.car(), scan_for_quasiquote(&cell.cdr(), table, 0))
            }
            _ => map_list(x, |item| scan_for_args(item, table)),
        },
        other => other.clone(),
    }
}

/// Scan only the unquoted parts of a quasiquote body.
fn scan_for_quasiquote(x: &Obj, table: &ArgTable, level: usize) -> Obj {
    let s = syms();
    let Obj::Cell(cell) = x else {
        return x.clone();
    };
    let head = cell.car();
    match head.as_sym() {
        Some(sym) if sym == s.quasiquote => {
            Obj::cons(head, scan_for_quasiquote(&cell.cdr(), table, level + 1))
        }
        Some(sym) if sym == s.unquote || sym == s.unquote_splicing => {
            let operand = cell.cdr();
            let scanned = match level.checked_sub(1) {
                None => scan_for_args(&operand, table),
                Some(outer) => scan_for_quasiquote(&operand, table, outer),
            };
            if scanned.is_identical(&operand) {
                x.clone()
            } else {
                Obj::cons(head, scanned)
            }
        }
        _ => map_list(x, |item| scan_for_quasiquote(item, table, level)),
    }
}

/// Map `f` over the elements of a list, keeping any dotted tail as is.
fn map_list(x: &Obj, mut f: impl FnMut(&Obj) -> Obj) -> Obj {
    match try_map_list(x, |item| Ok(f(item))) {
        Ok(mapped) => mapped,
        Err(_) => x.clone(),
    }
}

fn try_map_list(x: &Obj, mut f: impl FnMut(&Obj) -> LispResult) -> LispResult {
    let mut items = Vec::new();
    let mut cursor = x.clone();
    while let Obj::Cell(cell) = cursor {
        items.push(f(&cell.car())?);
        cursor = cell.cdr();
    }
    Ok(items
        .into_iter()
        .rev()
        .fold(cursor, |tail, item| Obj::cons(item, tail)))
}
