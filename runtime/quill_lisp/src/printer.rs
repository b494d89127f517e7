//! Printed representation of Lisp data.

use std::fmt::Write;

use quill_value::Value;
use rustc_hash::FxHashMap;

use crate::obj::{Cell, Obj};
use crate::sym::syms;

/// Visits of one cell before a circular list is cut short.
const MAX_CELL_VISITS: usize = 4;

/// Printed form of `x`. With `quote_strings`, strings print as readable
/// literals; otherwise raw, the way `princ` writes them.
pub fn to_string(x: &Obj, quote_strings: bool) -> String {
    let mut printer = Printer {
        out: String::new(),
        quote_strings,
        visits: FxHashMap::default(),
    };
    printer.print(x);
    printer.out
}

struct Printer {
    out: String,
    quote_strings: bool,
    visits: FxHashMap<usize, usize>,
}

impl Printer {
    fn print(&mut self, x: &Obj) {
        match x {
            Obj::Nil => self.out.push_str("nil"),
            Obj::Atom(value) => self.atom(value),
            Obj::Sym(sym) => {
                let _ = write!(self.out, "{sym}");
            }
            Obj::Cell(cell) => self.cell(cell),
            Obj::Arg(arg) => {
                let _ = write!(self.out, "#{}:{}:{}", arg.level, arg.offset, arg.sym);
            }
            Obj::Lambda(func) => {
                let _ = write!(self.out, "#<lambda:{}>", func.arity);
            }
            Obj::Closure(closure) => {
                let _ = write!(self.out, "#<closure:{}>", closure.func.arity);
            }
            Obj::Macro(func) => {
                let _ = write!(self.out, "#<macro:{}>", func.arity);
            }
            Obj::Builtin(builtin) => {
                let _ = write!(self.out, "#<{}:{}>", builtin.name, builtin.arity);
            }
            Obj::Host(host) => {
                let _ = write!(self.out, "#<host {host}>");
            }
        }
    }

    fn atom(&mut self, value: &Value) {
        match value {
            Value::Str(s) if self.quote_strings => self.string_literal(s),
            Value::Null => self.out.push_str("nil"),
            other => {
                let _ = write!(self.out, "{other}");
            }
        }
    }

    fn string_literal(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\0' => self.out.push_str("\\0"),
                other => self.out.push(other),
            }
        }
        self.out.push('"');
    }

    fn cell(&mut self, cell: &Cell) {
        let s = syms();
        let head = cell.car();
        if let (Some(sym), Obj::Cell(tail)) = (head.as_sym(), cell.cdr()) {
            if tail.cdr().is_nil() {
                let prefix = if sym == s.quote {
                    Some("'")
                } else if sym == s.quasiquote {
                    Some("`")
                } else if sym == s.unquote {
                    Some(",")
                } else if sym == s.unquote_splicing {
                    Some(",@")
                } else {
                    None
                };
                if let Some(prefix) = prefix {
                    self.out.push_str(prefix);
                    self.print(&tail.car());
                    return;
                }
            }
        }
        let (open, close, mut cursor) = if head.as_sym() == Some(s.bracket) {
            ('[', ']', cell.cdr())
        } else {
            ('(', ')', Obj::Cell(cell.clone()))
        };
        self.out.push(open);
        let mut first = true;
        loop {
            match cursor {
                Obj::Nil => break,
                Obj::Cell(c) => {
                    let visits = self.visits.entry(c.addr()).or_insert(0);
                    *visits += 1;
                    if *visits > MAX_CELL_VISITS {
                        self.out.push_str(" ...");
                        break;
                    }
                    if !first {
                        self.out.push(' ');
                    }
                    first = false;
                    self.print(&c.car());
                    cursor = c.cdr();
                }
                tail => {
                    self.out.push_str(" . ");
                    self.print(&tail);
                    break;
                }
            }
        }
        self.out.push(close);
    }
}
