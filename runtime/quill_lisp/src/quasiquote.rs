//! Quasiquote expansion into `list`, `cons` and `append` calls.
//!
//! `` `(a ,b ,@c) `` expands to `(append (list 'a) (list b) c)`, then
//! adjacent `list` calls are merged so the common case becomes a single
//! `list` or `cons` chain. Nested quasiquotes raise the level; an unquote only
//! takes effect at level 0.

use crate::obj::Obj;
use crate::sym::syms;

/// Expansion of the body of `` `x ``.
pub fn expand(x: &Obj) -> Obj {
    expand_at(x, 0)
}

fn expand_at(x: &Obj, level: usize) -> Obj {
    let s = syms();
    let Obj::Cell(cell) = x else {
        return quote(x);
    };
    if cell.car().as_sym() == Some(s.unquote) && level == 0 {
        return cell.cdr().car();
    }
    let parts = expand_list(x, level);
    if let Obj::Cell(parts_cell) = &parts {
        if parts_cell.cdr().is_nil() {
            let only = parts_cell.car();
            let head = only.car().as_sym();
            if head == Some(s.list) || head == Some(s.cons) {
                return only;
            }
        }
    }
    Obj::cons(Obj::Sym(s.append), parts)
}

/// Constants self-evaluate; symbols and lists need a quote.
fn quote(x: &Obj) -> Obj {
    match x {
        Obj::Sym(_) | Obj::Cell(_) => Obj::list([Obj::Sym(syms().quote), x.clone()]),
        other => other.clone(),
    }
}

/// Arguments to `append`, one per element of `x`. Always a non-empty list.
fn expand_list(x: &Obj, level: usize) -> Obj {
    let s = syms();
    let Obj::Cell(cell) = x else {
        return Obj::list([quote(x)]);
    };
    let mut level = level;
    match cell.car().as_sym() {
        Some(sym) if sym == s.unquote => {
            if level == 0 {
                // `(a . ,b)`
                return cell.cdr();
            }
            level -= 1;
        }
        Some(sym) if sym == s.quasiquote => level += 1,
        _ => {}
    }
    let head = expand_item(&cell.car(), level);
    let tail = expand_list(&cell.cdr(), level);
    let tail_first = tail.car();
    if tail_first.is_nil() && tail.cdr().is_nil() {
        return Obj::list([head]);
    }
    if head.car().as_sym() == Some(s.list) {
        if tail_first.car().as_sym() == Some(s.list) {
            // (list a) (list b ...) => (list a b ...)
            let merged = concat(&head, tail_first.cdr());
            return Obj::cons(merged, tail.cdr());
        }
        if let rest @ Obj::Cell(_) = head.cdr() {
            let consed = cons_chain(&rest, tail_first);
            return Obj::cons(consed, tail.cdr());
        }
    }
    Obj::cons(head, tail)
}

/// One element of a quasiquoted list, as an `append` argument.
fn expand_item(y: &Obj, level: usize) -> Obj {
    let s = syms();
    let mut level = level;
    if let Obj::Cell(cell) = y {
        match cell.car().as_sym() {
            Some(sym) if sym == s.unquote => {
                if level == 0 {
                    return Obj::cons(Obj::Sym(s.list), cell.cdr());
                }
                level -= 1;
            }
            Some(sym) if sym == s.unquote_splicing => {
                if level == 0 {
                    return cell.cdr().car();
                }
                level -= 1;
            }
            Some(sym) if sym == s.quasiquote => level += 1,
            _ => {}
        }
    }
    Obj::list([Obj::Sym(s.list), expand_at(y, level)])
}

fn concat(x: &Obj, y: Obj) -> Obj {
    match x {
        Obj::Cell(cell) => Obj::cons(cell.car(), concat(&cell.cdr(), y)),
        _ => y,
    }
}

/// `(a b)` and `y` to `(cons a (cons b y))`.
fn cons_chain(x: &Obj, y: Obj) -> Obj {
    match x {
        Obj::Cell(cell) => Obj::list([
            Obj::Sym(syms().cons),
            cell.car(),
            cons_chain(&cell.cdr(), y),
        ]),
        _ => y,
    }
}
