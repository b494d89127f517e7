//! Lisp symbols.
//!
//! Interned symbols share the global [`Name`] interner, so `(eq 'a 'a)` is a
//! `u32` comparison. Uninterned symbols (`gensym`, `make-symbol`) carry a
//! unique tag and never compare equal to anything but themselves.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use quill_ir::Name;

static NEXT_TAG: AtomicU32 = AtomicU32::new(1);

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Sym {
    name: Name,
    /// 0 for interned symbols.
    tag: u32,
}

impl Sym {
    pub fn intern(name: &str) -> Sym {
        Sym {
            name: Name::intern(name),
            tag: 0,
        }
    }

    /// A fresh symbol no reader can produce.
    pub fn uninterned(name: &str) -> Sym {
        Sym {
            name: Name::intern(name),
            tag: NEXT_TAG.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn name(self) -> &'static str {
        self.name.as_str()
    }

    pub fn as_name(self) -> Name {
        self.name
    }

    pub fn is_interned(self) -> bool {
        self.tag == 0
    }

    /// Special-form keywords. They are never variables.
    pub fn is_keyword(self) -> bool {
        let s = syms();
        self.is_interned()
            && [
                s.cond,
                s.export,
                s.fn_,
                s.lambda,
                s.macro_,
                s.progn,
                s.quasiquote,
                s.quote,
                s.setq,
            ]
            .contains(&self)
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_interned() {
            f.write_str(self.name())
        } else {
            write!(f, "#:{}", self.name())
        }
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Symbols the reader, compiler and printer refer to by identity.
pub(crate) struct WellKnown {
    pub t: Sym,
    pub cond: Sym,
    pub export: Sym,
    pub fn_: Sym,
    pub lambda: Sym,
    pub macro_: Sym,
    pub progn: Sym,
    pub quasiquote: Sym,
    pub quote: Sym,
    pub setq: Sym,
    pub unquote: Sym,
    pub unquote_splicing: Sym,
    pub rest: Sym,
    pub append: Sym,
    pub cons: Sym,
    pub list: Sym,
    pub new_map: Sym,
    /// Head of `[a b]`. The tokenizer cannot spell it.
    pub bracket: Sym,
}

pub(crate) fn syms() -> &'static WellKnown {
    static SYMS: OnceLock<WellKnown> = OnceLock::new();
    SYMS.get_or_init(|| WellKnown {
        t: Sym::intern("t"),
        cond: Sym::intern("cond"),
        export: Sym::intern("export"),
        fn_: Sym::intern("fn"),
        lambda: Sym::intern("lambda"),
        macro_: Sym::intern("macro"),
        progn: Sym::intern("progn"),
        quasiquote: Sym::intern("quasiquote"),
        quote: Sym::intern("quote"),
        setq: Sym::intern("setq"),
        unquote: Sym::intern("unquote"),
        unquote_splicing: Sym::intern("unquote-splicing"),
        rest: Sym::intern("&rest"),
        append: Sym::intern("append"),
        cons: Sym::intern("cons"),
        list: Sym::intern("list"),
        new_map: Sym::intern("new-map"),
        bracket: Sym::intern("[]"),
    })
}
