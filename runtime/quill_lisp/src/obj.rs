//! Lisp data: cons cells, compiled functions, lexical environments and the
//! bridge to host [`Value`]s.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use quill_ir::Name;
use quill_value::errors::{lisp_error, lisp_error_with};
use quill_value::{EvalError, HostObject, Value};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::interp::Interpreter;
use crate::printer;
use crate::sym::{syms, Sym};

pub type LispResult = Result<Obj, EvalError>;

/// Argument slots of one call frame.
pub type Slots = SmallVec<[Obj; 4]>;

#[derive(Clone)]
pub enum Obj {
    Nil,
    /// Host data: numbers, strings, booleans, host lists and maps, objects.
    Atom(Value),
    Sym(Sym),
    Cell(Cell),
    /// Compiled reference to a lambda parameter.
    Arg(Arg),
    /// Compiled inner lambda, closed over the environment when evaluated.
    Lambda(Arc<Func>),
    Closure(Arc<Closure>),
    Macro(Arc<Func>),
    Builtin(Arc<Builtin>),
    /// Callable resolved through the render scope at call time.
    Host(HostRef),
}

impl Obj {
    pub fn cons(car: Obj, cdr: Obj) -> Obj {
        Obj::Cell(Cell::new(car, cdr))
    }

    /// Proper list of `items`.
    pub fn list<I>(items: I) -> Obj
    where
        I: IntoIterator<Item = Obj>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Obj::Nil, |tail, item| Obj::cons(item, tail))
    }

    pub fn str(s: &str) -> Obj {
        Obj::Atom(Value::string(s))
    }

    pub fn int(n: i64) -> Obj {
        Obj::Atom(Value::Int(n))
    }

    pub fn t() -> Obj {
        Obj::Sym(syms().t)
    }

    pub fn bool(b: bool) -> Obj {
        if b {
            Obj::t()
        } else {
            Obj::Nil
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Obj::Nil)
    }

    /// Only `nil` and a host `false` are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Obj::Nil | Obj::Atom(Value::Bool(false)))
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Obj::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<Sym> {
        match self {
            Obj::Sym(sym) => Some(*sym),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Obj::Atom(value) => Some(value),
            _ => None,
        }
    }

    /// `(car x)`; `nil` for anything but a cell.
    pub fn car(&self) -> Obj {
        self.as_cell().map_or(Obj::Nil, Cell::car)
    }

    /// `(cdr x)`; `nil` for anything but a cell.
    pub fn cdr(&self) -> Obj {
        self.as_cell().map_or(Obj::Nil, Cell::cdr)
    }

    /// Elements of a proper list. Circular lists are an error.
    pub fn to_vec(&self) -> Result<Vec<Obj>, EvalError> {
        let mut items = Vec::new();
        let mut cursor = self.clone();
        // Advances every other step; meets `cursor` only on a cycle.
        let mut slow = self.clone();
        loop {
            match cursor {
                Obj::Nil => return Ok(items),
                Obj::Cell(cell) => {
                    items.push(cell.car());
                    cursor = cell.cdr();
                    if items.len() % 2 == 0 {
                        slow = slow.cdr();
                    }
                    if let (Obj::Cell(a), Obj::Cell(b)) = (&cursor, &slow) {
                        if Cell::ptr_eq(a, b) {
                            return Err(lisp_error("circular list"));
                        }
                    }
                }
                other => return Err(lisp_error_with("proper list expected", other)),
            }
        }
    }

    /// Identity: the same cell, symbol or function, or equal scalars.
    pub fn is_identical(&self, other: &Obj) -> bool {
        match (self, other) {
            (Obj::Nil, Obj::Nil) => true,
            (Obj::Sym(a), Obj::Sym(b)) => a == b,
            (Obj::Cell(a), Obj::Cell(b)) => Cell::ptr_eq(a, b),
            (Obj::Arg(a), Obj::Arg(b)) => a == b,
            (Obj::Lambda(a), Obj::Lambda(b)) | (Obj::Macro(a), Obj::Macro(b)) => Arc::ptr_eq(a, b),
            (Obj::Closure(a), Obj::Closure(b)) => Arc::ptr_eq(a, b),
            (Obj::Builtin(a), Obj::Builtin(b)) => Arc::ptr_eq(a, b),
            (Obj::Host(a), Obj::Host(b)) => a == b,
            (Obj::Atom(a), Obj::Atom(b)) => match (a, b) {
                (Value::Str(x), Value::Str(y)) => quill_value::Heap::ptr_eq(x, y),
                (Value::List(x), Value::List(y)) => quill_value::ListRef::ptr_eq(x, y),
                (Value::Map(x), Value::Map(y)) => quill_value::MapRef::ptr_eq(x, y),
                (Value::Object(x), Value::Object(y)) => quill_value::Heap::ptr_eq(x, y),
                _ => a == b,
            },
            _ => false,
        }
    }

    /// `eql`: identity, except strings and numbers compare by value.
    pub fn is_eql(&self, other: &Obj) -> bool {
        match (self, other) {
            (Obj::Atom(a @ (Value::Str(_) | Value::Int(_) | Value::Float(_))), Obj::Atom(b)) => a == b,
            _ => self.is_identical(other),
        }
    }

    /// Wrap a host value. `null` reads as `nil`; wrapped Lisp data unwraps.
    pub fn from_value(value: Value) -> Obj {
        match value {
            Value::Null => Obj::Nil,
            Value::Object(obj) => match obj.as_any().downcast_ref::<LispDatum>() {
                Some(datum) => datum.0.clone(),
                None => Obj::Atom(Value::Object(obj)),
            },
            other => Obj::Atom(other),
        }
    }

    /// Host view: proper lists become host lists, `t` becomes `true`, other
    /// Lisp data travels as an opaque object.
    pub fn to_value(&self) -> Value {
        let mut seen = FxHashSet::default();
        self.to_value_guarded(&mut seen)
    }

    fn to_value_guarded(&self, seen: &mut FxHashSet<usize>) -> Value {
        match self {
            Obj::Nil => Value::Null,
            Obj::Atom(value) => value.clone(),
            Obj::Sym(sym) if *sym == syms().t => Value::Bool(true),
            Obj::Cell(cell) => {
                if !seen.insert(cell.addr()) {
                    return Value::object(LispDatum(self.clone()));
                }
                let converted = match self.to_vec() {
                    Ok(items) => Value::list(
                        items
                            .iter()
                            .map(|item| item.to_value_guarded(seen))
                            .collect(),
                    ),
                    Err(_) => Value::object(LispDatum(self.clone())),
                };
                seen.remove(&cell.addr());
                converted
            }
            other => Value::object(LispDatum(other.clone())),
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printer::to_string(self, true))
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printer::to_string(self, true))
    }
}

impl From<Value> for Obj {
    fn from(value: Value) -> Self {
        Obj::from_value(value)
    }
}

/// Mutable cons cell. Clones share the pair.
#[derive(Clone)]
pub struct Cell(Arc<RwLock<(Obj, Obj)>>);

impl Cell {
    pub fn new(car: Obj, cdr: Obj) -> Self {
        Cell(Arc::new(RwLock::new((car, cdr))))
    }

    pub fn car(&self) -> Obj {
        self.0.read().0.clone()
    }

    pub fn cdr(&self) -> Obj {
        self.0.read().1.clone()
    }

    pub fn set_car(&self, car: Obj) {
        self.0.write().0 = car;
    }

    pub fn set_cdr(&self, cdr: Obj) {
        self.0.write().1 = cdr;
    }

    pub fn ptr_eq(a: &Cell, b: &Cell) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Stable address for visited sets.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Lambda parameter compiled to a frame position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Arg {
    /// Frames to walk outwards.
    pub level: usize,
    pub offset: usize,
    pub sym: Sym,
}

/// Chain of call frames, innermost first. The empty chain is the global
/// environment.
#[derive(Clone, Default)]
pub struct Env(Option<Arc<Frame>>);

pub struct Frame {
    slots: RwLock<Slots>,
    next: Env,
}

impl Env {
    pub fn is_global(&self) -> bool {
        self.0.is_none()
    }

    #[must_use]
    pub fn push(&self, slots: Slots) -> Env {
        Env(Some(Arc::new(Frame {
            slots: RwLock::new(slots),
            next: self.clone(),
        })))
    }

    fn frame(&self, arg: Arg) -> Result<&Frame, EvalError> {
        let mut env = self;
        for _ in 0..arg.level {
            env = match &env.0 {
                Some(frame) => &frame.next,
                None => break,
            };
        }
        env.0
            .as_deref()
            .ok_or_else(|| lisp_error_with("unbound argument", arg.sym))
    }

    pub fn get(&self, arg: Arg) -> LispResult {
        self.frame(arg)?
            .slots
            .read()
            .get(arg.offset)
            .cloned()
            .ok_or_else(|| lisp_error_with("unbound argument", arg.sym))
    }

    pub fn set(&self, arg: Arg, value: Obj) -> Result<(), EvalError> {
        let frame = self.frame(arg)?;
        let mut slots = frame.slots.write();
        match slots.get_mut(arg.offset) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(lisp_error_with("unbound argument", arg.sym)),
        }
    }
}

/// Parameter count. A trailing `&rest` parameter collects the remaining
/// arguments into a list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Arity {
    pub fixed: usize,
    pub rest: bool,
}

impl Arity {
    pub const fn fixed(n: usize) -> Arity {
        Arity { fixed: n, rest: false }
    }

    pub const fn rest(n: usize) -> Arity {
        Arity { fixed: n, rest: true }
    }

    pub fn slots(self) -> usize {
        self.fixed + usize::from(self.rest)
    }

    pub fn accepts(self, count: usize) -> bool {
        if self.rest {
            count >= self.fixed
        } else {
            count == self.fixed
        }
    }

    /// Pack already evaluated arguments into frame slots.
    pub fn pack(self, mut args: Vec<Obj>, callee: &dyn fmt::Display) -> Result<Slots, EvalError> {
        if !self.accepts(args.len()) {
            return Err(lisp_error_with("arity not matched", callee));
        }
        let rest = args.split_off(self.fixed);
        let mut slots: Slots = args.into_iter().collect();
        if self.rest {
            slots.push(Obj::list(rest));
        }
        Ok(slots)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            write!(f, "{}+", self.fixed)
        } else {
            write!(f, "{}", self.fixed)
        }
    }
}

/// Compiled body shared by lambdas and macros.
pub struct Func {
    pub arity: Arity,
    /// Body forms as a list.
    pub body: Obj,
}

pub struct Closure {
    pub func: Arc<Func>,
    pub env: Env,
}

pub type BuiltinFn = fn(&mut Interpreter, &[Obj]) -> LispResult;

pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub body: BuiltinFn,
}

/// Host callable named by a symbol's sigil.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostRef {
    /// `name` or `/name`: a registered filter.
    Method(Name),
    /// `:key`: index or member read on the first argument.
    Getter(String),
    /// `.name`: method call on the first argument.
    Member(String),
    /// `Ns/fn`: namespaced host function.
    Function(String),
    /// `Type.`: host constructor.
    Constructor(String),
}

impl HostRef {
    /// Classify a symbol by its sigil.
    pub fn classify(name: &str) -> Option<HostRef> {
        if name.len() < 2 {
            return name
                .chars()
                .next()
                .filter(|c| is_identifier_start(*c))
                .map(|_| HostRef::Method(Name::intern(name)));
        }
        if let Some(key) = name.strip_prefix(':') {
            return Some(HostRef::Getter(key.to_owned()));
        }
        if let Some(member) = name.strip_prefix('.') {
            return Some(HostRef::Member(member.to_owned()));
        }
        if let Some(method) = name.strip_prefix('/') {
            return Some(HostRef::Method(Name::intern(method)));
        }
        if let Some(type_name) = name.strip_suffix('.') {
            return Some(HostRef::Constructor(type_name.to_owned()));
        }
        if name.contains('/') {
            return Some(HostRef::Function(name.to_owned()));
        }
        name.chars()
            .next()
            .filter(|c| is_identifier_start(*c))
            .map(|_| HostRef::Method(Name::intern(name)))
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostRef::Method(name) => write!(f, "/{name}"),
            HostRef::Getter(key) => write!(f, ":{key}"),
            HostRef::Member(name) => write!(f, ".{name}"),
            HostRef::Function(path) => f.write_str(path),
            HostRef::Constructor(type_name) => write!(f, "{type_name}."),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

/// Lisp data carried through host values; unwraps on the way back in.
#[derive(Debug)]
pub struct LispDatum(pub Obj);

impl HostObject for LispDatum {
    fn type_name(&self) -> &str {
        match &self.0 {
            Obj::Sym(_) => "symbol",
            Obj::Cell(_) => "cons",
            Obj::Closure(_) | Obj::Builtin(_) | Obj::Host(_) | Obj::Lambda(_) => "lisp-function",
            Obj::Macro(_) => "lisp-macro",
            _ => "lisp",
        }
    }

    fn items(&self) -> Option<Vec<Value>> {
        self.0
            .to_vec()
            .ok()
            .filter(|_| self.0.as_cell().is_some())
            .map(|items| items.iter().map(Obj::to_value).collect())
    }

    fn display(&self) -> String {
        printer::to_string(&self.0, false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests;
