//! Runtime values.
//!
//! Heap data is only reachable through factory methods (`Value::string`,
//! `Value::list`, `Value::object`, ...), so every payload is shared and cheap
//! to clone. Lists and maps are the mutable exception: they are reference
//! types, as assignments through member expressions must be observable from
//! every alias.

mod collections;
mod deferred;
mod function;
mod heap;
mod object;

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::Arc;

pub use collections::{ListRef, MapRef};
pub use deferred::Deferred;
pub use function::{FunctionValue, NativeFn};
pub use heap::Heap;
pub use object::HostObject;

use crate::errors::EvalError;
use crate::Number;

/// Nesting beyond which rendering prints `...` instead of recursing.
const MAX_DISPLAY_DEPTH: usize = 32;

/// Pipeline sentinels produced by filters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Skip the remaining filters and write nothing.
    Ignore,
    /// Stop the remaining filters; the fragment writes nothing.
    Stop,
}

/// Dynamically typed runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Heap<str>),
    List(ListRef),
    Map(MapRef),
    /// Key/value pair, the element type of an enumerated map.
    Pair(Heap<(Value, Value)>),
    Function(FunctionValue),
    Object(Heap<dyn HostObject>),
    /// Captured error, as bound by error-capture targets.
    Error(Heap<EvalError>),
    Deferred(Deferred),
    Signal(Signal),
}

impl Value {
    #[inline]
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Heap::from_arc(Arc::from(s.as_ref())))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(ListRef::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(MapRef::new(entries))
    }

    pub fn map_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn pair(key: Value, value: Value) -> Self {
        Value::Pair(Heap::new((key, value)))
    }

    pub fn object(obj: impl HostObject + 'static) -> Self {
        Value::Object(Heap::from_arc(Arc::new(obj) as Arc<dyn HostObject>))
    }

    pub fn error(err: EvalError) -> Self {
        Value::Error(Heap::new(err))
    }

    pub fn function(name: &str, func: NativeFn) -> Self {
        Value::Function(FunctionValue::new(name, func))
    }

    pub fn deferred(f: impl FnOnce() -> crate::EvalResult + Send + 'static) -> Self {
        Value::Deferred(Deferred::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Signal(_) => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0 && !x.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Pair(_) => "pair",
            Value::Function(_) => "function",
            Value::Object(obj) => obj.type_name(),
            Value::Error(_) => "error",
            Value::Deferred(_) => "deferred",
            Value::Signal(_) => "signal",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view; integral floats convert.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        Number::from_value(self).map(Number::as_f64)
    }

    pub fn as_number(&self) -> Option<Number> {
        Number::from_value(self)
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Items when the value is enumerable. Maps enumerate as key/value pairs.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(list) => Some(list.snapshot()),
            Value::Map(map) => Some(
                map.read()
                    .iter()
                    .map(|(k, v)| Value::pair(Value::string(k), v.clone()))
                    .collect(),
            ),
            Value::Object(obj) => obj.items(),
            _ => None,
        }
    }

    /// Text used for map keys and string concatenation.
    pub fn to_key(&self) -> String {
        self.to_string()
    }

    fn write_json(&self, out: &mut String, depth: usize) -> fmt::Result {
        if depth > MAX_DISPLAY_DEPTH {
            return out.write_str("...");
        }
        match self {
            Value::Str(s) => write_quoted(out, s),
            Value::Null => out.write_str("null"),
            other => other.write_display(out, depth),
        }
    }

    fn write_display(&self, out: &mut String, depth: usize) -> fmt::Result {
        if depth > MAX_DISPLAY_DEPTH {
            return out.write_str("...");
        }
        match self {
            Value::Null | Value::Signal(_) | Value::Deferred(_) => Ok(()),
            Value::Bool(b) => write!(out, "{b}"),
            Value::Int(n) => write!(out, "{n}"),
            Value::Float(x) => write!(out, "{x}"),
            Value::Str(s) => out.write_str(s),
            Value::List(list) => {
                out.write_char('[')?;
                // Snapshot so a list containing itself does not re-lock.
                for (i, item) in list.snapshot().iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    item.write_json(out, depth + 1)?;
                }
                out.write_char(']')
            }
            Value::Map(map) => {
                out.write_char('{')?;
                for (i, (k, v)) in map.snapshot().iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    write_quoted(out, k)?;
                    out.write_char(':')?;
                    v.write_json(out, depth + 1)?;
                }
                out.write_char('}')
            }
            Value::Pair(pair) => {
                out.write_str("{\"key\":")?;
                pair.0.write_json(out, depth + 1)?;
                out.write_str(",\"value\":")?;
                pair.1.write_json(out, depth + 1)?;
                out.write_char('}')
            }
            Value::Function(func) => write!(out, "<fn {}>", func.name),
            Value::Object(obj) => out.write_str(&obj.display()),
            Value::Error(err) => out.write_str(&err.message()),
        }
    }
}

fn write_quoted(out: &mut String, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// Rendered text of a value: what `{{ value }}` writes.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_display(&mut out, 0)?;
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({:?})", &**s),
            Value::List(list) => write!(f, "List({list:?})"),
            Value::Map(map) => write!(f, "Map({map:?})"),
            Value::Pair(pair) => write!(f, "Pair({:?}, {:?})", pair.0, pair.1),
            Value::Function(func) => write!(f, "Function({})", func.name),
            Value::Object(obj) => write!(f, "Object({obj:?})"),
            Value::Error(err) => write!(f, "Error({:?})", err.message()),
            Value::Deferred(d) => write!(f, "{d:?}"),
            Value::Signal(s) => write!(f, "Signal({s:?})"),
        }
    }
}

/// Structural equality; integers and floats compare numerically, functions
/// and host objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                match (Number::from_value(self), Number::from_value(other)) {
                    (Some(a), Some(b)) => a.num_eq(b),
                    _ => false,
                }
            }
            (Value::Str(a), Value::Str(b)) => **a == **b,
            (Value::List(a), Value::List(b)) => {
                ListRef::ptr_eq(a, b) || a.snapshot() == b.snapshot()
            }
            (Value::Map(a), Value::Map(b)) => MapRef::ptr_eq(a, b) || a.snapshot() == b.snapshot(),
            (Value::Pair(a), Value::Pair(b)) => a.0 == b.0 && a.1 == b.1,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Heap::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => **a == **b,
            (Value::Deferred(a), Value::Deferred(b)) => Deferred::ptr_eq(a, b),
            (Value::Signal(a), Value::Signal(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
