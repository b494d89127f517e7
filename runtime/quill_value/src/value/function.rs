//! Native callables.

use std::fmt;
use std::sync::Arc;

use crate::errors::{wrong_arg_count, EvalResult};
use crate::Value;

type NullaryFn = dyn Fn() -> EvalResult + Send + Sync;
type UnaryFn = dyn Fn(&Value) -> EvalResult + Send + Sync;
type BinaryFn = dyn Fn(&Value, &Value) -> EvalResult + Send + Sync;
type VariadicFn = dyn Fn(&[Value]) -> EvalResult + Send + Sync;

/// Every shape of native function, resolved once when it is registered and
/// matched by pattern at each call.
#[derive(Clone)]
pub enum NativeFn {
    Nullary(Arc<NullaryFn>),
    Unary(Arc<UnaryFn>),
    Binary(Arc<BinaryFn>),
    Variadic(Arc<VariadicFn>),
    /// Builds a new host value from its arguments.
    Constructor(Arc<VariadicFn>),
}

impl NativeFn {
    pub fn nullary(f: impl Fn() -> EvalResult + Send + Sync + 'static) -> Self {
        NativeFn::Nullary(Arc::new(f))
    }

    pub fn unary(f: impl Fn(&Value) -> EvalResult + Send + Sync + 'static) -> Self {
        NativeFn::Unary(Arc::new(f))
    }

    pub fn binary(f: impl Fn(&Value, &Value) -> EvalResult + Send + Sync + 'static) -> Self {
        NativeFn::Binary(Arc::new(f))
    }

    pub fn variadic(f: impl Fn(&[Value]) -> EvalResult + Send + Sync + 'static) -> Self {
        NativeFn::Variadic(Arc::new(f))
    }

    pub fn constructor(f: impl Fn(&[Value]) -> EvalResult + Send + Sync + 'static) -> Self {
        NativeFn::Constructor(Arc::new(f))
    }

    /// Fixed arity, or `None` for variadic shapes.
    pub fn arity(&self) -> Option<usize> {
        match self {
            NativeFn::Nullary(_) => Some(0),
            NativeFn::Unary(_) => Some(1),
            NativeFn::Binary(_) => Some(2),
            NativeFn::Variadic(_) | NativeFn::Constructor(_) => None,
        }
    }

    pub fn invoke(&self, name: &str, args: &[Value]) -> EvalResult {
        match (self, args) {
            (NativeFn::Nullary(f), []) => f(),
            (NativeFn::Unary(f), [a]) => f(a),
            (NativeFn::Binary(f), [a, b]) => f(a, b),
            (NativeFn::Variadic(f) | NativeFn::Constructor(f), args) => f(args),
            (other, args) => Err(wrong_arg_count(
                name,
                other.arity().unwrap_or_default(),
                args.len(),
            )),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NativeFn::Nullary(_) => "NativeFn::Nullary",
            NativeFn::Unary(_) => "NativeFn::Unary",
            NativeFn::Binary(_) => "NativeFn::Binary",
            NativeFn::Variadic(_) => "NativeFn::Variadic",
            NativeFn::Constructor(_) => "NativeFn::Constructor",
        })
    }
}

/// A named native function bound into script scope as a value.
#[derive(Clone, Debug)]
pub struct FunctionValue {
    pub name: Arc<str>,
    pub func: NativeFn,
}

impl FunctionValue {
    pub fn new(name: &str, func: NativeFn) -> Self {
        FunctionValue {
            name: Arc::from(name),
            func,
        }
    }

    pub fn call(&self, args: &[Value]) -> EvalResult {
        self.func.invoke(&self.name, args)
    }

    pub fn ptr_eq(&self, other: &FunctionValue) -> bool {
        let same = match (&self.func, &other.func) {
            (NativeFn::Nullary(a), NativeFn::Nullary(b)) => Arc::ptr_eq(a, b),
            (NativeFn::Unary(a), NativeFn::Unary(b)) => Arc::ptr_eq(a, b),
            (NativeFn::Binary(a), NativeFn::Binary(b)) => Arc::ptr_eq(a, b),
            (NativeFn::Variadic(a), NativeFn::Variadic(b))
            | (NativeFn::Constructor(a), NativeFn::Constructor(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same && self.name == other.name
    }
}
