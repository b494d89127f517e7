//! Quill Value - runtime data model shared by the template evaluator and the
//! Lisp interpreter.
//!
//! # Architecture
//!
//! - [`Value`]: dynamically typed value; heap data goes through factory methods
//! - [`HostObject`]: duck-typed member/indexer access for embedder types
//! - [`NativeFn`]: one tagged union for every native callable shape
//! - [`Number`]: integer/float promotion used by every arithmetic operator
//! - [`EvalError`]: the error taxonomy both languages report through
//! - [`ensure_sufficient_stack`]: stack growth around deep recursion

pub mod errors;
mod number;
mod stack;
mod value;

pub use errors::{EvalError, EvalErrorKind, EvalResult, Quota};
pub use number::Number;
pub use stack::ensure_sufficient_stack;
pub use value::{
    Deferred, FunctionValue, Heap, HostObject, ListRef, MapRef, NativeFn, Signal, Value,
};
