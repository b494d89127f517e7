//! Quill Lisp - an S-expression interpreter sharing the template runtime's
//! scope, output and host methods.
//!
//! # Architecture
//!
//! - [`read_all`]: logos-based reader producing [`Obj`] trees
//! - [`Interpreter`]: globals plus an optional render scope; compiles
//!   lambdas to lexical frame references and evaluates with a trampoline
//! - `builtins` and `prelude`: the native functions and the Lisp-level
//!   library, evaluated once into a shared base every interpreter copies
//! - [`LispLanguage`]: the `lisp` block registered on a
//!   [`quill_eval::ScriptContext`]
//!
//! Symbols the interpreter does not know fall through to the render scope:
//! template args, registered filters, and host members, functions and
//! constructors named by sigils (`:key`, `.member`, `Ns/fn`, `Type.`).
//!
//! ```text
//! {{#lisp}}
//! (defn sq [x] (* x x))
//! (sq 5)
//! {{/lisp}}
//! ```

mod builtins;
mod interp;
mod language;
mod obj;
mod prelude;
mod printer;
mod quasiquote;
mod reader;
mod sym;

pub use interp::{Globals, Interpreter, LoadCache};
pub use language::{LispContextExt, LispLanguage, LISP};
pub use obj::{Arg, Arity, Cell, Env, HostRef, LispDatum, LispResult, Obj};
pub use printer::to_string;
pub use reader::read_all;
pub use sym::Sym;

#[cfg(test)]
mod tests;
