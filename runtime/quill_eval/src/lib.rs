//! Quill Eval - template expression evaluator and render orchestrator.
//!
//! # Architecture
//!
//! - [`ScriptContext`]: shared configuration (method registry, blocks,
//!   languages, global args, page source, limits, caches), built once
//! - [`RenderSession`]: per-render state (args, quotas, flags, last error)
//! - [`ScopeContext`]: cheap scope handle threaded through every evaluation
//! - [`evaluate`]: expression evaluation with identifier and call resolution
//! - [`MethodRegistry`]: ordered providers resolved by name, arity and kind
//!
//! Rendering is synchronous: a session walks page fragments, evaluates
//! variable fragments through their filter chains and streams into an
//! in-memory buffer that is written to the caller's sink once complete.
//! Sessions are single-threaded; contexts are `Send + Sync`.

mod blocks;
mod cancel;
mod config;
mod context;
mod evaluator;
mod filters;
mod host;
mod language;
mod operators;
mod output;
mod page;
mod registry;
mod scope;
mod session;
mod shared;

pub use blocks::ScriptBlock;
pub use cancel::CancellationToken;
pub use config::RenderLimits;
pub use context::{ScriptContext, ScriptContextBuilder, DEFAULT_LAYOUT};
pub use evaluator::{
    evaluate, evaluate_args_into, get_index, get_member, resolve_deferred, ArgVec, CompiledSetter,
};
pub use host::HostTypes;
pub use language::ScriptLanguage;
pub use operators::{compare, evaluate_binary, evaluate_unary, loose_eq, strict_eq};
pub use output::{OutputStream, StreamTransformer};
pub use page::{normalize_path, MemoryPages, Page, PageSource};
pub use registry::{
    ContextBlockFn, ContextFilterFn, MethodBody, MethodDef, MethodKind, MethodRegistry,
    ResolvedMethod, ScriptMethods,
};
pub use scope::{AssignError, LocalScope, Mutability, Scope, ScopeContext};
pub use session::{CallTrace, PageGuard, RenderFlags, RenderSession, SessionBuilder};
pub use shared::SharedRegistry;

pub use quill_value::{EvalError, EvalErrorKind, EvalResult, Value};

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests;
