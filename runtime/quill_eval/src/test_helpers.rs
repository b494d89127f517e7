//! Test helpers for rendering snippets against a throwaway context.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use quill_value::{EvalError, Value};

use crate::{Page, RenderSession, ScopeContext, ScriptContext};

/// Default context with no page source.
pub fn context() -> ScriptContext {
    ScriptContext::builder().build()
}

/// Render `source` against the default context.
pub fn render(source: &str) -> String {
    try_render(source).unwrap_or_else(|err| panic!("render of {source:?} failed: {err}"))
}

pub fn try_render(source: &str) -> Result<String, EvalError> {
    context().render_source(source, Vec::new())
}

/// Session over an empty inline page.
pub fn session(context: &ScriptContext) -> RenderSession {
    let page = Arc::new(Page::from_fragments("(test)", Vec::new()));
    let session = RenderSession::builder(context.clone(), page)
        .no_layout()
        .build();
    session.init().unwrap();
    session
}

/// Root scope of a fresh session against `context`.
pub fn scope(context: &ScriptContext) -> ScopeContext {
    session(context).root_scope()
}

/// Evaluate one expression in `scope`.
pub fn eval_in(scope: &ScopeContext, source: &str) -> Result<Value, EvalError> {
    let expr = quill_parse::parse_expression(source)?;
    crate::evaluate(&expr, scope)
}

pub fn eval(source: &str) -> Value {
    eval_in(&scope(&context()), source)
        .unwrap_or_else(|err| panic!("evaluation of {source:?} failed: {err}"))
}
