//! Alternate per-fragment languages.

use quill_ir::BlockFragment;
use quill_value::{EvalError, EvalResult};

use crate::scope::ScopeContext;

/// A language whose source is embedded in a raw block named after it, e.g.
/// `{{#lisp}} ... {{/lisp}}`.
///
/// Languages share the render's scope, output stream, quotas and method
/// registry with the template evaluator.
pub trait ScriptLanguage: Send + Sync {
    /// Block name, also registered as a raw block.
    fn name(&self) -> &str;

    /// Run a block body, streaming into the scope's output.
    fn render(
        &self,
        scope: &ScopeContext,
        block: &BlockFragment,
        source: &str,
    ) -> Result<(), EvalError>;

    /// Evaluate source to a value.
    fn evaluate(&self, scope: &ScopeContext, source: &str) -> EvalResult;
}
