//! Fragment rendering and the filter pipeline.

use std::sync::Arc;

use quill_ir::{BlockBody, BlockFragment, Expr, FilterCall, Name, PageFragment, VariableFragment};
use quill_value::{EvalError, EvalErrorKind, EvalResult, Signal, Value};
use smallvec::SmallVec;

use super::{RenderFlags, RenderSession};
use crate::evaluator::{self, capture_options, resolve_deferred, ArgVec};
use crate::output::OutputStream;
use crate::page::Page;
use crate::registry::{ContextBlockFn, MethodBody};
use crate::scope::ScopeContext;

impl RenderSession {
    /// Render the page, wrapped in its layout when one was resolved.
    pub(super) fn write_root(&self, scope: &ScopeContext) -> Result<(), EvalError> {
        match self.layout() {
            Some(layout) => {
                self.set_flag(RenderFlags::IN_LAYOUT, true);
                let result = self.write_page(scope, &layout);
                self.set_flag(RenderFlags::IN_LAYOUT, false);
                result
            }
            None => {
                let page = Arc::clone(self.page());
                self.write_page(scope, &page)
            }
        }
    }

    /// Render a page in `scope`, counting it against the stack depth.
    pub fn write_page(&self, scope: &ScopeContext, page: &Page) -> Result<(), EvalError> {
        let _frame = self.enter_page(&page.path)?;
        self.check_cancelled()?;
        self.write_fragments(scope, &page.fragments)
            .map_err(|err| err.with_frame(|| format!("page '{}'", page.path)))
    }

    /// Render a partial by name with extra bindings in a forked scope.
    pub fn write_partial(
        &self,
        scope: &ScopeContext,
        name: &str,
        bindings: Vec<(Name, Value)>,
    ) -> Result<(), EvalError> {
        let page = self.find_partial(name)?.ok_or_else(|| {
            quill_value::errors::runtime_error(format!("partial '{name}' not found"))
        })?;
        let mut all: Vec<(Name, Value)> = page
            .args
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        all.extend(bindings);
        let child = scope.fork_with(all);
        self.write_page(&child, &page)
    }

    pub fn write_fragments(
        &self,
        scope: &ScopeContext,
        fragments: &[PageFragment],
    ) -> Result<(), EvalError> {
        for fragment in fragments {
            if self.is_halted() {
                break;
            }
            self.check_cancelled()?;
            self.write_fragment(scope, fragment)
                .map_err(|err| err.with_frame(|| fragment.describe()))?;
        }
        Ok(())
    }

    fn write_fragment(&self, scope: &ScopeContext, fragment: &PageFragment) -> Result<(), EvalError> {
        match fragment {
            PageFragment::Text(text) => {
                scope.write(text);
                Ok(())
            }
            PageFragment::Variable(var) => self.write_variable(scope, var),
            PageFragment::Block(block) => self.write_block(scope, block),
            PageFragment::Statements(stmts) => {
                for statement in &stmts.statements {
                    if self.is_halted() {
                        break;
                    }
                    if let Err(err) = evaluator::evaluate(statement, scope) {
                        return self.handle_error(scope, None, err);
                    }
                }
                Ok(())
            }
        }
    }

    fn write_block(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        let context = self.context();
        if let Some(language) = context.language(block.name) {
            let source = match &block.body {
                BlockBody::Raw(source) => &**source,
                BlockBody::Fragments(_) => "",
            };
            return language
                .render(scope, block, source)
                .or_else(|err| self.handle_error(scope, None, err));
        }
        match context.block(block.name) {
            Some(handler) => handler.write(scope, block),
            None => Err(EvalErrorKind::Dispatch {
                name: block.name.to_string(),
                message: format!("Block in '{}' was not found.", block.name),
                candidates: Vec::new(),
            }
            .into()),
        }
    }

    fn write_variable(&self, scope: &ScopeContext, var: &VariableFragment) -> Result<(), EvalError> {
        if self.flags().contains(RenderFlags::IN_LAYOUT)
            && var.filters.is_empty()
            && var.binding == Some(Name::intern("page"))
        {
            self.set_flag(RenderFlags::IN_LAYOUT, false);
            let page = Arc::clone(self.page());
            return self.write_page(scope, &page);
        }

        match self.evaluate_variable(scope, var) {
            Ok(value) => {
                scope.write_value(&value);
                Ok(())
            }
            Err(err) => self.handle_error(scope, Some(var), err),
        }
    }

    /// Evaluate a variable fragment through its filter chain.
    pub fn evaluate_variable(&self, scope: &ScopeContext, var: &VariableFragment) -> EvalResult {
        let value = resolve_deferred(evaluator::evaluate(&var.expr, scope)?)?;
        if var.filters.is_empty() {
            return Ok(value);
        }
        if self.should_skip_filter_execution() {
            return Ok(Value::Null);
        }
        self.run_filters(scope, value, &var.filters)
    }

    fn run_filters(&self, scope: &ScopeContext, mut value: Value, filters: &[FilterCall]) -> EvalResult {
        for (i, filter) in filters.iter().enumerate() {
            if matches!(value, Value::Signal(_)) || self.is_halted() {
                break;
            }
            let args = self.filter_args(scope, value, filter)?;
            let Some(method) = self.resolve_method(filter.name, args.len()) else {
                if let Some(transform) = self.context().filter_transformer(filter.name) {
                    if args.len() == 1 {
                        let bytes = transform(args[0].to_string().into_bytes())?;
                        value = Value::string(lossy(bytes));
                        continue;
                    }
                }
                return Err(self.missing_method_error(filter.name, args.len()));
            };
            value = match &method.body {
                MethodBody::ContextBlock(body) => {
                    return self.stream_context_block(scope, method.name, body, &args, &filters[i + 1..]);
                }
                _ => self.call_method(scope, &method, &args)?,
            };
            value = resolve_deferred(value)?;
        }
        Ok(value)
    }

    /// Run a context block into a sub-stream, then feed the captured output
    /// through any following block or transformer stages before splicing it
    /// into the scope's stream. A plain filter stage turns the captured
    /// output back into a value for the rest of the chain.
    fn stream_context_block(
        &self,
        scope: &ScopeContext,
        name: Name,
        body: &ContextBlockFn,
        args: &[Value],
        rest: &[FilterCall],
    ) -> EvalResult {
        let sub = OutputStream::new();
        body(&scope.with_output(sub.clone()), args)
            .map_err(|err| err.with_frame(|| format!("filter '{name}'")))?;
        let mut bytes = sub.take();

        for (j, filter) in rest.iter().enumerate() {
            if let Some(transform) = self.context().filter_transformer(filter.name) {
                bytes = transform(bytes)?;
                continue;
            }
            let captured = Value::string(lossy(std::mem::take(&mut bytes)));
            let next_args = self.filter_args(scope, captured.clone(), filter)?;
            match self.resolve_method(filter.name, next_args.len()) {
                Some(method) => {
                    if let MethodBody::ContextBlock(next) = &method.body {
                        let next_out = OutputStream::new();
                        next(&scope.with_output(next_out.clone()), &next_args)?;
                        bytes = next_out.take();
                    } else {
                        let value = resolve_deferred(self.call_method(scope, &method, &next_args)?)?;
                        return self.run_filters(scope, value, &rest[j + 1..]);
                    }
                }
                None => return Err(self.missing_method_error(filter.name, next_args.len())),
            }
        }

        scope.output().write_bytes(&bytes);
        Ok(Value::Signal(Signal::Ignore))
    }

    /// Piped value followed by the evaluated filter arguments, with spreads
    /// flattened. A trailing error-capture options object is not passed.
    fn filter_args(&self, scope: &ScopeContext, piped: Value, filter: &FilterCall) -> Result<ArgVec, EvalError> {
        let mut args: ArgVec = SmallVec::new();
        args.push(piped);
        let exprs = match filter.args.split_last() {
            Some((last, init)) if capture_options(last).is_some() => init,
            _ => &filter.args[..],
        };
        evaluator::evaluate_args_into(exprs, scope, &mut args)?;
        Ok(args)
    }

    /// Offer a non-fatal error to a capture binding. Returns the error when
    /// the render must abort.
    pub(crate) fn handle_error(
        &self,
        scope: &ScopeContext,
        var: Option<&VariableFragment>,
        err: EvalError,
    ) -> Result<(), EvalError> {
        if err.is_fatal() {
            return Err(err);
        }
        let trace = self.record_error(&err);

        let target = var
            .and_then(inline_capture_target)
            .or_else(|| self.0.assign_exceptions_to.map(|name| (name, false)));
        let Some((name, clear)) = target else {
            return Err(err);
        };

        tracing::debug!(binding = %name, error = %err, "captured filter error");
        scope.define(name, Value::error(err));
        scope.define(
            Name::intern(&format!("{name}StackTrace")),
            Value::string(trace),
        );
        if clear {
            self.clear_last_error();
        }
        Ok(())
    }
}

/// `(binding, clear)` from an `{assignError: 'x'}` or `{catchError: 'x'}`
/// option on any stage of the chain.
fn inline_capture_target(var: &VariableFragment) -> Option<(Name, bool)> {
    let stage_options = var.filters.iter().filter_map(|f| f.args.last());
    let call_options = match &var.expr {
        Expr::Call { args, .. } => args.last(),
        _ => None,
    };
    call_options
        .into_iter()
        .chain(stage_options)
        .find_map(capture_options)
}

fn lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
