//! Render sessions.
//!
//! A [`RenderSession`] is created per render request and driven by one
//! thread. It owns the mutable state of a render: args written by scripts,
//! quota counters, flags, the live page stack and the last error. The shared
//! [`ScriptContext`] it renders against is never mutated.

mod trace;
mod write;

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use bitflags::bitflags;
use quill_ir::Name;
use quill_value::errors::{cancelled, missing_method, quota_exceeded, runtime_error};
use quill_value::{EvalError, EvalResult, Quota, Value};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cancel::CancellationToken;
use crate::context::ScriptContext;
use crate::output::{OutputStream, StreamTransformer};
use crate::page::Page;
use crate::registry::{MethodBody, MethodKind, MethodRegistry, ResolvedMethod, ScriptMethods};
use crate::scope::{ArgOrigin, LocalScope, Scope, ScopeContext};

pub use trace::CallTrace;

bitflags! {
    /// Render state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RenderFlags: u8 {
        /// `init` has run.
        const INITIALIZED = 1;
        /// Stop writing fragments; set by `halt` and `return`.
        const HALT_EXECUTION = 1 << 1;
        /// Variable fragments with filters render nothing.
        const SKIP_FILTER_EXECUTION = 1 << 2;
        /// The layout is being rendered and `{{ page }}` writes the page.
        const IN_LAYOUT = 1 << 3;
    }
}

#[derive(Clone, Debug)]
enum LayoutChoice {
    /// Front matter `layout`, else the context default layout when it exists.
    Default,
    Explicit(String),
    None,
}

/// Handle to one render. Clones share state.
#[derive(Clone)]
pub struct RenderSession(Rc<SessionState>);

struct SessionState {
    context: ScriptContext,
    page: Arc<Page>,
    layout_choice: LayoutChoice,
    layout: RefCell<Option<Arc<Page>>>,
    args: RefCell<FxHashMap<Name, Value>>,
    /// Args created by assigning an unbound name, with the assigning scope.
    arg_origins: RefCell<FxHashMap<Name, ArgOrigin>>,
    assignments: Cell<u64>,
    methods: Option<MethodRegistry>,
    excluded: FxHashSet<Name>,
    partials: RefCell<FxHashMap<Name, Arc<Page>>>,
    evaluations: Cell<u64>,
    flags: Cell<RenderFlags>,
    assign_exceptions_to: Option<Name>,
    skip_executing_filters_if_error: bool,
    last_error: RefCell<Option<EvalError>>,
    last_error_trace: RefCell<Option<String>>,
    return_value: RefCell<Option<Value>>,
    trace: RefCell<CallTrace>,
    output_transformers: Vec<StreamTransformer>,
    cancel: CancellationToken,
    extensions: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
}

/// Builder for [`RenderSession`].
pub struct SessionBuilder {
    context: ScriptContext,
    page: Arc<Page>,
    layout_choice: LayoutChoice,
    args: FxHashMap<Name, Value>,
    providers: Vec<ScriptMethods>,
    excluded: FxHashSet<Name>,
    assign_exceptions_to: Option<Name>,
    skip_executing_filters_if_error: Option<bool>,
    output_transformers: Vec<StreamTransformer>,
    cancel: CancellationToken,
}

impl SessionBuilder {
    #[must_use]
    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(Name::intern(name), value.into());
        self
    }

    /// Render inside this layout page instead of the default one.
    #[must_use]
    pub fn layout(mut self, path: &str) -> Self {
        self.layout_choice = LayoutChoice::Explicit(path.to_owned());
        self
    }

    #[must_use]
    pub fn no_layout(mut self) -> Self {
        self.layout_choice = LayoutChoice::None;
        self
    }

    /// Methods scanned before the context's, for this render only.
    #[must_use]
    pub fn methods(mut self, methods: ScriptMethods) -> Self {
        self.providers.push(methods);
        self
    }

    /// Hide every method with this name from the render.
    #[must_use]
    pub fn exclude_filter(mut self, name: &str) -> Self {
        self.excluded.insert(Name::intern(name));
        self
    }

    #[must_use]
    pub fn assign_exceptions_to(mut self, name: &str) -> Self {
        self.assign_exceptions_to = Some(Name::intern(name));
        self
    }

    #[must_use]
    pub fn skip_executing_filters_if_error(mut self, skip: bool) -> Self {
        self.skip_executing_filters_if_error = Some(skip);
        self
    }

    #[must_use]
    pub fn output_transformer(
        mut self,
        f: impl Fn(Vec<u8>) -> Result<Vec<u8>, EvalError> + Send + Sync + 'static,
    ) -> Self {
        self.output_transformers.push(Arc::new(f));
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> RenderSession {
        let methods = (!self.providers.is_empty()).then(|| MethodRegistry::build(&self.providers));
        let mut output_transformers = self.context.output_transformers().to_vec();
        output_transformers.extend(self.output_transformers);
        let max_depth = self.context.limits().max_stack_depth;
        RenderSession(Rc::new(SessionState {
            assign_exceptions_to: self
                .assign_exceptions_to
                .or_else(|| self.context.assign_exceptions_to()),
            skip_executing_filters_if_error: self
                .skip_executing_filters_if_error
                .unwrap_or_else(|| self.context.skip_executing_filters_if_error()),
            context: self.context,
            page: self.page,
            layout_choice: self.layout_choice,
            layout: RefCell::new(None),
            args: RefCell::new(self.args),
            arg_origins: RefCell::new(FxHashMap::default()),
            assignments: Cell::new(0),
            methods,
            excluded: self.excluded,
            partials: RefCell::new(FxHashMap::default()),
            evaluations: Cell::new(0),
            flags: Cell::new(RenderFlags::empty()),
            last_error: RefCell::new(None),
            last_error_trace: RefCell::new(None),
            return_value: RefCell::new(None),
            trace: RefCell::new(CallTrace::new(max_depth)),
            output_transformers,
            cancel: self.cancel,
            extensions: RefCell::new(FxHashMap::default()),
        }))
    }
}

/// Pops the page frame pushed by [`RenderSession::enter_page`].
pub struct PageGuard(RenderSession);

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.0 .0.trace.borrow_mut().pop();
    }
}

impl RenderSession {
    pub fn builder(context: ScriptContext, page: Arc<Page>) -> SessionBuilder {
        SessionBuilder {
            context,
            page,
            layout_choice: LayoutChoice::Default,
            args: FxHashMap::default(),
            providers: Vec::new(),
            excluded: FxHashSet::default(),
            assign_exceptions_to: None,
            skip_executing_filters_if_error: None,
            output_transformers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn context(&self) -> &ScriptContext {
        &self.0.context
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.0.page
    }

    pub fn layout(&self) -> Option<Arc<Page>> {
        self.0.layout.borrow().clone()
    }

    /// Root scope writing to a fresh stream.
    pub fn root_scope(&self) -> ScopeContext {
        ScopeContext::new(self.clone(), OutputStream::new())
    }

    // Args

    pub fn arg(&self, name: &str) -> Option<Value> {
        self.0.args.borrow().get(&Name::intern(name)).cloned()
    }

    /// Set a session arg visible to every scope.
    pub fn set_arg(&self, name: Name, value: Value) {
        self.0.arg_origins.borrow_mut().remove(&name);
        self.0.args.borrow_mut().insert(name, value);
    }

    /// Set a session arg for an assignment made in `level` to a name no
    /// scope binds.
    pub(crate) fn assign_arg(&self, name: Name, value: Value, level: LocalScope<Scope>) {
        let epoch = self.0.assignments.get() + 1;
        self.0.assignments.set(epoch);
        self.0
            .arg_origins
            .borrow_mut()
            .insert(name, ArgOrigin { epoch, level });
        self.0.args.borrow_mut().insert(name, value);
    }

    /// Assignments made so far by [`RenderSession::assign_arg`].
    pub(crate) fn assignments(&self) -> u64 {
        self.0.assignments.get()
    }

    pub(crate) fn arg_origin(&self, name: Name) -> Option<ArgOrigin> {
        self.0.arg_origins.borrow().get(&name).cloned()
    }

    /// Session args, then page args, then layout args, then context args.
    pub fn lookup_arg(&self, name: Name) -> Option<Value> {
        if let Some(value) = self.0.args.borrow().get(&name) {
            return Some(value.clone());
        }
        self.lookup_outer_arg(name)
    }

    /// Page args, then layout args, then context args.
    pub(crate) fn lookup_outer_arg(&self, name: Name) -> Option<Value> {
        if let Some(value) = self.0.page.args.get(&name) {
            return Some(value.clone());
        }
        if let Some(layout) = &*self.0.layout.borrow() {
            if let Some(value) = layout.args.get(&name) {
                return Some(value.clone());
            }
        }
        self.0.context.arg(name).cloned()
    }

    // Methods

    /// Resolve `name` with `arity` value arguments. Per category, session
    /// providers are scanned before the context's.
    pub fn resolve_method(&self, name: Name, arity: usize) -> Option<ResolvedMethod> {
        if self.0.excluded.contains(&name) {
            return None;
        }
        let context_methods = self.0.context.methods();
        MethodKind::ALL.iter().find_map(|kind| {
            self.0
                .methods
                .as_ref()
                .and_then(|methods| methods.lookup(name, arity, *kind))
                .or_else(|| context_methods.lookup(name, arity, *kind))
                .cloned()
        })
    }

    pub fn missing_method_error(&self, name: Name, arity: usize) -> EvalError {
        let mut candidates = self
            .0
            .methods
            .as_ref()
            .map(|methods| methods.candidates(name, arity))
            .unwrap_or_default();
        candidates.extend(self.0.context.methods().candidates(name, arity));
        candidates.dedup();
        missing_method(name.as_str(), arity, candidates)
    }

    /// Invoke a resolved method. Context blocks stream into the scope's
    /// output and yield an ignore signal.
    pub fn call_method(
        &self,
        scope: &ScopeContext,
        method: &ResolvedMethod,
        args: &[Value],
    ) -> EvalResult {
        match &method.body {
            MethodBody::Filter(f) => f
                .invoke(method.name.as_str(), args)
                .map_err(|err| native_fault_from(method.name, err)),
            MethodBody::ContextFilter(f) => {
                f(scope, args).map_err(|err| native_fault_from(method.name, err))
            }
            MethodBody::ContextBlock(f) => {
                f(scope, args).map_err(|err| native_fault_from(method.name, err))?;
                Ok(Value::Signal(quill_value::Signal::Ignore))
            }
        }
    }

    /// Call `name` with `args`, or fail with a dispatch error listing
    /// candidates.
    pub fn invoke_method(&self, scope: &ScopeContext, name: Name, args: &[Value]) -> EvalResult {
        match self.resolve_method(name, args.len()) {
            Some(method) => self.call_method(scope, &method, args),
            None => Err(self.missing_method_error(name, args.len())),
        }
    }

    /// Identifier fallback: a zero-argument filter, then a context filter
    /// that only takes the scope. `null` when neither exists.
    pub(crate) fn resolve_method_binding(&self, scope: &ScopeContext, name: Name) -> EvalResult {
        if self.0.excluded.contains(&name) {
            return Ok(Value::Null);
        }
        for kind in [MethodKind::Filter, MethodKind::ContextFilter] {
            let method = self
                .0
                .methods
                .as_ref()
                .and_then(|methods| methods.lookup(name, 0, kind))
                .or_else(|| self.0.context.methods().lookup(name, 0, kind))
                .cloned();
            if let Some(method) = method {
                return self.call_method(scope, &method, &[]);
            }
        }
        Ok(Value::Null)
    }

    // Quotas and flags

    /// Count one evaluation against the evaluation quota.
    pub fn assert_next_evaluation(&self) -> Result<(), EvalError> {
        let next = self.0.evaluations.get() + 1;
        self.0.evaluations.set(next);
        let max = self.0.context.limits().max_evaluations;
        if next > max {
            return Err(quota_exceeded(Quota::Evaluations, max));
        }
        Ok(())
    }

    pub fn evaluations(&self) -> u64 {
        self.0.evaluations.get()
    }

    /// Fail when `count` iterations exceed the iteration quota.
    pub fn assert_within_quota(&self, count: u64) -> Result<(), EvalError> {
        let max = self.0.context.limits().max_quota;
        if count > max {
            return Err(quota_exceeded(Quota::Iterations, max));
        }
        Ok(())
    }

    /// Enter a page or partial; the frame is popped when the guard drops.
    pub fn enter_page(&self, label: &str) -> Result<PageGuard, EvalError> {
        self.0.trace.borrow_mut().push(format!("page '{label}'"))?;
        Ok(PageGuard(self.clone()))
    }

    pub fn stack_depth(&self) -> usize {
        self.0.trace.borrow().depth()
    }

    pub fn check_cancelled(&self) -> Result<(), EvalError> {
        if self.0.cancel.is_cancelled() {
            return Err(cancelled());
        }
        Ok(())
    }

    pub fn flags(&self) -> RenderFlags {
        self.0.flags.get()
    }

    fn set_flag(&self, flag: RenderFlags, on: bool) {
        let mut flags = self.0.flags.get();
        flags.set(flag, on);
        self.0.flags.set(flags);
    }

    pub fn halt(&self) {
        self.set_flag(RenderFlags::HALT_EXECUTION, true);
    }

    pub fn is_halted(&self) -> bool {
        self.flags().contains(RenderFlags::HALT_EXECUTION)
    }

    pub fn skip_filter_execution(&self, skip: bool) {
        self.set_flag(RenderFlags::SKIP_FILTER_EXECUTION, skip);
    }

    pub fn should_skip_filter_execution(&self) -> bool {
        self.flags()
            .intersects(RenderFlags::HALT_EXECUTION | RenderFlags::SKIP_FILTER_EXECUTION)
            || (self.0.skip_executing_filters_if_error && self.0.last_error.borrow().is_some())
    }

    /// Stop the render, making `value` its result.
    pub fn set_return_value(&self, value: Value) {
        *self.0.return_value.borrow_mut() = Some(value);
        self.halt();
    }

    pub fn return_value(&self) -> Option<Value> {
        self.0.return_value.borrow().clone()
    }

    // Errors

    pub fn last_error(&self) -> Option<EvalError> {
        self.0.last_error.borrow().clone()
    }

    /// Formatted trace of the last error, one `   at` line per frame.
    pub fn last_error_stack_trace(&self) -> Option<String> {
        self.0.last_error_trace.borrow().clone()
    }

    pub fn clear_last_error(&self) {
        *self.0.last_error.borrow_mut() = None;
        *self.0.last_error_trace.borrow_mut() = None;
    }

    fn record_error(&self, err: &EvalError) -> String {
        let trace = self.0.trace.borrow().format_with(err);
        *self.0.last_error.borrow_mut() = Some(err.clone());
        *self.0.last_error_trace.borrow_mut() = Some(trace.clone());
        trace
    }

    /// Per-render state of type `T`, created by `init` on first use. Lets a
    /// language keep one interpreter for every block of a render.
    pub fn extension<T: 'static>(&self, init: impl FnOnce() -> T) -> Rc<T> {
        let key = TypeId::of::<T>();
        let existing = self.0.extensions.borrow().get(&key).cloned();
        if let Some(Ok(ext)) = existing.map(Rc::downcast::<T>) {
            return ext;
        }
        let ext = Rc::new(init());
        self.0
            .extensions
            .borrow_mut()
            .insert(key, Rc::clone(&ext) as Rc<dyn Any>);
        ext
    }

    // Partials

    /// Define an inline partial visible to the rest of this render.
    pub fn define_partial(&self, name: Name, page: Arc<Page>) {
        self.0.partials.borrow_mut().insert(name, page);
    }

    /// Inline partial, else a page from the page source.
    pub fn find_partial(&self, name: &str) -> Result<Option<Arc<Page>>, EvalError> {
        if let Some(page) = self.0.partials.borrow().get(&Name::intern(name)) {
            return Ok(Some(Arc::clone(page)));
        }
        self.0.context.page(name)
    }

    // Lifecycle

    /// Resolve the layout. Runs once per session.
    pub fn init(&self) -> Result<(), EvalError> {
        if self.flags().contains(RenderFlags::INITIALIZED) {
            return Ok(());
        }
        self.set_flag(RenderFlags::INITIALIZED, true);

        let layout = match &self.0.layout_choice {
            LayoutChoice::None => None,
            LayoutChoice::Explicit(path) => Some(self.require_page(path)?),
            LayoutChoice::Default => match &self.0.page.layout {
                Some(path) => Some(self.require_page(path)?),
                None => {
                    let default = self.0.context.default_layout();
                    self.0
                        .context
                        .page(default)?
                        .filter(|layout| layout.path != self.0.page.path)
                }
            },
        };
        if let Some(layout) = &layout {
            tracing::debug!(page = %self.0.page.path, layout = %layout.path, "resolved layout");
        }
        *self.0.layout.borrow_mut() = layout;
        Ok(())
    }

    fn require_page(&self, path: &str) -> Result<Arc<Page>, EvalError> {
        self.0
            .context
            .page(path)?
            .ok_or_else(|| runtime_error(format!("layout '{path}' not found")))
    }

    /// Render into `sink`. Output transformers run over the complete output
    /// before anything is written.
    pub fn render_to(&self, sink: &mut dyn io::Write) -> Result<(), EvalError> {
        let bytes = self.render_bytes()?;
        sink.write_all(&bytes)
            .and_then(|()| sink.flush())
            .map_err(|err| runtime_error(format!("failed to write output: {err}")))
    }

    pub fn render_to_string(&self) -> Result<String, EvalError> {
        let bytes = self.render_bytes()?;
        Ok(match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    fn render_bytes(&self) -> Result<Vec<u8>, EvalError> {
        let output = OutputStream::new();
        let scope = ScopeContext::new(self.clone(), output.clone());
        let result = self.init().and_then(|()| self.write_root(&scope));
        if let Err(err) = result {
            if self.0.last_error.borrow().as_ref() != Some(&err) {
                self.record_error(&err);
            }
            tracing::warn!(
                page = %self.0.page.path,
                kind = err.kind.label(),
                error = %err,
                "render failed"
            );
            return Err(err);
        }

        let mut bytes = output.take();
        for transform in &self.0.output_transformers {
            bytes = transform(bytes)?;
        }
        tracing::debug!(
            page = %self.0.page.path,
            bytes = bytes.len(),
            evaluations = self.evaluations(),
            "rendered page"
        );
        Ok(bytes)
    }
}

/// Attribute a generic failure from a native body to the method.
fn native_fault_from(name: Name, err: EvalError) -> EvalError {
    match err.kind {
        quill_value::EvalErrorKind::Runtime { message } => {
            let mut fault = quill_value::errors::native_fault(name.as_str(), message);
            fault.trace = err.trace;
            fault.notes = err.notes;
            fault
        }
        _ => err,
    }
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("page", &self.0.page.path)
            .field("flags", &self.0.flags.get())
            .field("evaluations", &self.0.evaluations.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
