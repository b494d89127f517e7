//! Script context: the shared, read-mostly configuration every render runs
//! against.
//!
//! A [`ScriptContext`] is built once by [`ScriptContextBuilder`] and then
//! shared across threads. Everything in it is immutable except three lazily
//! populated caches (compiled setters, parsed pages, language caches owned by
//! the languages themselves), which are concurrent maps.

use std::sync::Arc;

use dashmap::DashMap;
use quill_ir::Name;
use quill_parse::{parse_expression, TemplateSyntax};
use quill_value::{EvalError, EvalResult, NativeFn, Value};
use rustc_hash::FxHashMap;

use crate::blocks::{default_blocks, ScriptBlock};
use crate::config::RenderLimits;
use crate::evaluator::{self, CompiledSetter};
use crate::filters::default_scripts;
use crate::host::HostTypes;
use crate::language::ScriptLanguage;
use crate::output::StreamTransformer;
use crate::page::{normalize_path, Page, PageSource};
use crate::registry::{MethodRegistry, ScriptMethods};
use crate::session::RenderSession;
use crate::shared::SharedRegistry;

/// Layout page applied when a page names none.
pub const DEFAULT_LAYOUT: &str = "_layout";

#[derive(Clone)]
pub struct ScriptContext(Arc<ContextInner>);

struct ContextInner {
    methods: SharedRegistry<MethodRegistry>,
    blocks: FxHashMap<Name, Arc<dyn ScriptBlock>>,
    languages: FxHashMap<Name, Arc<dyn ScriptLanguage>>,
    args: FxHashMap<Name, Value>,
    pages: Option<Arc<dyn PageSource>>,
    page_cache: DashMap<String, Arc<Page>>,
    setters: DashMap<(String, String), CompiledSetter>,
    limits: RenderLimits,
    syntax: TemplateSyntax,
    host: SharedRegistry<HostTypes>,
    default_layout: Arc<str>,
    assign_exceptions_to: Option<Name>,
    skip_executing_filters_if_error: bool,
    output_transformers: Vec<StreamTransformer>,
    filter_transformers: FxHashMap<Name, StreamTransformer>,
}

impl ScriptContext {
    pub fn builder() -> ScriptContextBuilder {
        ScriptContextBuilder::new()
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.0.methods
    }

    pub fn block(&self, name: Name) -> Option<&Arc<dyn ScriptBlock>> {
        self.0.blocks.get(&name)
    }

    pub fn language(&self, name: Name) -> Option<&Arc<dyn ScriptLanguage>> {
        self.0.languages.get(&name)
    }

    pub fn arg(&self, name: Name) -> Option<&Value> {
        self.0.args.get(&name)
    }

    pub fn limits(&self) -> &RenderLimits {
        &self.0.limits
    }

    pub fn syntax(&self) -> &TemplateSyntax {
        &self.0.syntax
    }

    pub fn host(&self) -> &SharedRegistry<HostTypes> {
        &self.0.host
    }

    pub fn default_layout(&self) -> &str {
        &self.0.default_layout
    }

    pub fn assign_exceptions_to(&self) -> Option<Name> {
        self.0.assign_exceptions_to
    }

    pub fn skip_executing_filters_if_error(&self) -> bool {
        self.0.skip_executing_filters_if_error
    }

    pub fn output_transformers(&self) -> &[StreamTransformer] {
        &self.0.output_transformers
    }

    pub fn filter_transformer(&self, name: Name) -> Option<&StreamTransformer> {
        self.0.filter_transformers.get(&name)
    }

    pub fn parse_page(&self, path: &str, source: &str) -> Result<Page, EvalError> {
        Page::parse(path, source, &self.0.syntax)
    }

    /// Unparsed page source text.
    pub fn page_source(&self, path: &str) -> Option<Arc<str>> {
        self.0.pages.as_ref()?.load(normalize_path(path))
    }

    /// Resolve and parse a page through the page source, caching the result.
    pub fn page(&self, path: &str) -> Result<Option<Arc<Page>>, EvalError> {
        let path = normalize_path(path);
        if let Some(page) = self.0.page_cache.get(path) {
            return Ok(Some(Arc::clone(page.value())));
        }
        let Some(source) = self.0.pages.as_ref().and_then(|pages| pages.load(path)) else {
            return Ok(None);
        };
        let page = Arc::new(self.parse_page(path, &source)?);
        // A concurrent render may have parsed the same page; keep the first.
        let entry = self
            .0
            .page_cache
            .entry(path.to_owned())
            .or_insert_with(|| Arc::clone(&page));
        Ok(Some(Arc::clone(entry.value())))
    }

    /// Compiled member setter for `(target type, expression text)`.
    pub(crate) fn setter(
        &self,
        type_name: &str,
        expression: &str,
        compile: impl FnOnce() -> CompiledSetter,
    ) -> CompiledSetter {
        let key = (type_name.to_owned(), expression.to_owned());
        if let Some(setter) = self.0.setters.get(&key) {
            return Arc::clone(setter.value());
        }
        let entry = self.0.setters.entry(key).or_insert_with(compile);
        Arc::clone(entry.value())
    }

    #[cfg(test)]
    pub(crate) fn cached_setters(&self) -> usize {
        self.0.setters.len()
    }

    /// Render the page at `path`.
    pub fn render(&self, path: &str, args: Vec<(&str, Value)>) -> Result<String, EvalError> {
        let page = self
            .page(path)?
            .ok_or_else(|| quill_value::errors::runtime_error(format!("page '{path}' not found")))?;
        let mut session = RenderSession::builder(self.clone(), page);
        for (name, value) in args {
            session = session.arg(name, value);
        }
        session.build().render_to_string()
    }

    /// Render template source that is not backed by the page source. No
    /// layout is applied.
    pub fn render_source(&self, source: &str, args: Vec<(&str, Value)>) -> Result<String, EvalError> {
        let page = Arc::new(self.parse_page("(inline)", source)?);
        let mut session = RenderSession::builder(self.clone(), page).no_layout();
        for (name, value) in args {
            session = session.arg(name, value);
        }
        session.build().render_to_string()
    }

    /// Render template source for its value: the argument of a `return`
    /// filter when one runs, otherwise the rendered text.
    pub fn evaluate(&self, source: &str, args: Vec<(&str, Value)>) -> EvalResult {
        let page = Arc::new(self.parse_page("(script)", source)?);
        let mut session = RenderSession::builder(self.clone(), page).no_layout();
        for (name, value) in args {
            session = session.arg(name, value);
        }
        let session = session.build();
        let output = session.render_to_string()?;
        Ok(session.return_value().unwrap_or_else(|| Value::string(output)))
    }

    /// Evaluate a single expression against a fresh session.
    pub fn evaluate_expression(&self, source: &str, args: Vec<(&str, Value)>) -> EvalResult {
        let expr = parse_expression(source)?;
        let page = Arc::new(Page::from_fragments("(expression)", Vec::new()));
        let mut session = RenderSession::builder(self.clone(), page).no_layout();
        for (name, value) in args {
            session = session.arg(name, value);
        }
        let session = session.build();
        let scope = session.root_scope();
        session.init()?;
        evaluator::evaluate(&expr, &scope)
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("methods", &self.0.methods.len())
            .field("blocks", &self.0.blocks.len())
            .field("languages", &self.0.languages.len())
            .field("limits", &self.0.limits)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ScriptContext`].
///
/// Starts with the default filters and blocks registered.
pub struct ScriptContextBuilder {
    providers: Vec<ScriptMethods>,
    blocks: Vec<Arc<dyn ScriptBlock>>,
    languages: Vec<Arc<dyn ScriptLanguage>>,
    args: FxHashMap<Name, Value>,
    pages: Option<Arc<dyn PageSource>>,
    limits: RenderLimits,
    host: HostTypes,
    default_layout: Arc<str>,
    assign_exceptions_to: Option<Name>,
    skip_executing_filters_if_error: bool,
    output_transformers: Vec<StreamTransformer>,
    filter_transformers: FxHashMap<Name, StreamTransformer>,
}

impl Default for ScriptContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptContextBuilder {
    pub fn new() -> Self {
        ScriptContextBuilder {
            providers: vec![default_scripts()],
            blocks: default_blocks(),
            languages: Vec::new(),
            args: FxHashMap::default(),
            pages: None,
            limits: RenderLimits::default(),
            host: HostTypes::new(),
            default_layout: Arc::from(DEFAULT_LAYOUT),
            assign_exceptions_to: None,
            skip_executing_filters_if_error: false,
            output_transformers: Vec::new(),
            filter_transformers: FxHashMap::default(),
        }
    }

    /// Drop the default filters and blocks.
    #[must_use]
    pub fn without_defaults(mut self) -> Self {
        self.providers.clear();
        self.blocks.clear();
        self
    }

    /// Append a provider. Earlier providers win on conflicts.
    #[must_use]
    pub fn methods(mut self, methods: ScriptMethods) -> Self {
        self.providers.push(methods);
        self
    }

    /// Register a block; replaces an earlier block of the same name.
    #[must_use]
    pub fn block(mut self, block: impl ScriptBlock + 'static) -> Self {
        self.blocks.push(Arc::new(block));
        self
    }

    #[must_use]
    pub fn language(mut self, language: impl ScriptLanguage + 'static) -> Self {
        self.languages.push(Arc::new(language));
        self
    }

    #[must_use]
    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(Name::intern(name), value.into());
        self
    }

    #[must_use]
    pub fn pages(mut self, pages: impl PageSource + 'static) -> Self {
        self.pages = Some(Arc::new(pages));
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: RenderLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn host_constructor(mut self, type_name: &str, ctor: NativeFn) -> Self {
        self.host.add_constructor(type_name, ctor);
        self
    }

    /// Register a static host function under `Namespace/name`.
    #[must_use]
    pub fn host_function(mut self, path: &str, func: NativeFn) -> Self {
        self.host.add_function(path, func);
        self
    }

    #[must_use]
    pub fn default_layout(mut self, path: &str) -> Self {
        self.default_layout = Arc::from(path);
        self
    }

    /// Bind uncaught non-fatal filter errors to this scope variable.
    #[must_use]
    pub fn assign_exceptions_to(mut self, name: &str) -> Self {
        self.assign_exceptions_to = Some(Name::intern(name));
        self
    }

    #[must_use]
    pub fn skip_executing_filters_if_error(mut self, skip: bool) -> Self {
        self.skip_executing_filters_if_error = skip;
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

    /// Transformer usable as a filter stage after a context block.
    #[must_use]
    pub fn filter_transformer(
        mut self,
        name: &str,
        f: impl Fn(Vec<u8>) -> Result<Vec<u8>, EvalError> + Send + Sync + 'static,
    ) -> Self {
        self.filter_transformers
            .insert(Name::intern(name), Arc::new(f));
        self
    }

    pub fn build(self) -> ScriptContext {
        let mut syntax = TemplateSyntax::default();
        let mut blocks = FxHashMap::default();
        for block in self.blocks {
            if block.raw_body() {
                syntax = syntax.with_raw_block(block.name());
            }
            blocks.insert(Name::intern(block.name()), block);
        }
        let mut languages = FxHashMap::default();
        for language in self.languages {
            syntax = syntax.with_raw_block(language.name());
            languages.insert(Name::intern(language.name()), language);
        }

        let methods = MethodRegistry::build(&self.providers);
        tracing::debug!(
            providers = self.providers.len(),
            methods = methods.len(),
            blocks = blocks.len(),
            languages = languages.len(),
            "built script context"
        );

        ScriptContext(Arc::new(ContextInner {
            methods: SharedRegistry::new(methods),
            blocks,
            languages,
            args: self.args,
            pages: self.pages,
            page_cache: DashMap::new(),
            setters: DashMap::new(),
            limits: self.limits,
            syntax,
            host: SharedRegistry::new(self.host),
            default_layout: self.default_layout,
            assign_exceptions_to: self.assign_exceptions_to,
            skip_executing_filters_if_error: self.skip_executing_filters_if_error,
            output_transformers: self.output_transformers,
            filter_transformers: self.filter_transformers,
        }))
    }
}

#[cfg(test)]
mod tests;
