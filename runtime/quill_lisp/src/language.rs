//! The `lisp` script language: `{{#lisp}} ... {{/lisp}}` blocks.
//!
//! Every block of one render shares a single interpreter, kept in the
//! session's extension slot, so definitions made in one block are visible in
//! the next. A nested render that re-enters a block while that interpreter
//! is busy gets a fresh one.

use std::cell::RefCell;
use std::sync::Arc;

use quill_eval::{OutputStream, Page, RenderSession, ScopeContext, ScriptContext, ScriptLanguage};
use quill_ir::{BlockBody, BlockFragment, Name, PageFragment};
use quill_value::errors::{not_implemented, syntax_error};
use quill_value::{EvalError, EvalResult, Value};

use crate::interp::{Globals, Interpreter, LoadCache};
use crate::obj::{Env, Obj};
use crate::printer;
use crate::prelude;
use crate::reader::read_all;

/// Block and language name.
pub const LISP: &str = "lisp";

pub struct LispLanguage {
    base: Arc<Globals>,
    loads: LoadCache,
}

/// Per-render interpreter.
struct SessionInterpreter(RefCell<Interpreter>);

impl LispLanguage {
    pub fn new() -> Result<LispLanguage, EvalError> {
        Ok(LispLanguage {
            base: prelude::base()?,
            loads: LoadCache::default(),
        })
    }

    /// Evaluate `source` into the globals every interpreter of this language
    /// starts from.
    pub fn with_import(self, source: &str) -> Result<LispLanguage, EvalError> {
        let mut interp = Interpreter::from_base(self.base, Arc::clone(&self.loads));
        interp.eval_source(source)?;
        Ok(LispLanguage {
            base: Arc::new(interp.into_globals()),
            loads: self.loads,
        })
    }

    /// Fresh interpreter over this language's globals.
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::from_base(Arc::clone(&self.base), Arc::clone(&self.loads))
    }

    fn with_interpreter<R>(&self, scope: &ScopeContext, f: impl FnOnce(&mut Interpreter) -> R) -> R {
        let slot = scope
            .session()
            .extension(|| SessionInterpreter(RefCell::new(self.interpreter())));
        let result = match slot.0.try_borrow_mut() {
            Ok(mut interp) => {
                let previous = interp.set_scope(Some(scope.clone()));
                let result = f(&mut interp);
                interp.set_scope(previous);
                result
            }
            Err(_) => {
                tracing::trace!("lisp interpreter busy, using a fresh one");
                let mut interp = self.interpreter();
                interp.set_scope(Some(scope.clone()));
                f(&mut interp)
            }
        };
        result
    }
}

impl ScriptLanguage for LispLanguage {
    fn name(&self) -> &str {
        LISP
    }

    fn render(
        &self,
        scope: &ScopeContext,
        block: &BlockFragment,
        source: &str,
    ) -> Result<(), EvalError> {
        let quiet = match block.argument.trim() {
            "" => false,
            "q" | "quiet" | "silent" => true,
            other => {
                return Err(syntax_error(format!(
                    "unknown modifier '{other}', expected 'q', 'quiet' or 'silent'"
                )))
            }
        };
        let forms = read_all(source)?;
        let scope = if quiet {
            scope.with_output(OutputStream::new())
        } else {
            scope.clone()
        };
        let separate = forms.len() > 1;
        self.with_interpreter(&scope, |interp| {
            for form in &forms {
                if scope.session().is_halted() {
                    break;
                }
                let value = interp.eval(form, &Env::default())?;
                if write_result(&scope, &value) && separate {
                    scope.write("\n");
                }
            }
            Ok(())
        })
    }

    fn evaluate(&self, scope: &ScopeContext, source: &str) -> EvalResult {
        let forms = read_all(source)?;
        self.with_interpreter(scope, |interp| {
            let mut last = Obj::Nil;
            for form in &forms {
                last = interp.eval(form, &Env::default())?;
            }
            Ok(last.to_value())
        })
    }
}

/// Write a form's value into the block output. Nothing is written for `nil`,
/// symbols and signals.
fn write_result(scope: &ScopeContext, value: &Obj) -> bool {
    let text = match value {
        Obj::Nil | Obj::Sym(_) | Obj::Atom(Value::Null | Value::Signal(_)) => return false,
        Obj::Atom(atom) => atom.to_string(),
        other => printer::to_string(other, false),
    };
    scope.write(&text);
    true
}

/// Render or evaluate Lisp source directly against a context with the
/// `lisp` language registered.
pub trait LispContextExt {
    /// Render `source` as the body of a single `lisp` block.
    fn render_lisp(&self, source: &str, args: Vec<(&str, Value)>) -> Result<String, EvalError>;

    /// Evaluate `source`: the value passed to `return`, otherwise the value
    /// of the last form.
    fn evaluate_lisp(&self, source: &str, args: Vec<(&str, Value)>) -> EvalResult;
}

impl LispContextExt for ScriptContext {
    fn render_lisp(&self, source: &str, args: Vec<(&str, Value)>) -> Result<String, EvalError> {
        lisp_registered(self)?;
        let block = BlockFragment {
            name: Name::intern(LISP),
            argument: Arc::from(""),
            body: BlockBody::Raw(Arc::from(source)),
            else_blocks: Vec::new(),
        };
        let page = Arc::new(Page::from_fragments("(lisp)", vec![PageFragment::Block(block)]));
        session(self, page, args).render_to_string()
    }

    fn evaluate_lisp(&self, source: &str, args: Vec<(&str, Value)>) -> EvalResult {
        let language = lisp_registered(self)?;
        let page = Arc::new(Page::from_fragments("(lisp)", Vec::new()));
        let session = session(self, page, args);
        session.init()?;
        let scope = session.root_scope();
        let last = language.evaluate(&scope, source)?;
        Ok(session.return_value().unwrap_or(last))
    }
}

fn lisp_registered(context: &ScriptContext) -> Result<&Arc<dyn ScriptLanguage>, EvalError> {
    context
        .language(Name::intern(LISP))
        .ok_or_else(|| not_implemented("the lisp language is not registered"))
}

fn session(context: &ScriptContext, page: Arc<Page>, args: Vec<(&str, Value)>) -> RenderSession {
    let mut builder = RenderSession::builder(context.clone(), page).no_layout();
    for (name, value) in args {
        builder = builder.arg(name, value);
    }
    builder.build()
}
