//! Lisp evaluator.
//!
//! # Architecture
//!
//! - Evaluation is a trampoline: forms in tail position (`progn`, `cond`
//!   bodies, closure bodies, macro expansions) replace the current form
//!   instead of recursing, so loops written as tail calls run in constant
//!   native stack
//! - Every other nested evaluation counts against the `max_lisp_depth` limit
//!   and grows the stack through [`ensure_sufficient_stack`]
//! - With a render scope attached, each evaluation also counts against the
//!   session's evaluation quota, and a halted session short-circuits to `nil`
//! - Unbound symbols fall back to the render scope and its host methods; see
//!   the `host` module

mod compile;
mod host;

use std::sync::Arc;

use dashmap::DashMap;
use quill_eval::{RenderLimits, ScopeContext};
use quill_value::errors::{lisp_error, lisp_error_with, native_fault, quota_exceeded};
use quill_value::{ensure_sufficient_stack, EvalError, EvalErrorKind, Quota, Value};
use rustc_hash::FxHashMap;

pub(crate) use compile::{single_operand, FuncKind};

use crate::obj::{Builtin, Closure, Env, Func, LispResult, Obj, Slots};
use crate::printer;
use crate::quasiquote;
use crate::reader;
use crate::sym::{syms, Sym};

/// Global variable table.
pub type Globals = FxHashMap<Sym, Obj>;

/// Definitions produced by `(load "path")`, shared by every interpreter of a
/// language.
pub type LoadCache = Arc<DashMap<String, Arc<Globals>>>;

/// Longest printed form kept as a trace frame.
const MAX_FRAME_LEN: usize = 160;

enum Step {
    Done(Obj),
    /// Continue with this form in this environment.
    Tail(Obj, Env),
}

pub struct Interpreter {
    globals: Globals,
    /// Globals this interpreter started from.
    base: Arc<Globals>,
    scope: Option<ScopeContext>,
    loads: LoadCache,
    depth: usize,
    max_depth: usize,
    /// Steps taken by the current top-level evaluation while no scope is
    /// attached. With a scope the session counts them.
    evaluations: u64,
    max_evaluations: u64,
    /// Output written while no scope is attached.
    output: String,
    /// `return` value while no scope is attached.
    return_value: Option<Obj>,
}

impl Interpreter {
    /// Interpreter with the builtins and the prelude.
    pub fn new() -> Result<Interpreter, EvalError> {
        Ok(Interpreter::from_base(
            crate::prelude::base()?,
            LoadCache::default(),
        ))
    }

    pub(crate) fn from_base(base: Arc<Globals>, loads: LoadCache) -> Interpreter {
        Interpreter {
            globals: (*base).clone(),
            base,
            scope: None,
            loads,
            depth: 0,
            max_depth: RenderLimits::default().max_lisp_depth,
            evaluations: 0,
            max_evaluations: RenderLimits::default().max_evaluations,
            output: String::new(),
            return_value: None,
        }
    }

    /// Attach a render scope, returning the previous one.
    pub fn set_scope(&mut self, scope: Option<ScopeContext>) -> Option<ScopeContext> {
        if let Some(scope) = &scope {
            self.max_depth = scope.context().limits().max_lisp_depth;
        }
        std::mem::replace(&mut self.scope, scope)
    }

    pub fn scope(&self) -> Option<&ScopeContext> {
        self.scope.as_ref()
    }

    pub fn global(&self, name: &str) -> Option<Obj> {
        self.globals.get(&Sym::intern(name)).cloned()
    }

    pub fn define(&mut self, name: &str, value: Obj) {
        self.globals.insert(Sym::intern(name), value);
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub(crate) fn into_globals(self) -> Globals {
        self.globals
    }

    /// Read and evaluate every form in `source`; the value of the last.
    pub fn eval_source(&mut self, source: &str) -> LispResult {
        let mut last = Obj::Nil;
        for form in reader::read_all(source)? {
            last = self.eval(&form, &Env::default())?;
        }
        Ok(last)
    }

    /// Text written by the print builtins while no scope was attached.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn write(&mut self, text: &str) {
        match &self.scope {
            Some(scope) => scope.write(text),
            None => self.output.push_str(text),
        }
    }

    /// Value passed to `return`.
    pub fn return_value(&self) -> Option<Obj> {
        match &self.scope {
            Some(scope) => scope.session().return_value().map(Obj::from_value),
            None => self.return_value.clone(),
        }
    }

    pub(crate) fn set_return_value(&mut self, value: Obj) {
        match &self.scope {
            Some(scope) => scope.session().set_return_value(value.to_value()),
            None => self.return_value = Some(value),
        }
    }

    // Evaluation

    pub fn eval(&mut self, x: &Obj, env: &Env) -> LispResult {
        if let Some(scope) = &self.scope {
            let session = scope.session();
            if session.is_halted() {
                return Ok(Obj::Nil);
            }
        } else if self.depth == 0 {
            self.evaluations = 0;
        }
        if self.depth >= self.max_depth {
            return Err(quota_exceeded(Quota::LispDepth, self.max_depth as u64));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.eval_loop(x.clone(), env.clone()));
        self.depth -= 1;
        result
    }

    fn eval_loop(&mut self, mut x: Obj, mut env: Env) -> LispResult {
        loop {
            self.count_evaluation()?;
            match self.step(&x, &env) {
                Ok(Step::Done(value)) => return Ok(value),
                Ok(Step::Tail(next, next_env)) => {
                    x = next;
                    env = next_env;
                }
                Err(err) => return Err(err.with_frame(|| frame_text(&x))),
            }
        }
    }

    /// Count one trampoline step, tail calls and macro expansions included.
    fn count_evaluation(&mut self) -> Result<(), EvalError> {
        if let Some(scope) = &self.scope {
            return scope.session().assert_next_evaluation();
        }
        self.evaluations += 1;
        if self.evaluations > self.max_evaluations {
            return Err(quota_exceeded(Quota::Evaluations, self.max_evaluations));
        }
        Ok(())
    }

    fn step(&mut self, x: &Obj, env: &Env) -> Result<Step, EvalError> {
        match x {
            Obj::Arg(arg) => env.get(*arg).map(Step::Done),
            Obj::Sym(sym) => self.eval_symbol(*sym).map(Step::Done),
            Obj::Cell(cell) => {
                let head = cell.car();
                let args = cell.cdr();
                if let Some(keyword) = head.as_sym().filter(|sym| sym.is_keyword()) {
                    return self.special_form(keyword, x, &args, env);
                }
                let func = match &head {
                    Obj::Sym(sym) => match self.globals.get(sym) {
                        Some(func) => func.clone(),
                        None => return self.call_unbound(*sym, &args, env).map(Step::Done),
                    },
                    other => self.eval(other, env)?,
                };
                self.apply_form(func, &args, env)
            }
            Obj::Lambda(func) => Ok(Step::Done(Obj::Closure(Arc::new(Closure {
                func: Arc::clone(func),
                env: env.clone(),
            })))),
            other => Ok(Step::Done(other.clone())),
        }
    }

    fn eval_symbol(&mut self, sym: Sym) -> LispResult {
        if let Some(value) = self.globals.get(&sym) {
            return Ok(value.clone());
        }
        if let Some(value) = self.resolve_host_symbol(sym)? {
            return Ok(value);
        }
        Err(lisp_error_with("void variable", sym))
    }

    fn special_form(&mut self, keyword: Sym, form: &Obj, args: &Obj, env: &Env) -> Result<Step, EvalError> {
        let s = syms();
        if keyword == s.quote {
            return single_operand(form, "bad quote").map(Step::Done);
        }
        if keyword == s.progn {
            let last = self.eval_progn(args, env)?;
            return Ok(Step::Tail(last, env.clone()));
        }
        if keyword == s.cond {
            return self.eval_cond(args, env);
        }
        if keyword == s.setq {
            return self.eval_setq(args, env).map(Step::Done);
        }
        if keyword == s.export {
            return self.eval_export(args, env).map(Step::Done);
        }
        if keyword == s.lambda || keyword == s.fn_ {
            return self.compile(args, env, FuncKind::Closure).map(Step::Done);
        }
        if keyword == s.macro_ {
            if !env.is_global() {
                return Err(lisp_error_with("nested macro", form));
            }
            return self
                .compile(args, &Env::default(), FuncKind::Macro)
                .map(Step::Done);
        }
        if keyword == s.quasiquote {
            let body = single_operand(form, "bad quasiquote")?;
            return Ok(Step::Tail(quasiquote::expand(&body), env.clone()));
        }
        Err(lisp_error_with("bad keyword", keyword))
    }

    /// Evaluate all but the last form of `body`; the last is returned
    /// unevaluated for the trampoline.
    fn eval_progn(&mut self, body: &Obj, env: &Env) -> LispResult {
        let mut cursor = body.clone();
        loop {
            match cursor {
                Obj::Nil => return Ok(Obj::Nil),
                Obj::Cell(cell) => {
                    let rest = cell.cdr();
                    if rest.is_nil() {
                        return Ok(cell.car());
                    }
                    self.eval(&cell.car(), env)?;
                    cursor = rest;
                }
                other => return Err(lisp_error_with("proper list expected", other)),
            }
        }
    }

    /// Evaluate `body` completely.
    fn eval_body(&mut self, body: &Obj, env: &Env) -> LispResult {
        let last = self.eval_progn(body, env)?;
        self.eval(&last, env)
    }

    fn eval_cond(&mut self, clauses: &Obj, env: &Env) -> Result<Step, EvalError> {
        for clause in clauses.to_vec()? {
            let clause = match clause {
                Obj::Cell(clause) => clause,
                Obj::Nil => continue,
                other => return Err(lisp_error_with("cond test expected", other)),
            };
            let test = self.eval(&clause.car(), env)?;
            if test.is_truthy() {
                let body = clause.cdr();
                if body.is_nil() {
                    return Ok(Step::Done(test));
                }
                let last = self.eval_progn(&body, env)?;
                return Ok(Step::Tail(last, env.clone()));
            }
        }
        Ok(Step::Done(Obj::Nil))
    }

    /// `(setq a 1 b 2)`: lexical parameters, otherwise globals.
    fn eval_setq(&mut self, args: &Obj, env: &Env) -> LispResult {
        let s = syms();
        let mut result = Obj::Nil;
        let mut cursor = args.clone();
        while let Obj::Cell(cell) = cursor {
            let target = cell.car();
            if target.as_sym() == Some(s.t) {
                return Err(lisp_error_with("not assignable", target));
            }
            let Obj::Cell(value) = cell.cdr() else {
                return Err(lisp_error_with("right value expected", target));
            };
            result = self.eval(&value.car(), env)?;
            match &target {
                Obj::Arg(arg) => env.set(*arg, result.clone())?,
                Obj::Sym(sym) if !sym.is_keyword() => {
                    self.globals.insert(*sym, result.clone());
                }
                other => return Err(lisp_error_with("not a variable", other)),
            }
            cursor = value.cdr();
        }
        Ok(result)
    }

    /// `(export name value ...)`: assign render args visible to the rest of
    /// the page.
    fn eval_export(&mut self, args: &Obj, env: &Env) -> LispResult {
        let s = syms();
        let mut cursor = args.clone();
        while let Obj::Cell(cell) = cursor {
            let target = cell.car();
            let name = match &target {
                Obj::Sym(sym) if *sym != s.t && !sym.is_keyword() => sym.as_name(),
                Obj::Arg(arg) => arg.sym.as_name(),
                other => return Err(lisp_error_with("not a variable", other)),
            };
            let Obj::Cell(value) = cell.cdr() else {
                return Err(lisp_error_with("right value expected", target));
            };
            let result = self.eval(&value.car(), env)?;
            let Some(scope) = &self.scope else {
                return Err(lisp_error("export needs a render scope"));
            };
            scope.session().set_arg(name, result.to_value());
            cursor = value.cdr();
        }
        Ok(Obj::Nil)
    }

    fn apply_form(&mut self, func: Obj, args: &Obj, env: &Env) -> Result<Step, EvalError> {
        match &func {
            Obj::Closure(closure) => {
                let slots = self.eval_frame(closure.func.arity, args, env, &func)?;
                let inner = closure.env.push(slots);
                let last = self.eval_progn(&closure.func.body, &inner)?;
                Ok(Step::Tail(last, inner))
            }
            Obj::Macro(macro_func) => {
                let expanded = self.expand_macro(macro_func, args)?;
                Ok(Step::Tail(expanded, env.clone()))
            }
            Obj::Builtin(builtin) => {
                let slots = self.eval_frame(builtin.arity, args, env, &func)?;
                self.call_builtin(builtin, &slots).map(Step::Done)
            }
            _ => {
                let values = self.eval_args(args, env)?;
                self.apply(&func, values).map(Step::Done)
            }
        }
    }

    fn eval_args(&mut self, args: &Obj, env: &Env) -> Result<Vec<Obj>, EvalError> {
        let exprs = args.to_vec()?;
        let mut values = Vec::with_capacity(exprs.len());
        for expr in &exprs {
            values.push(self.eval(expr, env)?);
        }
        Ok(values)
    }

    fn eval_frame(
        &mut self,
        arity: crate::obj::Arity,
        args: &Obj,
        env: &Env,
        callee: &Obj,
    ) -> Result<Slots, EvalError> {
        let exprs = args.to_vec()?;
        if !arity.accepts(exprs.len()) {
            return Err(lisp_error_with("arity not matched", callee));
        }
        let mut values = Vec::with_capacity(exprs.len());
        for expr in &exprs {
            values.push(self.eval(expr, env)?);
        }
        arity.pack(values, callee)
    }

    /// Expand a macro call with unevaluated `args`.
    pub(crate) fn expand_macro(&mut self, func: &Arc<Func>, args: &Obj) -> LispResult {
        let callee = Obj::Macro(Arc::clone(func));
        let slots = func.arity.pack(args.to_vec()?, &callee)?;
        let env = Env::default().push(slots);
        self.eval_body(&func.body, &env)
    }

    /// Call `func` with evaluated arguments.
    pub fn apply(&mut self, func: &Obj, args: Vec<Obj>) -> LispResult {
        match func {
            Obj::Closure(closure) => {
                let slots = closure.func.arity.pack(args, func)?;
                let inner = closure.env.push(slots);
                self.eval_body(&closure.func.body, &inner)
            }
            Obj::Lambda(lambda) => {
                let slots = lambda.arity.pack(args, func)?;
                let inner = Env::default().push(slots);
                self.eval_body(&lambda.body, &inner)
            }
            Obj::Macro(macro_func) => {
                let expanded = self.expand_macro(macro_func, &Obj::list(args))?;
                self.eval(&expanded, &Env::default())
            }
            Obj::Builtin(builtin) => {
                let slots = builtin.arity.pack(args, func)?;
                self.call_builtin(builtin, &slots)
            }
            Obj::Host(target) => self.call_host(target, args),
            Obj::Atom(Value::Function(function)) => {
                let values: Vec<Value> = args.iter().map(Obj::to_value).collect();
                Ok(Obj::from_value(function.call(&values)?))
            }
            Obj::Sym(sym) => match self.globals.get(sym).cloned() {
                Some(bound) => self.apply(&bound, args),
                None => self.call_host_named(*sym, args),
            },
            other => Err(lisp_error_with("not applicable", other)),
        }
    }

    /// Run a builtin body. Runtime failures inside it are reported against
    /// the builtin's name.
    fn call_builtin(&mut self, builtin: &Builtin, args: &[Obj]) -> LispResult {
        (builtin.body)(self, args).map_err(|err| match err.kind {
            EvalErrorKind::Runtime { message } => {
                let mut fault = native_fault(builtin.name, message);
                fault.trace = err.trace;
                fault.notes = err.notes;
                fault
            }
            kind => EvalError {
                kind,
                trace: err.trace,
                notes: err.notes,
            },
        })
    }

    /// Merge the globals defined by `(load path)`.
    pub(crate) fn load(&mut self, path: &str) -> LispResult {
        if let Some(cached) = self.loads.get(path).map(|entry| Arc::clone(entry.value())) {
            self.merge_globals(&cached);
            return Ok(Obj::Nil);
        }
        let scope = self
            .scope
            .clone()
            .ok_or_else(|| lisp_error_with("load needs a render scope", path))?;
        let source = scope
            .context()
            .page_source(path)
            .ok_or_else(|| lisp_error_with("file not found", path))?;
        let mut loader = Interpreter::from_base(Arc::clone(&self.base), Arc::clone(&self.loads));
        loader.set_scope(Some(scope));
        loader.eval_source(&source)?;
        let loaded: Globals = loader
            .globals
            .iter()
            .filter(|(sym, value)| {
                self.base
                    .get(*sym)
                    .map_or(true, |before| !before.is_identical(value))
            })
            .map(|(sym, value)| (*sym, value.clone()))
            .collect();
        tracing::debug!(path, definitions = loaded.len(), "loaded lisp source");
        let loaded = Arc::new(loaded);
        self.loads.insert(path.to_owned(), Arc::clone(&loaded));
        self.merge_globals(&loaded);
        Ok(Obj::Nil)
    }

    fn merge_globals(&mut self, loaded: &Globals) {
        for (sym, value) in loaded {
            self.globals.insert(*sym, value.clone());
        }
    }
}

fn frame_text(x: &Obj) -> String {
    let mut text = printer::to_string(x, true);
    if text.len() > MAX_FRAME_LEN {
        let mut end = MAX_FRAME_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests;
