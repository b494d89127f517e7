//! Resolution of names the Lisp globals do not define.
//!
//! With a render scope attached, an unbound symbol is looked up as a scope
//! binding first and then by its sigil:
//!
//! | Symbol   | Resolves to                                  |
//! |----------|----------------------------------------------|
//! | `name`   | registered method `name`                     |
//! | `/name`  | registered method `name`                     |
//! | `:key`   | index or member read on the first argument   |
//! | `.name`  | method call on the first argument            |
//! | `Ns/fn`  | namespaced host function                     |
//! | `Type.`  | host constructor                             |

use quill_eval::{get_index, get_member, resolve_deferred, ScopeContext};
use quill_ir::Name;
use quill_value::errors::{lisp_error_with, runtime_error};
use quill_value::{EvalError, EvalResult, Value};

use super::Interpreter;
use crate::obj::{Env, HostRef, LispResult, Obj};
use crate::sym::Sym;

impl Interpreter {
    /// Value of an unbound symbol in the render scope, if any.
    pub(super) fn resolve_host_symbol(&self, sym: Sym) -> Result<Option<Obj>, EvalError> {
        let Some(scope) = &self.scope else {
            return Ok(None);
        };
        if let Some(value) = scope.lookup_binding(sym.as_name()) {
            return Ok(Some(Obj::from_value(resolve_deferred(value)?)));
        }
        let Some(target) = HostRef::classify(sym.name()) else {
            return Ok(None);
        };
        let exists = match &target {
            HostRef::Method(name) => scope.session().resolve_method(*name, 1).is_some(),
            HostRef::Getter(_) | HostRef::Member(_) => true,
            HostRef::Function(path) => scope.context().host().function(path).is_some(),
            HostRef::Constructor(type_name) => {
                if scope.context().host().constructor(type_name).is_none() {
                    return Err(runtime_error(format!("type '{type_name}' not found")));
                }
                true
            }
        };
        Ok(exists.then_some(Obj::Host(target)))
    }

    /// `(sym args...)` where `sym` has no global definition.
    pub(super) fn call_unbound(&mut self, sym: Sym, args: &Obj, env: &Env) -> LispResult {
        if self.scope.is_none() {
            return Err(lisp_error_with("undefined", sym));
        }
        let values = self.eval_args(args, env)?;
        self.call_host_named(sym, values)
    }

    pub(super) fn call_host_named(&mut self, sym: Sym, args: Vec<Obj>) -> LispResult {
        let Some(scope) = &self.scope else {
            return Err(lisp_error_with("undefined", sym));
        };
        if let Some(bound) = scope.lookup_binding(sym.as_name()) {
            let func = Obj::from_value(resolve_deferred(bound)?);
            if is_callable(&func) {
                return self.apply(&func, args);
            }
        }
        match HostRef::classify(sym.name()) {
            Some(target) => self.call_host(&target, args),
            None => Err(lisp_error_with("undefined", sym)),
        }
    }

    /// Call a host target with evaluated arguments.
    pub(crate) fn call_host(&mut self, target: &HostRef, args: Vec<Obj>) -> LispResult {
        let Some(scope) = self.scope.clone() else {
            return Err(lisp_error_with("host call outside a render", target));
        };
        let values: Vec<Value> = args.iter().map(Obj::to_value).collect();
        let session = scope.session();
        let result = match target {
            HostRef::Method(name) => match session.resolve_method(*name, values.len()) {
                Some(method) => session.call_method(&scope, &method, &values),
                None if session.context().methods().contains_name(*name) => {
                    Err(session.missing_method_error(*name, values.len()))
                }
                None => Err(lisp_error_with("undefined", name)),
            },
            HostRef::Getter(key) => match values.as_slice() {
                [Value::Null] => Ok(Value::Null),
                [target] => read_key(target, key),
                _ => Err(runtime_error(format!(
                    ":{key} takes exactly one target, got {}",
                    values.len()
                ))),
            },
            HostRef::Member(name) => match values.split_first() {
                Some((Value::Null, _)) => Ok(Value::Null),
                Some((target, rest)) => call_member(&scope, target, name, rest),
                None => Err(runtime_error(format!(".{name} needs a target"))),
            },
            HostRef::Function(path) => match scope.context().host().function(path) {
                Some(func) => func.invoke(path, &values),
                None => Err(lisp_error_with("undefined", path)),
            },
            HostRef::Constructor(type_name) => match scope.context().host().constructor(type_name) {
                Some(ctor) => ctor.invoke(type_name, &values),
                None => Err(runtime_error(format!("type '{type_name}' not found"))),
            },
        };
        Ok(Obj::from_value(resolve_deferred(result?)?))
    }
}

fn is_callable(func: &Obj) -> bool {
    matches!(
        func,
        Obj::Closure(_) | Obj::Builtin(_) | Obj::Macro(_) | Obj::Host(_) | Obj::Atom(Value::Function(_))
    )
}

/// `:key` on a value: numeric keys index, others read a member.
fn read_key(target: &Value, key: &str) -> EvalResult {
    match key.parse::<i64>() {
        Ok(index) => get_index(target, &Value::Int(index)),
        Err(_) => get_member(target, key),
    }
}

/// `.name` on a value: an instance method, a function stored in a map, a
/// registered method taking the target first, then a plain member read.
fn call_member(scope: &ScopeContext, target: &Value, name: &str, rest: &[Value]) -> EvalResult {
    match target {
        Value::Object(obj) => {
            if let Some(result) = obj.call_method(name, rest) {
                return result;
            }
        }
        Value::Map(map) => {
            if let Some(Value::Function(func)) = map.get(name) {
                return func.call(rest);
            }
        }
        _ => {}
    }
    let session = scope.session();
    let method = Name::intern(name);
    let mut args = Vec::with_capacity(rest.len() + 1);
    args.push(target.clone());
    args.extend_from_slice(rest);
    match session.resolve_method(method, args.len()) {
        Some(resolved) => session.call_method(scope, &resolved, &args),
        None if rest.is_empty() => get_member(target, name),
        None => Err(session.missing_method_error(method, args.len())),
    }
}
