//! Scope levels and the scope context threaded through every evaluation.
//!
//! A [`ScopeContext`] is cheap to clone: a session handle, the innermost
//! [`Scope`] level and an output stream. Forking pushes a fresh level whose
//! binding map is its own; parents are only reached through the chain.

// Rc is the implementation of LocalScope<T>
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use quill_ir::Name;
use quill_value::errors::binding_failure;
use quill_value::{EvalError, Value};
use rustc_hash::FxHashMap;

use crate::context::ScriptContext;
use crate::output::OutputStream;
use crate::session::RenderSession;

/// Whether a binding can be reassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    /// `var`, `let` and implicit bindings.
    Mutable,
    /// `const` bindings.
    Immutable,
}

impl Mutability {
    #[inline]
    pub fn is_mutable(self) -> bool {
        matches!(self, Mutability::Mutable)
    }
}

/// Error returned by [`Scope::assign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignError {
    /// Binding exists but is `const`.
    Immutable,
    /// No level in the chain binds the name.
    Undefined,
}

/// Single-threaded shared cell for scope levels.
///
/// All scope allocations go through [`LocalScope::new`]. Not `Send`: a render
/// session is driven by one thread at a time.
#[repr(transparent)]
pub struct LocalScope<T>(Rc<RefCell<T>>);

impl<T> LocalScope<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        LocalScope(Rc::new(RefCell::new(value)))
    }

    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl<T> Clone for LocalScope<T> {
    #[inline]
    fn clone(&self) -> Self {
        LocalScope(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for LocalScope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalScope").field(&self.0).finish()
    }
}

impl<T: Default> Default for LocalScope<T> {
    fn default() -> Self {
        LocalScope::new(T::default())
    }
}

impl<T> Deref for LocalScope<T> {
    type Target = RefCell<T>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Scope level whose assignment created a session arg, and the assignment
/// count it was given.
#[derive(Clone, Debug)]
pub(crate) struct ArgOrigin {
    pub(crate) epoch: u64,
    pub(crate) level: LocalScope<Scope>,
}

/// One level of bindings.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    bindings: FxHashMap<Name, Binding>,
    parent: Option<LocalScope<Scope>>,
}

#[derive(Clone, Debug)]
struct Binding {
    value: Value,
    mutability: Mutability,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn with_parent(parent: LocalScope<Scope>) -> Self {
        Scope {
            bindings: FxHashMap::default(),
            parent: Some(parent),
        }
    }

    /// Define in this level, shadowing any outer binding.
    #[inline]
    pub fn define(&mut self, name: Name, value: Value, mutability: Mutability) {
        self.bindings.insert(name, Binding { value, mutability });
    }

    #[inline]
    pub fn lookup(&self, name: Name) -> Option<Value> {
        if let Some(binding) = self.bindings.get(&name) {
            return Some(binding.value.clone());
        }
        if let Some(parent) = &self.parent {
            return parent.borrow().lookup(name);
        }
        None
    }

    /// Update the nearest level that binds `name`.
    pub fn assign(&mut self, name: Name, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.bindings.get_mut(&name) {
            if !binding.mutability.is_mutable() {
                return Err(AssignError::Immutable);
            }
            binding.value = value;
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            return parent.borrow_mut().assign(name, value);
        }
        Err(AssignError::Undefined)
    }

    /// Bindings of this level only.
    pub fn local_bindings(&self) -> impl Iterator<Item = (Name, &Value)> {
        self.bindings.iter().map(|(name, b)| (*name, &b.value))
    }
}

/// Whether `ancestor` is `level` or one of its parents.
fn chain_contains(level: &LocalScope<Scope>, ancestor: &LocalScope<Scope>) -> bool {
    let mut current = Some(level.clone());
    while let Some(next) = current {
        if LocalScope::ptr_eq(&next, ancestor) {
            return true;
        }
        current = next.borrow().parent.clone();
    }
    false
}

/// Binding environment for one evaluation.
#[derive(Clone)]
pub struct ScopeContext {
    session: RenderSession,
    level: LocalScope<Scope>,
    output: OutputStream,
    /// Session assignment count when this scope was created.
    created: u64,
}

impl ScopeContext {
    /// Root scope of a render.
    pub fn new(session: RenderSession, output: OutputStream) -> Self {
        ScopeContext {
            created: session.assignments(),
            session,
            level: LocalScope::new(Scope::new()),
            output,
        }
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    pub fn context(&self) -> &ScriptContext {
        self.session.context()
    }

    pub fn output(&self) -> &OutputStream {
        &self.output
    }

    /// Child scope with a fresh binding level, writing to the same stream.
    #[must_use]
    pub fn fork(&self) -> ScopeContext {
        ScopeContext {
            session: self.session.clone(),
            level: LocalScope::new(Scope::with_parent(self.level.clone())),
            output: self.output.clone(),
            created: self.session.assignments(),
        }
    }

    /// Child scope with `bindings` defined in its fresh level.
    #[must_use]
    pub fn fork_with(&self, bindings: impl IntoIterator<Item = (Name, Value)>) -> ScopeContext {
        let child = self.fork();
        {
            let mut level = child.level.borrow_mut();
            for (name, value) in bindings {
                level.define(name, value, Mutability::Mutable);
            }
        }
        child
    }

    /// Same bindings, different stream.
    #[must_use]
    pub fn with_output(&self, output: OutputStream) -> ScopeContext {
        ScopeContext {
            session: self.session.clone(),
            level: self.level.clone(),
            output,
            created: self.created,
        }
    }

    pub fn define(&self, name: Name, value: Value) {
        self.level
            .borrow_mut()
            .define(name, value, Mutability::Mutable);
    }

    pub fn define_with(&self, name: Name, value: Value, mutability: Mutability) {
        self.level.borrow_mut().define(name, value, mutability);
    }

    /// Scope chain only.
    pub fn lookup_local(&self, name: Name) -> Option<Value> {
        self.level.borrow().lookup(name)
    }

    /// Value bound to `name` anywhere in the argument chain, without falling
    /// back to registered methods.
    pub fn lookup_binding(&self, name: Name) -> Option<Value> {
        self.lookup_local(name).or_else(|| {
            if self.hides_assigned_arg(name) {
                self.session.lookup_outer_arg(name)
            } else {
                self.session.lookup_arg(name)
            }
        })
    }

    /// An arg created by assignment is hidden from scopes that existed
    /// before it unless they enclose the assigning scope.
    fn hides_assigned_arg(&self, name: Name) -> bool {
        let Some(origin) = self.session.arg_origin(name) else {
            return false;
        };
        self.created < origin.epoch && !chain_contains(&origin.level, &self.level)
    }

    /// Full identifier resolution; unresolved names are `null`.
    pub fn resolve(&self, name: Name) -> Result<Value, EvalError> {
        if let Some(value) = self.lookup_binding(name) {
            return Ok(value);
        }
        self.session.resolve_method_binding(self, name)
    }

    /// Update the nearest scope level binding `name`, otherwise create it in
    /// the session args.
    pub fn assign(&self, name: Name, value: Value) -> Result<(), EvalError> {
        let result = self.level.borrow_mut().assign(name, value.clone());
        match result {
            Ok(()) => Ok(()),
            Err(AssignError::Undefined) => {
                self.session.assign_arg(name, value, self.level.clone());
                Ok(())
            }
            Err(AssignError::Immutable) => Err(binding_failure(
                name,
                format!("cannot assign to constant '{name}'"),
            )),
        }
    }

    pub fn write(&self, text: &str) {
        self.output.write_str(text);
    }

    /// Write a value the way a variable fragment renders it.
    pub fn write_value(&self, value: &Value) {
        match value {
            Value::Null | Value::Signal(_) => {}
            other => self.output.write_str(&other.to_string()),
        }
    }
}

impl fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("level", &self.level)
            .field("output_len", &self.output.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
