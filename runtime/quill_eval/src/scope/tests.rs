#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::test_helpers;
use pretty_assertions::assert_eq;
use quill_value::{EvalErrorKind, Signal};

fn name(s: &str) -> Name {
    Name::intern(s)
}

#[test]
fn test_scope_chain_lookup_and_shadowing() {
    let parent = LocalScope::new(Scope::new());
    parent
        .borrow_mut()
        .define(name("a"), Value::Int(1), Mutability::Mutable);
    let mut child = Scope::with_parent(parent.clone());
    assert_eq!(child.lookup(name("a")), Some(Value::Int(1)));

    child.define(name("a"), Value::Int(2), Mutability::Mutable);
    assert_eq!(child.lookup(name("a")), Some(Value::Int(2)));
    assert_eq!(parent.borrow().lookup(name("a")), Some(Value::Int(1)));
    assert_eq!(child.lookup(name("missing")), None);
}

#[test]
fn test_assign_updates_nearest_level() {
    let parent = LocalScope::new(Scope::new());
    parent
        .borrow_mut()
        .define(name("a"), Value::Int(1), Mutability::Mutable);
    let mut child = Scope::with_parent(parent.clone());

    child.assign(name("a"), Value::Int(5)).unwrap();
    assert_eq!(parent.borrow().lookup(name("a")), Some(Value::Int(5)));
    assert_eq!(child.local_bindings().count(), 0);
    assert_eq!(
        child.assign(name("nope"), Value::Null),
        Err(AssignError::Undefined)
    );
}

#[test]
fn test_immutable_binding_rejects_assignment() {
    let mut scope = Scope::new();
    scope.define(name("k"), Value::Int(1), Mutability::Immutable);
    assert_eq!(
        scope.assign(name("k"), Value::Int(2)),
        Err(AssignError::Immutable)
    );
    assert_eq!(scope.lookup(name("k")), Some(Value::Int(1)));
}

#[test]
fn test_fork_does_not_alias_parent_level() {
    let ctx = test_helpers::context();
    let root = test_helpers::scope(&ctx);
    root.define(name("x"), Value::Int(1));

    let child = root.fork();
    child.define(name("x"), Value::Int(2));
    child.define(name("y"), Value::Int(3));

    assert_eq!(root.lookup_local(name("x")), Some(Value::Int(1)));
    assert_eq!(root.lookup_local(name("y")), None);
    assert_eq!(child.lookup_local(name("x")), Some(Value::Int(2)));
}

#[test]
fn test_unbound_assignment_lands_in_session_args() {
    let ctx = test_helpers::context();
    let root = test_helpers::scope(&ctx);
    let child = root.fork_with([(name("local"), Value::Int(0))]);

    child.assign(name("fresh"), Value::Int(7)).unwrap();
    child.assign(name("local"), Value::Int(8)).unwrap();

    assert_eq!(root.session().arg("fresh"), Some(Value::Int(7)));
    assert_eq!(root.lookup_binding(name("fresh")), Some(Value::Int(7)));
    assert_eq!(root.lookup_local(name("local")), None);
    assert_eq!(child.lookup_local(name("local")), Some(Value::Int(8)));
}

#[test]
fn test_assignment_is_hidden_from_earlier_siblings() {
    let ctx = test_helpers::context();
    let root = test_helpers::scope(&ctx);
    let left = root.fork();
    let right = root.fork();

    left.assign(name("fresh"), Value::Int(1)).unwrap();

    assert_eq!(left.lookup_binding(name("fresh")), Some(Value::Int(1)));
    assert_eq!(root.lookup_binding(name("fresh")), Some(Value::Int(1)));
    assert_eq!(right.lookup_binding(name("fresh")), None);
    assert_eq!(right.resolve(name("fresh")).unwrap(), Value::Null);

    let later = root.fork();
    assert_eq!(later.lookup_binding(name("fresh")), Some(Value::Int(1)));
    assert_eq!(right.fork().lookup_binding(name("fresh")), Some(Value::Int(1)));
}

#[test]
fn test_session_set_arg_is_visible_to_every_scope() {
    let ctx = test_helpers::context();
    let root = test_helpers::scope(&ctx);
    let left = root.fork();
    let right = root.fork();

    left.assign(name("shared"), Value::Int(1)).unwrap();
    root.session().set_arg(name("shared"), Value::Int(2));
    assert_eq!(right.lookup_binding(name("shared")), Some(Value::Int(2)));
}

#[test]
fn test_const_assignment_is_binding_error() {
    let ctx = test_helpers::context();
    let scope = test_helpers::scope(&ctx);
    scope.define_with(name("c"), Value::Int(1), Mutability::Immutable);
    let err = scope.assign(name("c"), Value::Int(2)).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Binding { .. }), "{err:?}");
}

#[test]
fn test_resolve_falls_back_to_zero_arity_methods() {
    let ctx = ScriptContext::builder()
        .methods(crate::ScriptMethods::new("test").filter0("answer", || Ok(Value::Int(42))))
        .build();
    let scope = test_helpers::scope(&ctx);
    assert_eq!(scope.resolve(name("answer")).unwrap(), Value::Int(42));
    assert_eq!(scope.resolve(name("nothing")).unwrap(), Value::Null);

    scope.define(name("answer"), Value::Int(1));
    assert_eq!(scope.resolve(name("answer")).unwrap(), Value::Int(1));
}

#[test]
fn test_write_value_skips_null_and_signals() {
    let ctx = test_helpers::context();
    let scope = test_helpers::scope(&ctx);
    scope.write_value(&Value::Null);
    scope.write_value(&Value::Signal(Signal::Stop));
    scope.write_value(&Value::Int(3));
    scope.write(" items");
    assert_eq!(scope.output().take_string(), "3 items");
}

#[test]
fn test_with_output_shares_bindings() {
    let ctx = test_helpers::context();
    let scope = test_helpers::scope(&ctx);
    let sub = OutputStream::new();
    let redirected = scope.with_output(sub.clone());
    redirected.define(name("shared"), Value::Bool(true));
    redirected.write("captured");

    assert_eq!(scope.lookup_local(name("shared")), Some(Value::Bool(true)));
    assert!(scope.output().is_empty());
    assert_eq!(sub.take_string(), "captured");
}
