#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use quill_value::Value;

use super::*;

#[test]
fn test_list_builds_proper_list() {
    let list = Obj::list([Obj::int(1), Obj::int(2), Obj::int(3)]);
    assert_eq!(list.to_string(), "(1 2 3)");
    assert_eq!(list.car().to_string(), "1");
    assert_eq!(list.cdr().to_string(), "(2 3)");
    assert_eq!(list.to_vec().unwrap().len(), 3);
}

#[test]
fn test_car_and_cdr_of_atoms_are_nil() {
    assert!(Obj::Nil.car().is_nil());
    assert!(Obj::int(1).cdr().is_nil());
}

#[test]
fn test_to_vec_rejects_dotted_list() {
    let dotted = Obj::cons(Obj::int(1), Obj::int(2));
    let err = dotted.to_vec().unwrap_err();
    assert!(err.message().contains("proper list expected"), "{err}");
}

#[test]
fn test_truthiness() {
    assert!(!Obj::Nil.is_truthy());
    assert!(!Obj::Atom(Value::Bool(false)).is_truthy());
    assert!(Obj::int(0).is_truthy());
    assert!(Obj::str("").is_truthy());
    assert!(Obj::t().is_truthy());
}

#[test]
fn test_identity_and_eql() {
    let a = Obj::str("x");
    let b = Obj::str("x");
    assert!(a.is_identical(&a.clone()));
    assert!(!a.is_identical(&b));
    assert!(a.is_eql(&b));
    assert!(Obj::int(3).is_identical(&Obj::int(3)));

    let cell = Obj::cons(Obj::int(1), Obj::Nil);
    assert!(cell.is_identical(&cell.clone()));
    assert!(!cell.is_identical(&Obj::cons(Obj::int(1), Obj::Nil)));
}

#[test]
fn test_cells_share_mutation() {
    let list = Obj::list([Obj::int(1), Obj::int(2)]);
    let alias = list.clone();
    list.as_cell().unwrap().set_car(Obj::int(9));
    assert_eq!(alias.to_string(), "(9 2)");
}

#[test]
fn test_value_bridge() {
    assert!(Obj::from_value(Value::Null).is_nil());
    assert_eq!(Obj::Nil.to_value(), Value::Null);
    assert_eq!(Obj::t().to_value(), Value::Bool(true));

    let list = Obj::list([Obj::int(1), Obj::list([Obj::int(2)])]);
    assert_eq!(
        list.to_value(),
        Value::list(vec![Value::Int(1), Value::list(vec![Value::Int(2)])])
    );
}

#[test]
fn test_lisp_data_round_trips_through_host_values() {
    let sym = Obj::Sym(Sym::intern("hello"));
    let value = sym.to_value();
    assert!(matches!(value, Value::Object(_)));
    assert!(Obj::from_value(value).is_identical(&sym));

    let dotted = Obj::cons(Obj::int(1), Obj::int(2));
    let back = Obj::from_value(dotted.to_value());
    assert!(back.is_identical(&dotted));
}

#[test]
fn test_circular_list_converts_without_looping() {
    let list = Obj::list([Obj::int(1), Obj::int(2)]);
    let last = list.cdr();
    last.as_cell().unwrap().set_cdr(list.clone());
    assert!(list.to_vec().is_err());
    assert!(matches!(list.to_value(), Value::Object(_)));
}

#[test]
fn test_arity_packs_rest() {
    let arity = Arity::rest(1);
    let slots = arity
        .pack(vec![Obj::int(1), Obj::int(2), Obj::int(3)], &"f")
        .unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1].to_string(), "(2 3)");
    assert_eq!(arity.to_string(), "1+");

    let err = Arity::fixed(2).pack(vec![Obj::int(1)], &"g").unwrap_err();
    assert!(err.message().contains("arity not matched"), "{err}");
}

#[test]
fn test_env_reads_outer_frames() {
    let sym = Sym::intern("x");
    let outer = Env::default().push(Slots::from_vec(vec![Obj::int(1)]));
    let inner = outer.push(Slots::from_vec(vec![Obj::int(2)]));
    let local = Arg { level: 0, offset: 0, sym };
    let free = Arg { level: 1, offset: 0, sym };
    assert_eq!(inner.get(local).unwrap().to_string(), "2");
    assert_eq!(inner.get(free).unwrap().to_string(), "1");

    inner.set(free, Obj::int(5)).unwrap();
    assert_eq!(outer.get(local).unwrap().to_string(), "5");
    assert!(Env::default().get(local).is_err());
}

#[test]
fn test_host_ref_sigils() {
    assert_eq!(
        HostRef::classify("upper"),
        Some(HostRef::Method(Name::intern("upper")))
    );
    assert_eq!(
        HostRef::classify("/upper"),
        Some(HostRef::Method(Name::intern("upper")))
    );
    assert_eq!(HostRef::classify(":id"), Some(HostRef::Getter("id".into())));
    assert_eq!(HostRef::classify(".len"), Some(HostRef::Member("len".into())));
    assert_eq!(
        HostRef::classify("Math/max"),
        Some(HostRef::Function("Math/max".into()))
    );
    assert_eq!(
        HostRef::classify("Point."),
        Some(HostRef::Constructor("Point".into()))
    );
    assert_eq!(HostRef::classify("+"), None);
    assert_eq!(HostRef::classify("1st"), None);
}
