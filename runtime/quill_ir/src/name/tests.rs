use super::*;

#[test]
fn test_name_layout() {
    let name = Name::new(5, 1000);
    assert_eq!(name.shard(), 5);
    assert_eq!(name.local(), 1000);
}

#[test]
fn test_global_round_trip() {
    let name = Name::intern("assignError");
    assert_eq!(name.as_str(), "assignError");
    assert_eq!(Name::from("assignError"), name);
}

#[test]
fn test_name_orders_by_text() {
    let b = Name::intern("beta");
    let a = Name::intern("alpha");
    assert!(a < b);
    let mut names = vec![b, a];
    names.sort();
    assert_eq!(names, vec![a, b]);
}

#[test]
fn test_empty_name() {
    assert_eq!(Name::intern(""), Name::EMPTY);
    assert_eq!(Name::EMPTY.as_str(), "");
}
