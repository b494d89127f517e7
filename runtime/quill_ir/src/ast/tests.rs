use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_print_nested_binary() {
    let expr = Expr::binary(
        BinaryOp::Mul,
        Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::int(1)),
        Expr::ident("b"),
    );
    assert_eq!(expr.to_string(), "(a + 1) * b");
}

#[test]
fn test_print_member_and_call() {
    let expr = Expr::call(
        Expr::member(Expr::ident("user"), Expr::ident("name"), false),
        vec![Expr::string("it's"), Expr::null()],
    );
    assert_eq!(expr.to_string(), "user.name('it\\'s', null)");

    let index = Expr::member(Expr::ident("xs"), Expr::int(0), true);
    assert_eq!(index.to_string(), "xs[0]");
}

#[test]
fn test_print_conditional_and_declaration() {
    let expr = Expr::Conditional {
        test: Box::new(Expr::ident("ok")),
        then: Box::new(Expr::int(1)),
        otherwise: Box::new(Expr::int(2)),
    };
    assert_eq!(expr.to_string(), "ok ? 1 : 2");

    let decl = Expr::VariableDeclaration {
        kind: DeclKind::Let,
        bindings: vec![
            Declarator {
                name: Name::intern("a"),
                init: Some(Expr::int(1)),
            },
            Declarator {
                name: Name::intern("b"),
                init: None,
            },
        ],
    };
    assert_eq!(decl.to_string(), "let a = 1, b");
}

#[test]
fn test_print_object_literal() {
    let expr = Expr::Object(vec![Property {
        key: PropertyKey::Named(Name::intern("assignError")),
        value: Expr::string("ex"),
    }]);
    assert_eq!(expr.to_string(), "{ assignError: 'ex' }");
    assert_eq!(Expr::Object(vec![]).to_string(), "{}");
}

#[test]
fn test_structural_equality() {
    let a = Expr::call(Expr::ident("f"), vec![Expr::int(1)]);
    let b = Expr::call(Expr::ident("f"), vec![Expr::int(1)]);
    let c = Expr::call(Expr::ident("f"), vec![Expr::int(2)]);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_callee_name() {
    let member = Expr::member(Expr::ident("x"), Expr::ident("upper"), false);
    assert_eq!(member.callee_name(), Some(Name::intern("upper")));
    let computed = Expr::member(Expr::ident("x"), Expr::ident("k"), true);
    assert_eq!(computed.callee_name(), None);
}
