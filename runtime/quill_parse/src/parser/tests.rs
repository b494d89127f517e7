use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn parse(src: &str) -> Expr {
    match parse_expression(src) {
        Ok(expr) => expr,
        Err(err) => panic!("failed to parse {src:?}: {err}"),
    }
}

#[test]
fn test_precedence() {
    assert_eq!(
        parse("1 + 2 * 3"),
        Expr::binary(
            BinaryOp::Add,
            Expr::int(1),
            Expr::binary(BinaryOp::Mul, Expr::int(2), Expr::int(3))
        )
    );
    assert_eq!(parse("a || b && c").to_string(), "a || (b && c)");
    assert_eq!(parse("2 ** 3 ** 2").to_string(), "2 ** (3 ** 2)");
    assert_eq!(parse("a ?? b || c").to_string(), "a ?? (b || c)");
}

#[test]
fn test_pipe_desugars_to_calls() {
    assert_eq!(
        parse("3 |> f1 |> f2"),
        Expr::call(
            Expr::ident("f2"),
            vec![Expr::call(Expr::ident("f1"), vec![Expr::int(3)])]
        )
    );
    assert_eq!(parse("x |> add(1)").to_string(), "add(x, 1)");
}

#[test]
fn test_conditional_is_right_associative() {
    assert_eq!(parse("a ? b : c ? d : e").to_string(), "a ? b : (c ? d : e)");
}

#[test]
fn test_member_index_call_chain() {
    assert_eq!(parse("a.b[0].c(1, ...xs)").to_string(), "a.b[0].c(1, ...xs)");
}

#[test]
fn test_assignment() {
    assert_eq!(
        parse("a.b += 2"),
        Expr::Assignment {
            target: Box::new(Expr::member(Expr::ident("a"), Expr::ident("b"), false)),
            op: AssignOp::Add,
            value: Box::new(Expr::int(2)),
        }
    );
    assert!(parse_expression("1 = 2").is_err());
}

#[test]
fn test_object_and_array_literals() {
    assert_eq!(
        parse("{ a: 1, 'b c': [1, 2], d }").to_string(),
        "{ a: 1, b c: [1, 2], d: d }"
    );
    assert_eq!(parse("[]"), Expr::Array(vec![]));
}

#[test]
fn test_negative_literal_folding() {
    assert_eq!(parse("-5"), Expr::int(-5));
    assert_eq!(
        parse("-x"),
        Expr::Unary {
            op: UnaryOp::Neg,
            arg: Box::new(Expr::ident("x"))
        }
    );
}

#[test]
fn test_declarations_and_statements() {
    let stmts = parse_statements("let a = 1, b; a = a + 1\nb = a;").unwrap_or_default();
    assert_eq!(stmts.len(), 3);
    assert_eq!(stmts[0].to_string(), "let a = 1, b");
    assert_eq!(stmts[2].to_string(), "b = a");
}

#[test]
fn test_variable_with_filters() {
    let var = match parse_variable(" name | upper | append('!') ") {
        Ok(var) => var,
        Err(err) => panic!("{err}"),
    };
    assert_eq!(var.binding, Some(Name::intern("name")));
    assert_eq!(var.filters.len(), 2);
    assert_eq!(var.filters[1].to_string(), "append('!')");
    assert_eq!(&*var.source, "name | upper | append('!')");
}

#[test]
fn test_whitespace_filter_argument() {
    let var = match parse_variable("x | append: and the rest, verbatim") {
        Ok(var) => var,
        Err(err) => panic!("{err}"),
    };
    assert_eq!(var.filters[0].args, vec![Expr::string("and the rest, verbatim")]);
}

#[test]
fn test_errors_have_spans() {
    let err = parse_expression("a + ").err();
    assert!(err.is_some_and(|e| e.span.start == 4));
    assert!(parse_expression("f(1 2)").is_err());
    assert!(parse_expression("(a").is_err());
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (0i64..1000).prop_map(Expr::int),
        "[a-z][a-z0-9]{0,4}".prop_filter("keyword", |s| !matches!(
            s.as_str(),
            "let" | "var" | "null" | "true" | "false" | "const"
        ))
        .prop_map(|s| Expr::ident(&s)),
        "[a-z ]{0,6}".prop_map(|s| Expr::string(&s)),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::binary(BinaryOp::Add, l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::binary(BinaryOp::Mul, l, r)),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(|(t, a, b)| Expr::Conditional {
                test: Box::new(t),
                then: Box::new(a),
                otherwise: Box::new(b),
            }),
            (inner.clone(), prop::collection::vec(inner, 0..3))
                .prop_map(|(f, args)| Expr::call(Expr::member(f, Expr::ident("m"), false), args)),
        ]
    })
}

proptest! {
    #[test]
    fn prop_printed_expression_reparses(expr in arb_expr()) {
        let printed = expr.to_string();
        prop_assert_eq!(parse_expression(&printed).ok(), Some(expr));
    }
}
