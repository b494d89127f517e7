#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use quill_value::{EvalErrorKind, Value};

use crate::interp::Interpreter;
use crate::printer::to_string;

fn eval(source: &str) -> String {
    let mut interp = Interpreter::new().unwrap();
    to_string(&interp.eval_source(source).unwrap(), true)
}

fn fault(source: &str) -> (String, String) {
    let mut interp = Interpreter::new().unwrap();
    match interp.eval_source(source).unwrap_err().kind {
        EvalErrorKind::NativeFault { function, message } => (function, message),
        other => panic!("expected a native fault, got {other:?}"),
    }
}

#[test]
fn test_cons_cells() {
    assert_eq!(eval("(cons 1 2)"), "(1 . 2)");
    assert_eq!(eval("(car '(1 2))"), "1");
    assert_eq!(eval("(cdr '(1 2))"), "(2)");
    assert_eq!(eval("(car nil)"), "nil");
    assert_eq!(eval("(let ((x (list 1 2))) (rplaca x 9) x)"), "(9 2)");
    assert_eq!(eval("(let ((x (list 1 2))) (rplacd x 3) x)"), "(1 . 3)");
}

#[test]
fn test_predicates() {
    assert_eq!(eval("(atom 1)"), "t");
    assert_eq!(eval("(atom '(1))"), "nil");
    assert_eq!(eval("(consp '(1))"), "t");
    assert_eq!(eval("(endp nil)"), "t");
    assert_eq!(eval("(endp '(1))"), "nil");
    assert_eq!(eval("(not nil)"), "t");
    assert_eq!(eval("(eq 'a 'a)"), "t");
    assert_eq!(eval("(eq \"a\" \"a\")"), "nil");
    assert_eq!(eval("(eql \"a\" \"a\")"), "t");
    assert_eq!(eval("(number? 1.5)"), "t");
    assert_eq!(eval("(string? \"x\")"), "t");
    assert_eq!(eval("(seq? \"x\")"), "t");
    assert_eq!(eval("(seq? 1)"), "nil");
}

#[test]
fn test_endp_rejects_non_lists() {
    let (function, message) = fault("(endp 1)");
    assert_eq!(function, "endp");
    assert_eq!(message, "list expected: 1");
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval("(+)"), "0");
    assert_eq!(eval("(+ 1 2 3)"), "6");
    assert_eq!(eval("(+ 1 2.5)"), "3.5");
    assert_eq!(eval("(- 5)"), "-5");
    assert_eq!(eval("(- 10 1 2)"), "7");
    assert_eq!(eval("(* 2 3 4)"), "24");
    assert_eq!(eval("(/ 12 2 3)"), "2");
    assert_eq!(eval("(/ 7 2)"), "3");
    assert_eq!(eval("(/ -7 2)"), "-3");
    assert_eq!(eval("(/ 7.0 2)"), "3.5");
    assert_eq!(eval("(% 7 3)"), "1");
    assert_eq!(eval("(mod -7 3)"), "2");
    assert_eq!(eval("(mod 7 -3)"), "-2");
    assert_eq!(eval("(< 1 2)"), "t");
    assert_eq!(eval("(< \"a\" \"b\")"), "t");
    assert_eq!(eval("(max 1 5 3)"), "5");
    assert_eq!(eval("(min 4 2 8)"), "2");
    assert_eq!(eval("(abs -3)"), "3");
    assert_eq!(eval("(expt 2 10)"), "1024");
    assert_eq!(eval("(isqrt 17)"), "4");
}

#[test]
fn test_division_by_zero_is_a_fault() {
    let (function, _) = fault("(/ 1 0)");
    assert_eq!(function, "/");
}

#[test]
fn test_rounding_returns_integers() {
    assert_eq!(eval("(truncate 2.7)"), "2");
    assert_eq!(eval("(truncate -2.7)"), "-2");
    assert_eq!(eval("(floor -2.5)"), "-3");
    assert_eq!(eval("(ceiling 2.1)"), "3");
    assert_eq!(eval("(round 2.5)"), "2");
    assert_eq!(eval("(round 3.5)"), "4");
    assert_eq!(eval("(floor 7 2)"), "3");
}

#[test]
fn test_bit_operations() {
    assert_eq!(eval("(logand 12 10)"), "8");
    assert_eq!(eval("(logior 12 10)"), "14");
    assert_eq!(eval("(logxor 12 10)"), "6");
    assert_eq!(eval("(logand)"), "-1");
}

#[test]
fn test_sequences() {
    assert_eq!(eval("(length '(1 2 3))"), "3");
    assert_eq!(eval("(length \"héllo\")"), "5");
    assert_eq!(eval("(nth '(a b c) 1)"), "b");
    assert_eq!(eval("(nth '(a b c) 5)"), "nil");
    assert_eq!(eval("(skip 1 '(1 2 3))"), "(2 3)");
    assert_eq!(eval("(take 2 '(1 2 3))"), "(1 2)");
    assert_eq!(eval("(map #(* % 2) '(1 2 3))"), "(2 4 6)");
    assert_eq!(eval("(sum '(1 2 3))"), "6");
    assert_eq!(eval("(remove 2 '(1 2 3 2))"), "(1 3)");
    assert_eq!(eval("(remove \"l\" \"hello\")"), "\"heo\"");
    assert_eq!(eval("(subseq \"hello\" 1 3)"), "\"el\"");
    assert_eq!(eval("(subseq '(1 2 3 4) 2)"), "(3 4)");
    assert_eq!(eval("(apply + '(1 2 3))"), "6");
}

#[test]
fn test_host_collections() {
    let mut interp = Interpreter::new().unwrap();
    let list = interp.eval_source("(to-list '(1 2 3))").unwrap();
    assert_eq!(
        list.to_value(),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    interp.define("xs", list);
    assert_eq!(
        interp.eval_source("(map #(+ % 1) xs)").unwrap().to_value(),
        Value::list(vec![Value::Int(2), Value::Int(3), Value::Int(4)])
    );
    assert_eq!(to_string(&interp.eval_source("(to-cons xs)").unwrap(), true), "(1 2 3)");
    assert_eq!(to_string(&interp.eval_source("(count xs)").unwrap(), true), "3");
}

#[test]
fn test_map_literal_builds_host_map() {
    let mut interp = Interpreter::new().unwrap();
    let map = interp.eval_source("{ :a 1 \"b\" (+ 1 1) }").unwrap().to_value();
    assert_eq!(
        map,
        Value::map_from([("a", Value::Int(1)), ("b", Value::Int(2))])
    );
}

#[test]
fn test_strings() {
    assert_eq!(eval("(str \"a\" 1 'b)"), "\"a1b\"");
    assert_eq!(eval("(string nil)"), "\"\"");
    assert_eq!(eval("(string 12)"), "\"12\"");
    assert_eq!(eval("(string-upcase \"abc\")"), "\"ABC\"");
    assert_eq!(eval("(string-downcase nil)"), "\"\"");
    assert_eq!(eval("(upper-case \"x\")"), "\"X\"");
}

#[test]
fn test_symbols() {
    assert_eq!(eval("(symbol-name 'abc)"), "\"abc\"");
    assert_eq!(eval("(eq (intern \"abc\") 'abc)"), "t");
    assert_eq!(eval("(eq (make-symbol \"abc\") 'abc)"), "nil");
    assert_eq!(eval("(make-symbol \"abc\")"), "#:abc");
}

#[test]
fn test_gensym_counts_up() {
    let mut interp = Interpreter::new().unwrap();
    let first = interp.eval_source("(gensym)").unwrap();
    let second = interp.eval_source("(gensym)").unwrap();
    let counter = |sym: &crate::obj::Obj| {
        sym.to_string()
            .strip_prefix("#:G")
            .and_then(|n| n.parse::<i64>().ok())
            .unwrap()
    };
    assert_eq!(counter(&second), counter(&first) + 1);
    assert!(!first.is_identical(&second));
    assert!(!first.as_sym().unwrap().is_interned());
}

#[test]
fn test_error_raises_lisp_error() {
    let mut interp = Interpreter::new().unwrap();
    let err = interp.eval_source("(error \"boom\")").unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::Lisp {
            message: "boom".into()
        }
    );
}

#[test]
fn test_debug_lists_globals() {
    let mut interp = Interpreter::new().unwrap();
    let names = interp.eval_source("(debug)").unwrap().to_vec().unwrap();
    assert!(names.iter().any(|name| name.to_string() == "car"));
    assert!(names.iter().any(|name| name.to_string() == "defun"));
}

#[test]
fn test_version_is_defined() {
    assert_eq!(eval("(cadr *version*)"), "\"quill-lisp\"");
}
