#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use quill_value::{EvalErrorKind, Quota};

use super::*;

fn interp() -> Interpreter {
    Interpreter::new().unwrap()
}

fn eval(source: &str) -> String {
    printer::to_string(&interp().eval_source(source).unwrap(), true)
}

fn eval_err(source: &str) -> EvalError {
    interp().eval_source(source).unwrap_err()
}

#[test]
fn test_self_evaluating() {
    assert_eq!(eval("1"), "1");
    assert_eq!(eval("\"s\""), "\"s\"");
    assert_eq!(eval("nil"), "nil");
    assert_eq!(eval("t"), "t");
}

#[test]
fn test_special_forms() {
    assert_eq!(eval("'(a b)"), "(a b)");
    assert_eq!(eval("(progn 1 2 3)"), "3");
    assert_eq!(eval("(progn)"), "nil");
    assert_eq!(eval("(cond (nil 1) (2 3))"), "3");
    assert_eq!(eval("(cond (nil 1) (5))"), "5");
    assert_eq!(eval("(cond (nil 1))"), "nil");
    assert_eq!(eval("(setq a 1 b (+ a 1)) (list a b)"), "(1 2)");
}

#[test]
fn test_defn_with_bracket_params() {
    assert_eq!(eval("(defn sq [x] (* x x)) (sq 5)"), "25");
}

#[test]
fn test_closures_capture_their_environment() {
    let source = "
        (defun make-counter ()
          (let ((n 0))
            (fn () (setq n (+ n 1)))))
        (setq c (make-counter))
        (c) (c)
        (c)";
    assert_eq!(eval(source), "3");
    assert_eq!(eval("(((lambda (x) (lambda (y) (+ x y))) 1) 2)"), "3");
}

#[test]
fn test_rest_parameters() {
    assert_eq!(eval("((lambda (a &rest b) b) 1 2 3)"), "(2 3)");
    assert_eq!(eval("((lambda (a &rest b) b) 1)"), "nil");
}

#[test]
fn test_quasiquote_evaluates() {
    assert_eq!(eval("`(1 ,(+ 1 1) ,@(list 3 4))"), "(1 2 3 4)");
    assert_eq!(eval("`(1 ,@'(2 3) 4)"), "(1 2 3 4)");
    assert_eq!(eval("(setq x 5) `(a (b ,x))"), "(a (b 5))");
}

#[test]
fn test_macros_expand_before_evaluation() {
    let source = "
        (defmacro swap (a b)
          (let ((tmp (gensym)))
            `(let ((,tmp ,a)) (setq ,a ,b) (setq ,b ,tmp))))
        (setq p 1 q 2)
        (swap p q)
        (list p q)";
    assert_eq!(eval(source), "(2 1)");
}

#[test]
fn test_nested_macro_is_rejected() {
    let err = eval_err("(defun f () (macro (x) x))");
    assert!(err.message().contains("nested macro"), "{err}");
}

#[test]
fn test_tail_calls_run_in_constant_depth() {
    let source = "
        (defun count-down (n) (if (= n 0) 'done (count-down (- n 1))))
        (count-down 20000)";
    assert_eq!(eval(source), "done");
}

#[test]
fn test_deep_recursion_hits_lisp_depth() {
    let mut interp = interp();
    interp.max_depth = 200;
    let err = interp
        .eval_source("(defun f (n) (+ 1 (f n))) (f 1)")
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::LispDepth,
            limit: 200
        }
    );
}

#[test]
fn test_self_expanding_macro_hits_evaluation_quota() {
    let mut interp = interp();
    interp.max_evaluations = 500;
    let err = interp.eval_source("(defmacro m () '(m)) (m)").unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::Evaluations,
            limit: 500
        }
    );
}

#[test]
fn test_endless_tail_call_hits_evaluation_quota() {
    let mut interp = interp();
    interp.max_evaluations = 500;
    let err = interp.eval_source("(defun spin () (spin)) (spin)").unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::Evaluations,
            ..
        }
    ));
}

#[test]
fn test_evaluation_budget_resets_per_top_level_form() {
    let mut interp = interp();
    interp.max_evaluations = 500;
    for _ in 0..10 {
        assert_eq!(
            interp.eval_source("(let ((s 0)) (dotimes (i 5) (incf s i)) s)").unwrap().to_string(),
            "10"
        );
    }
}

#[test]
fn test_void_variable() {
    let err = eval_err("undefined-thing");
    assert_eq!(err.kind.label(), "LispEvalError");
    assert_eq!(err.message(), "void variable: undefined-thing");
}

#[test]
fn test_undefined_function_without_scope() {
    let err = eval_err("(no-such-fn 1)");
    assert!(err.message().contains("undefined: no-such-fn"), "{err}");
}

#[test]
fn test_error_trace_is_bounded() {
    let err = eval_err("(defun f (n) (if (= n 0) (car 1 2) (+ 1 (f (- n 1))))) (f 30)");
    assert!(!err.trace.is_empty());
    assert!(err.trace.len() <= 10, "{}", err.trace.len());
    assert!(err.trace.iter().all(|frame| frame.len() <= MAX_FRAME_LEN + 3));
}

#[test]
fn test_builtin_runtime_errors_name_the_builtin() {
    let err = eval_err("(string-upcase 1)");
    assert_eq!(
        err.kind,
        EvalErrorKind::NativeFault {
            function: "string-upcase".into(),
            message: "string expected: 1".into(),
        }
    );
}

#[test]
fn test_setq_rejects_keywords_and_t() {
    assert!(eval_err("(setq t 1)").message().contains("not assignable"));
    assert!(eval_err("(setq quote 1)").message().contains("not a variable"));
}

#[test]
fn test_duplicate_and_bad_parameters() {
    assert!(eval_err("(lambda (a a) a)")
        .message()
        .contains("duplicated argument name"));
    assert!(eval_err("(lambda (&rest a &rest b) a)")
        .message()
        .contains("2nd rest"));
    assert!(eval_err("(lambda (1) 1)").message().contains("not a variable"));
}

#[test]
fn test_interpreters_are_isolated() {
    let mut a = interp();
    let mut b = interp();
    a.eval_source("(setq foo 1)").unwrap();
    b.eval_source("(setq foo 2)").unwrap();
    assert_eq!(a.global("foo").unwrap().to_string(), "1");
    assert_eq!(b.global("foo").unwrap().to_string(), "2");
    assert!(interp().global("foo").is_none());
}

#[test]
fn test_redefining_a_prelude_function_stays_local() {
    let mut a = interp();
    a.eval_source("(defun identity (x) 42)").unwrap();
    assert_eq!(a.eval_source("(identity 1)").unwrap().to_string(), "42");
    assert_eq!(interp().eval_source("(identity 1)").unwrap().to_string(), "1");
}

#[test]
fn test_output_without_scope_is_buffered() {
    let mut interp = interp();
    interp.eval_source("(print 1 \"a\") (terpri) (prin1 \"b\")").unwrap();
    assert_eq!(interp.take_output(), "1a\n\"b\"");
    assert_eq!(interp.take_output(), "");
}

#[test]
fn test_return_without_scope() {
    let mut interp = interp();
    interp.eval_source("(return (+ 1 2))").unwrap();
    assert_eq!(interp.return_value().unwrap().to_string(), "3");
}

#[test]
fn test_apply_calls_any_callable() {
    let mut interp = interp();
    let plus = interp.global("+").unwrap();
    let sum = interp.apply(&plus, vec![Obj::int(1), Obj::int(2)]).unwrap();
    assert_eq!(sum.to_string(), "3");

    let sq = interp.eval_source("(fn (x) (* x x))").unwrap();
    assert_eq!(interp.apply(&sq, vec![Obj::int(4)]).unwrap().to_string(), "16");
}
