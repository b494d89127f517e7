#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use quill_eval::{MemoryPages, RenderLimits, ScriptContext, ScriptContextBuilder};
use quill_value::{EvalErrorKind, NativeFn, Quota, Value};

use crate::{LispContextExt, LispLanguage};

fn builder() -> ScriptContextBuilder {
    ScriptContext::builder().language(LispLanguage::new().unwrap())
}

fn context() -> ScriptContext {
    builder().build()
}

fn point(args: &[Value]) -> Result<Value, quill_value::EvalError> {
    Ok(Value::map_from([
        ("x", args.first().cloned().unwrap_or(Value::Null)),
        ("y", args.get(1).cloned().unwrap_or(Value::Null)),
    ]))
}

#[test]
fn test_single_form_is_written_bare() {
    let out = context()
        .render_lisp("(progn (defn sq [x] (* x x)) (sq 5))", vec![])
        .unwrap();
    assert_eq!(out, "25");
}

#[test]
fn test_multiple_forms_are_separated_by_newlines() {
    let out = context()
        .render_lisp("(defn sq [x] (* x x)) (sq 5) (sq 6) nil", vec![])
        .unwrap();
    assert_eq!(out, "25\n36\n");
}

#[test]
fn test_lists_are_printed_unreadably() {
    let out = context().render_lisp("(list 1 \"a\" 'b)", vec![]).unwrap();
    assert_eq!(out, "(1 a b)");
}

#[test]
fn test_lisp_block_inside_template() {
    let out = context()
        .render_source("<p>{{#lisp}}(+ 1 2){{/lisp}}</p>", vec![])
        .unwrap();
    assert_eq!(out, "<p>3</p>");
}

#[test]
fn test_quiet_modifier_discards_output() {
    let ctx = context();
    for modifier in ["q", "quiet", "silent"] {
        let source = format!("{{{{#lisp {modifier}}}}}(print \"x\") 5{{{{/lisp}}}}after");
        assert_eq!(ctx.render_source(&source, vec![]).unwrap(), "after");
    }
}

#[test]
fn test_unknown_modifier_is_a_syntax_error() {
    let err = context()
        .render_source("{{#lisp loud}}1{{/lisp}}", vec![])
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Syntax { .. }), "{err:?}");
    assert!(err.message().contains("unknown modifier 'loud'"), "{err}");
}

#[test]
fn test_blocks_share_one_interpreter_per_render() {
    let ctx = context();
    let out = ctx
        .render_source("{{#lisp}}(setq x 2){{/lisp}}-{{#lisp}}(* x 3){{/lisp}}", vec![])
        .unwrap();
    assert_eq!(out, "2-6");

    let err = ctx.render_source("{{#lisp}}x{{/lisp}}", vec![]).unwrap_err();
    assert!(err.message().contains("void variable: x"), "{err}");
}

#[test]
fn test_export_binds_into_the_template() {
    let out = context()
        .render_source("{{#lisp}}(export total (+ 1 2)){{/lisp}}{{ total }}", vec![])
        .unwrap();
    assert_eq!(out, "3");
}

#[test]
fn test_template_args_and_filters_resolve_from_lisp() {
    let ctx = context();
    let args = || vec![("name", Value::string("ann"))];
    assert_eq!(ctx.render_lisp("(upper name)", args()).unwrap(), "ANN");
    assert_eq!(ctx.render_lisp("(/upper name)", args()).unwrap(), "ANN");
    assert_eq!(ctx.render_lisp("(add 1 2)", vec![]).unwrap(), "3");
}

#[test]
fn test_getter_and_member_sigils() {
    let ctx = context();
    let person = Value::map_from([("name", Value::string("Bo"))]);
    let items = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(
        ctx.render_lisp("(:name person)", vec![("person", person)]).unwrap(),
        "Bo"
    );
    assert_eq!(
        ctx.render_lisp("(.count items)", vec![("items", items)]).unwrap(),
        "3"
    );
}

#[test]
fn test_host_functions_and_constructors() {
    let ctx = builder()
        .host_function(
            "Math/max",
            NativeFn::binary(|a, b| {
                let less = quill_eval::compare(a, b).is_some_and(std::cmp::Ordering::is_lt);
                Ok(if less { b.clone() } else { a.clone() })
            }),
        )
        .host_constructor("Point", NativeFn::constructor(point))
        .build();
    assert_eq!(ctx.render_lisp("(Math/max 1 7)", vec![]).unwrap(), "7");
    assert_eq!(ctx.render_lisp("(:x (Point. 1 2))", vec![]).unwrap(), "1");
    assert_eq!(ctx.render_lisp("(:y (new \"Point\" 3 4))", vec![]).unwrap(), "4");
    assert_eq!(ctx.render_lisp("(:y (new 'Point 3 4))", vec![]).unwrap(), "4");

    let err = ctx.render_lisp("(Shape. 1)", vec![]).unwrap_err();
    assert!(err.message().contains("type 'Shape' not found"), "{err}");
}

#[test]
fn test_unknown_function_with_scope() {
    let err = context().render_lisp("(no-such-fn 1)", vec![]).unwrap_err();
    assert!(err.message().contains("no-such-fn"), "{err}");
}

#[test]
fn test_evaluation_quota_stops_infinite_loop() {
    let ctx = builder()
        .limits(RenderLimits::default().with_max_evaluations(1000))
        .build();
    let err = ctx.render_lisp("(while t nil)", vec![]).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::Evaluations,
            limit: 1000
        }
    );
    assert!(err.is_fatal());
}

#[test]
fn test_lisp_depth_quota_comes_from_limits() {
    let ctx = builder()
        .limits(RenderLimits::default().with_max_lisp_depth(50))
        .build();
    let err = ctx
        .render_lisp("(defun f (n) (+ 1 (f n))) (f 1)", vec![])
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::LispDepth,
            limit: 50
        }
    );
}

#[test]
fn test_quota_is_not_captured() {
    let ctx = builder()
        .limits(RenderLimits::default().with_max_evaluations(100))
        .assign_exceptions_to("err")
        .build();
    let err = ctx
        .render_source("{{#lisp}}(while t nil){{/lisp}}", vec![])
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_lisp_errors_are_captured_like_filter_errors() {
    let ctx = builder().assign_exceptions_to("err").build();
    let out = ctx
        .render_source("a{{#lisp}}(error \"boom\"){{/lisp}}b|{{ err.message }}", vec![])
        .unwrap();
    assert_eq!(out, "ab|boom");
}

#[test]
fn test_return_halts_the_render() {
    let out = context()
        .render_source("a{{#lisp}}(return 1) 2{{/lisp}}b", vec![])
        .unwrap();
    assert_eq!(out, "a");
}

#[test]
fn test_evaluate_lisp() {
    let ctx = context();
    assert_eq!(ctx.evaluate_lisp("(+ 1 2)", vec![]).unwrap(), Value::Int(3));
    assert_eq!(
        ctx.evaluate_lisp("(return (list 1 2)) 5", vec![]).unwrap(),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        ctx.evaluate_lisp("(* n 2)", vec![("n", Value::Int(21))]).unwrap(),
        Value::Int(42)
    );
}

#[test]
fn test_lisp_must_be_registered() {
    let ctx = ScriptContext::builder().build();
    let err = ctx.render_lisp("1", vec![]).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NotImplemented { .. }), "{err:?}");
    assert!(ctx.evaluate_lisp("1", vec![]).is_err());
}

#[test]
fn test_with_import_extends_every_interpreter() {
    let language = LispLanguage::new()
        .unwrap()
        .with_import("(defun greet (who) (str \"hi \" who))")
        .unwrap();
    let ctx = ScriptContext::builder().language(language).build();
    assert_eq!(ctx.render_lisp("(greet \"bo\")", vec![]).unwrap(), "hi bo");
    assert_eq!(ctx.render_lisp("(greet \"al\")", vec![]).unwrap(), "hi al");
}

#[test]
fn test_load_reads_pages_once() {
    let ctx = builder()
        .pages(MemoryPages::new().with_page("lib.l", "(defun triple (x) (* 3 x))"))
        .build();
    assert_eq!(ctx.render_lisp("(load \"lib.l\") (triple 3)", vec![]).unwrap(), "9\n");
    assert_eq!(ctx.render_lisp("(load \"lib.l\") (triple 4)", vec![]).unwrap(), "12\n");

    let err = ctx.render_lisp("(load \"missing.l\")", vec![]).unwrap_err();
    assert!(err.message().contains("file not found"), "{err}");
}

#[test]
fn test_concurrent_renders_share_the_context() {
    let ctx = Arc::new(context());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let source = format!("(setq s {i}) (dotimes (n 100) (incf s n)) s");
                ctx.render_lisp(&source, vec![]).unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("{i}\n{}\n", 4950 + i));
    }
}
