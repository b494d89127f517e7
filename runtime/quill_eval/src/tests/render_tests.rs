#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use quill_value::{EvalErrorKind, Quota, Value};

use crate::{
    CancellationToken, MemoryPages, RenderLimits, RenderSession, ScriptContext, ScriptMethods,
};

fn numbers(n: i64) -> Value {
    Value::list((1..=n).map(Value::Int).collect())
}

#[test]
fn test_self_referential_partial_hits_stack_ceiling() {
    let ctx = ScriptContext::builder()
        .pages(MemoryPages::new().with_page("loop", "x{{ 'loop' | partial }}"))
        .build();
    assert_eq!(ctx.limits().max_stack_depth, 25);

    let err = ctx.render("loop", Vec::new()).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::StackDepth,
            limit: 25
        }
    );
    assert!(!err.trace.is_empty());
}

#[test]
fn test_stack_ceiling_cannot_be_captured() {
    let ctx = ScriptContext::builder()
        .pages(MemoryPages::new().with_page(
            "loop",
            "{{ 'loop' | partial({ assignError: 'e' }) }}",
        ))
        .limits(RenderLimits::default().with_max_stack_depth(4))
        .assign_exceptions_to("fallback")
        .build();
    let err = ctx.render("loop", Vec::new()).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::QuotaExceeded { .. }), "{err:?}");
}

#[test]
fn test_nested_partials_within_ceiling() {
    let ctx = ScriptContext::builder()
        .pages(
            MemoryPages::new()
                .with_page("a", "a({{ 'b' | partial }})")
                .with_page("b", "b({{ 'c' | partial }})")
                .with_page("c", "c"),
        )
        .limits(RenderLimits::default().with_max_stack_depth(3))
        .build();
    assert_eq!(ctx.render("a", Vec::new()).unwrap(), "a(b(c))");
}

#[test]
fn test_captured_error_writes_nothing_and_rendering_continues() {
    let ctx = ScriptContext::builder().build();
    let out = ctx
        .render_source(
            "before[{{ 'boom' | throw({ assignError: 'err' }) }}]after:{{ err.message }}",
            Vec::new(),
        )
        .unwrap();
    assert_eq!(out, "before[]after:boom");
}

#[test]
fn test_default_capture_binding_and_stack_trace() {
    let ctx = ScriptContext::builder().assign_exceptions_to("ex").build();
    let out = ctx
        .render_source(
            "{{ 1 | div(0) }}{{ ex.kind }}|{{ exStackTrace | len | gt(0) }}",
            Vec::new(),
        )
        .unwrap();
    assert_eq!(out, "NativeFault|true");
}

#[test]
fn test_dispatch_errors_are_never_captured() {
    let ctx = ScriptContext::builder().assign_exceptions_to("ex").build();
    let err = ctx
        .render_source("{{ 1 | nosuchfilter({ catchError: 'e' }) }}", Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Dispatch { .. }), "{err:?}");
}

#[test]
fn test_statement_errors_use_the_capture_path() {
    let ctx = ScriptContext::builder().assign_exceptions_to("ex").build();
    let out = ctx
        .render_source("{{#code}}\nthrow('bad')\n{{/code}}{{ ex.message }}", Vec::new())
        .unwrap();
    assert_eq!(out, "bad");
    let err = ScriptContext::builder()
        .build()
        .render_source("{{#code}}\nthrow('bad')\n{{/code}}", Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Thrown { .. }), "{err:?}");
}

#[test]
fn test_assignment_scoping() {
    let ctx = ScriptContext::builder().build();
    let render = |src: &str| ctx.render_source(src, vec![("items", numbers(3))]).unwrap();

    // Updates the nearest binding, outside the loop.
    assert_eq!(
        render("{{#code}}\nvar total = 0\n{{/code}}{{#each items}}{{#code}}\ntotal += it\n{{/code}}{{/each}}{{ total }}"),
        "6"
    );
    // Declarations stay inside the iteration.
    assert_eq!(
        render("{{#each items}}{{#code}}\nlet seen = it\n{{/code}}{{/each}}[{{ seen }}]"),
        "[]"
    );
    // Unbound names land in the session args.
    assert_eq!(
        render("{{#each items}}{{#code}}\nlast = it\n{{/code}}{{/each}}{{ last }}"),
        "3"
    );
}

#[test]
fn test_layout_wraps_page_with_front_matter() {
    let ctx = ScriptContext::builder()
        .pages(
            MemoryPages::new()
                .with_page("_layout", "<title>{{ title }}</title>{{ page }}")
                .with_page("print", "<pre>{{ page }}</pre>")
                .with_page("post", "<!--\ntitle: Post\nlayout: print\n-->\nbody")
                .with_page("home", "<!--\ntitle: Home\n-->\nwelcome"),
        )
        .build();
    assert_eq!(
        ctx.render("home", Vec::new()).unwrap(),
        "<title>Home</title>welcome"
    );
    assert_eq!(ctx.render("post", Vec::new()).unwrap(), "<pre>body</pre>");
}

#[test]
fn test_context_block_then_transformer_chain() {
    let ctx = ScriptContext::builder()
        .pages(MemoryPages::new().with_page("snippet", "<b>{{ word }}</b>"))
        .filter_transformer("strip", |bytes| {
            Ok(bytes.into_iter().filter(|b| !matches!(b, b'<' | b'>')).collect())
        })
        .filter_transformer("shout", |bytes| Ok(bytes.to_ascii_uppercase()))
        .build();
    let out = ctx
        .render_source(
            "{{ 'snippet' | partial({ word: 'hi' }) | strip | shout }}!",
            Vec::new(),
        )
        .unwrap();
    assert_eq!(out, "BHI/B!");
}

#[test]
fn test_cancellation_mid_render() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let ctx = ScriptContext::builder()
        .methods(ScriptMethods::new("cancel").filter0("stopNow", move || {
            trigger.cancel();
            Ok(Value::Null)
        }))
        .build();
    let page = Arc::new(ctx.parse_page("page", "a{{ stopNow }}b").unwrap());
    let session = RenderSession::builder(ctx, page)
        .no_layout()
        .cancellation(token)
        .build();
    let err = session.render_to_string().unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::Cancelled);
}

#[test]
fn test_context_is_shared_across_threads() {
    let ctx = ScriptContext::builder()
        .pages(MemoryPages::new().with_page("sum", "{{#each items}}{{ it | mul(2) }},{{/each}}"))
        .build();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ctx = ctx.clone();
            thread::spawn(move || ctx.render("sum", vec![("items", numbers(i + 1))]).unwrap())
        })
        .collect();
    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, vec!["2,", "2,4,", "2,4,6,", "2,4,6,8,"]);
}

#[test]
fn test_session_args_do_not_leak_between_renders() {
    let ctx = ScriptContext::builder().build();
    assert_eq!(ctx.render_source("{{ 1 | assignTo('x') }}{{ x }}", Vec::new()).unwrap(), "1");
    assert_eq!(ctx.render_source("[{{ x }}]", Vec::new()).unwrap(), "[]");
}
