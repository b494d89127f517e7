#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::RenderLimits;
use crate::page::MemoryPages;
use crate::test_helpers;
use pretty_assertions::assert_eq;
use quill_value::EvalErrorKind;

fn session_for(ctx: &ScriptContext, source: &str) -> SessionBuilder {
    let page = Arc::new(ctx.parse_page("page", source).unwrap());
    RenderSession::builder(ctx.clone(), page)
}

fn constant(label: &str, value: i64) -> ScriptMethods {
    ScriptMethods::new(label).filter1("pick", move |_| Ok(Value::Int(value)))
}

#[test]
fn test_session_methods_scanned_before_context_methods() {
    let ctx = ScriptContext::builder().methods(constant("ctx", 1)).build();
    let out = session_for(&ctx, "{{ 0 | pick }}")
        .methods(constant("session", 2))
        .build()
        .render_to_string()
        .unwrap();
    assert_eq!(out, "2");
}

#[test]
fn test_plain_filter_beats_session_context_filter() {
    let ctx = ScriptContext::builder().methods(constant("ctx", 1)).build();
    let session = ScriptMethods::new("session").context_filter("pick", 1, |_, _| Ok(Value::Int(2)));
    let out = session_for(&ctx, "{{ 0 | pick }}")
        .methods(session)
        .build()
        .render_to_string()
        .unwrap();
    assert_eq!(out, "1");
}

#[test]
fn test_excluded_filter_is_hidden() {
    let ctx = test_helpers::context();
    let err = session_for(&ctx, "{{ 'a' | upper }}")
        .exclude_filter("upper")
        .build()
        .render_to_string()
        .unwrap_err();
    match err.kind {
        EvalErrorKind::Dispatch { name, .. } => assert_eq!(name, "upper"),
        other => panic!("expected dispatch error, got {other:?}"),
    }
}

#[test]
fn test_missing_filter_lists_candidates() {
    let err = test_helpers::try_render("{{ 'a' | uper }}").unwrap_err();
    match err.kind {
        EvalErrorKind::Dispatch { candidates, .. } => {
            assert!(candidates.contains(&"upper(1)".to_owned()), "{candidates:?}");
        }
        other => panic!("expected dispatch error, got {other:?}"),
    }
}

#[test]
fn test_evaluation_quota() {
    let ctx = ScriptContext::builder()
        .limits(RenderLimits::default().with_max_evaluations(5))
        .build();
    let err = ctx
        .render_source("{{ 1 + 2 + 3 + 4 + 5 }}", Vec::new())
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::QuotaExceeded {
            quota: Quota::Evaluations,
            limit: 5
        }
    );
}

#[test]
fn test_iteration_quota() {
    let ctx = ScriptContext::builder()
        .limits(RenderLimits::default().with_max_quota(3))
        .build();
    assert_eq!(ctx.render_source("{{ range(3) | join }}", Vec::new()).unwrap(), "0,1,2");
    let err = ctx.render_source("{{ range(4) | join }}", Vec::new()).unwrap_err();
    assert!(
        matches!(err.kind, EvalErrorKind::QuotaExceeded { quota: Quota::Iterations, .. }),
        "{err:?}"
    );
}

#[test]
fn test_enter_page_enforces_stack_depth() {
    let ctx = ScriptContext::builder()
        .limits(RenderLimits::default().with_max_stack_depth(2))
        .build();
    let session = test_helpers::session(&ctx);
    let outer = session.enter_page("a").unwrap();
    let inner = session.enter_page("b").unwrap();
    assert_eq!(session.stack_depth(), 2);
    assert!(session.enter_page("c").is_err());
    drop(inner);
    assert_eq!(session.stack_depth(), 1);
    drop(outer);
    assert_eq!(session.stack_depth(), 0);
}

#[test]
fn test_cancelled_session_stops_rendering() {
    let ctx = test_helpers::context();
    let token = CancellationToken::new();
    token.cancel();
    let err = session_for(&ctx, "text")
        .cancellation(token)
        .build()
        .render_to_string()
        .unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::Cancelled);
}

#[test]
fn test_halt_stops_remaining_fragments() {
    assert_eq!(test_helpers::render("a{{ halt }}b{{ 1 }}"), "a");
}

#[test]
fn test_return_value_halts() {
    let ctx = test_helpers::context();
    let session = session_for(&ctx, "x{{ 42 | return }}y").no_layout().build();
    assert_eq!(session.render_to_string().unwrap(), "x");
    assert_eq!(session.return_value(), Some(Value::Int(42)));
    assert!(session.flags().contains(RenderFlags::HALT_EXECUTION));
}

#[test]
fn test_layout_choices() {
    let ctx = ScriptContext::builder()
        .pages(
            MemoryPages::new()
                .with_page("_layout", "[{{ page }}]")
                .with_page("alt", "<{{ page }}>")
                .with_page("fm", "<!--\nlayout: alt\ntitle: Front\n-->\n{{ title }}"),
        )
        .build();

    let render = |builder: SessionBuilder| builder.build().render_to_string().unwrap();
    assert_eq!(render(session_for(&ctx, "p")), "[p]");
    assert_eq!(render(session_for(&ctx, "p").layout("alt")), "<p>");
    assert_eq!(render(session_for(&ctx, "p").no_layout()), "p");
    assert_eq!(ctx.render("fm", Vec::new()).unwrap(), "<Front>");

    let err = session_for(&ctx, "p")
        .layout("missing")
        .build()
        .render_to_string()
        .unwrap_err();
    assert!(err.message().contains("missing"), "{err}");
}

#[test]
fn test_layout_args_are_visible_to_the_page() {
    let ctx = ScriptContext::builder()
        .pages(MemoryPages::new().with_page("_layout", "<!--\nsite: Quill\n-->\n{{ page }}"))
        .build();
    let out = session_for(&ctx, "{{ site }}").build().render_to_string().unwrap();
    assert_eq!(out, "Quill");
}

#[test]
fn test_render_to_writer_applies_output_transformers() {
    let ctx = ScriptContext::builder()
        .output_transformer(|bytes| Ok(bytes.to_ascii_uppercase()))
        .build();
    let session = session_for(&ctx, "hello {{ 'you' }}")
        .output_transformer(|mut bytes| {
            bytes.push(b'!');
            Ok(bytes)
        })
        .build();
    let mut sink = Vec::new();
    session.render_to(&mut sink).unwrap();
    assert_eq!(String::from_utf8(sink).unwrap(), "HELLO YOU!");
}

#[test]
fn test_uncaught_error_is_recorded() {
    let ctx = test_helpers::context();
    let session = session_for(&ctx, "{{ 'boom' | throw }}").build();
    let err = session.render_to_string().unwrap_err();
    assert_eq!(session.last_error(), Some(err));
    let trace = session.last_error_stack_trace().unwrap();
    assert!(trace.contains("page 'page'"), "{trace}");
}

#[test]
fn test_native_runtime_errors_become_native_faults() {
    let err = test_helpers::try_render("{{ 'abc' | substring(-1) }}").unwrap_err();
    match err.kind {
        EvalErrorKind::NativeFault { function, .. } => assert_eq!(function, "substring"),
        other => panic!("expected native fault, got {other:?}"),
    }
}

#[test]
fn test_skip_executing_filters_after_error() {
    let ctx = ScriptContext::builder()
        .skip_executing_filters_if_error(true)
        .assign_exceptions_to("err")
        .build();
    let out = ctx
        .render_source("{{ 'x' | throw }}[{{ 'a' | upper }}][{{ 'b' }}]", Vec::new())
        .unwrap();
    assert_eq!(out, "[][b]");
}

#[test]
fn test_extension_is_created_once_per_session() {
    let ctx = test_helpers::context();
    let session = test_helpers::session(&ctx);
    let first = session.extension(|| std::cell::Cell::new(1_u32));
    first.set(7);
    let again = session.extension(|| std::cell::Cell::new(1_u32));
    assert_eq!(again.get(), 7);
    assert!(Rc::ptr_eq(&first, &again));

    let other = test_helpers::session(&ctx);
    assert_eq!(other.extension(|| std::cell::Cell::new(1_u32)).get(), 1);
}
