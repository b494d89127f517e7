#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::blocks::ScriptBlock;
use crate::page::MemoryPages;
use crate::scope::ScopeContext;
use pretty_assertions::assert_eq;
use quill_ir::BlockFragment;
use quill_value::EvalErrorKind;

fn site() -> ScriptContext {
    ScriptContext::builder()
        .pages(
            MemoryPages::new()
                .with_page("index", "Hello {{ name }}")
                .with_page("_layout", "<main>{{ page }}</main>")
                .with_page("/bare.html", "bare"),
        )
        .build()
}

#[test]
fn test_page_cache_returns_shared_parse() {
    let ctx = site();
    let first = ctx.page("index").unwrap().unwrap();
    let second = ctx.page("/index.html").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(ctx.page("missing").unwrap().is_none());
}

#[test]
fn test_render_applies_default_layout() {
    let ctx = site();
    let out = ctx.render("index", vec![("name", Value::from("Ada"))]).unwrap();
    assert_eq!(out, "<main>Hello Ada</main>");
    assert_eq!(ctx.render("bare", Vec::new()).unwrap(), "<main>bare</main>");
}

#[test]
fn test_render_missing_page_fails() {
    let err = site().render("nowhere", Vec::new()).unwrap_err();
    assert!(err.message().contains("nowhere"), "{err}");
}

#[test]
fn test_page_source_is_unparsed() {
    let ctx = site();
    assert_eq!(ctx.page_source("index").as_deref(), Some("Hello {{ name }}"));
    assert_eq!(ctx.page_source("other"), None);
}

#[test]
fn test_setters_are_compiled_once_per_type_and_expression() {
    let ctx = ScriptContext::builder().build();
    let src = "{{#code}}\nm.x = 1\nm.x += 2\nl[0] = 5\n{{/code}}{{ m.x }} {{ l[0] }}";
    for _ in 0..2 {
        let out = ctx
            .render_source(
                src,
                vec![
                    ("m", Value::map_from([("x", Value::Int(0))])),
                    ("l", Value::list(vec![Value::Int(0)])),
                ],
            )
            .unwrap();
        assert_eq!(out, "3 5");
    }
    assert_eq!(ctx.cached_setters(), 2);
}

#[test]
fn test_context_args_are_visible_to_every_render() {
    let ctx = ScriptContext::builder().arg("site", "quill").build();
    assert_eq!(ctx.render_source("{{ site }}", Vec::new()).unwrap(), "quill");
    let out = ctx
        .render_source("{{ site }}", vec![("site", Value::from("local"))])
        .unwrap();
    assert_eq!(out, "local");
}

#[test]
fn test_evaluate_prefers_return_value() {
    let ctx = ScriptContext::builder().build();
    assert_eq!(
        ctx.evaluate("ignored {{ 1 + 2 | return }} never", Vec::new()).unwrap(),
        Value::Int(3)
    );
    assert_eq!(
        ctx.evaluate("plain {{ 2 }}", Vec::new()).unwrap(),
        Value::from("plain 2")
    );
}

#[test]
fn test_evaluate_expression_with_args() {
    let ctx = ScriptContext::builder().build();
    let value = ctx
        .evaluate_expression("a * 2 + 1", vec![("a", Value::Int(4))])
        .unwrap();
    assert_eq!(value, Value::Int(9));
}

struct Shout;

impl ScriptBlock for Shout {
    fn name(&self) -> &str {
        "if"
    }

    fn write(&self, scope: &ScopeContext, _block: &BlockFragment) -> Result<(), EvalError> {
        scope.write("replaced");
        Ok(())
    }
}

#[test]
fn test_later_block_replaces_earlier() {
    let ctx = ScriptContext::builder().block(Shout).build();
    let out = ctx.render_source("{{#if true}}yes{{/if}}", Vec::new()).unwrap();
    assert_eq!(out, "replaced");
}

#[test]
fn test_without_defaults_has_no_filters() {
    let ctx = ScriptContext::builder().without_defaults().build();
    assert!(ctx.methods().is_empty());
    let err = ctx.render_source("{{ 1 | incr }}", Vec::new()).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Dispatch { .. }), "{err:?}");
}
