#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::page::MemoryPages;
use crate::test_helpers::{eval, render, try_render};
use crate::ScriptContext;
use pretty_assertions::assert_eq;
use quill_value::EvalErrorKind;

#[test]
fn test_arithmetic_filters() {
    assert_eq!(render("{{ 1 | add(2) | mul(3) | sub(1) }}"), "8");
    assert_eq!(render("{{ 7 | div(2) }} {{ 7 | mod(4) }} {{ 2 | pow(10) }}"), "3 3 1024");
    assert_eq!(render("{{ 7.0 | div(2) }} {{ 7 / 2 }}"), "3.5 3");
    assert_eq!(render("{{ 1 | incr }} {{ 1 | decr }} {{ 5 | incrBy(5) }}"), "2 0 10");
}

#[test]
fn test_comparison_filters() {
    assert_eq!(eval("gt(2, 1)"), Value::Bool(true));
    assert_eq!(eval("lte(2, 1)"), Value::Bool(false));
    assert_eq!(eval("eq(1, '1')"), Value::Bool(true));
    assert_eq!(eval("not(0)"), Value::Bool(true));
    assert_eq!(eval("isNull(null)"), Value::Bool(true));
    assert_eq!(eval("typeName([])"), Value::from("list"));
}

#[test]
fn test_text_filters() {
    assert_eq!(render("{{ ' Quill ' | trim | upper }}"), "QUILL");
    assert_eq!(render("{{ 'ab' | append('cd') | len }}"), "4");
    assert_eq!(render("{{ [1, 2, 3] | join }} {{ [1, 2] | join(' + ') }}"), "1,2,3 1 + 2");
    assert_eq!(render("{{ 'template' | substring(2, 3) }}"), "mpl");
}

#[test]
fn test_collection_filters() {
    assert_eq!(eval("first([4, 5])"), Value::Int(4));
    assert_eq!(eval("last([4, 5])"), Value::Int(5));
    assert_eq!(eval("first(null)"), Value::Null);
    assert_eq!(eval("count({ a: 1 })"), Value::Int(1));
    assert_eq!(render("{{ [1, 2, 3] | reverse }} {{ 'abc' | reverse }}"), "[3,2,1] cba");
    assert_eq!(render("{{ range(2, 3) }}"), "[2,3,4]");
}

#[test]
fn test_end_stops_the_chain() {
    assert_eq!(render("[{{ 'x' | end | upper }}]"), "[]");
    assert_eq!(render("[{{ 'x' | ignore }}]"), "[]");
}

#[test]
fn test_default_filter() {
    assert_eq!(render("{{ missing | default('n/a') }}"), "n/a");
    assert_eq!(render("{{ '' | default('empty') }}"), "empty");
    assert_eq!(render("{{ 0 | default(1) }}"), "0");
}

#[test]
fn test_assign_to_session_args() {
    assert_eq!(render("{{ 5 | assignTo('n') }}{{ n + 1 }}"), "6");
    assert_eq!(render("{{ 'v' | to('x') }}{{ assign('y', 2) }}{{ x }}{{ y }}"), "v2");
    let err = try_render("{{ 1 | assignTo('') }}").unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NativeFault { .. }), "{err:?}");
}

#[test]
fn test_throw_and_if_error() {
    assert_eq!(
        render("{{ 'bad' | throw({ assignError: 'e' }) }}{{ e.message }}|{{ 'oops' | ifError }}"),
        "bad|oops"
    );
    assert_eq!(render("[{{ 'fine' | ifError }}]"), "[]");
}

#[test]
fn test_last_error_filters() {
    let out = render(
        "{{ 'boom' | throw({ assignError: 'e' }) }}{{ lastErrorMessage }}|{{ lastError.kind }}",
    );
    assert_eq!(out, "boom|Error");
    let out = render("{{ 'boom' | throw({ catchError: 'e' }) }}[{{ lastError }}]");
    assert_eq!(out, "[]");
}

#[test]
fn test_partial_and_include_from_page_source() {
    let ctx = ScriptContext::builder()
        .pages(
            MemoryPages::new()
                .with_page("card", "<!--\ntitle: Untitled\n-->\n<{{ title }}:{{ body }}>")
                .with_page("raw", "{{ not parsed }}"),
        )
        .build();
    let out = ctx
        .render_source(
            "{{ 'card' | partial({ body: 'x' }) }} {{ 'card' | partial({ title: 'T', body: 'y' }) }}",
            Vec::new(),
        )
        .unwrap();
    assert_eq!(out, "<Untitled:x> <T:y>");
    assert_eq!(
        ctx.render_source("{{ 'raw' | include }}", Vec::new()).unwrap(),
        "{{ not parsed }}"
    );

    let err = ctx
        .render_source("{{ 'nowhere' | partial }}", Vec::new())
        .unwrap_err();
    assert!(err.message().contains("nowhere"), "{err}");
}

#[test]
fn test_partial_output_feeds_following_filters() {
    let ctx = ScriptContext::builder()
        .pages(MemoryPages::new().with_page("name", "quill"))
        .filter_transformer("shout", |bytes| Ok(bytes.to_ascii_uppercase()))
        .build();
    let render = |src: &str| ctx.render_source(src, Vec::new()).unwrap();
    assert_eq!(render("[{{ 'name' | partial | shout }}]"), "[QUILL]");
    assert_eq!(render("[{{ 'name' | partial | append('!') | upper }}]"), "[QUILL!]");
}
