#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use quill_value::Value;

use crate::{MemoryPages, ScriptContext};

const PAGE: &str = "{{#each items}}{{ it | mul(k) }}{{#if it > k}}+{{else}}-{{/if}}{{/each}}|{{ items | count }}";

fn context() -> ScriptContext {
    ScriptContext::builder()
        .pages(MemoryPages::new().with_page("page", PAGE))
        .build()
}

fn args(items: &[i64], k: i64) -> Vec<(&'static str, Value)> {
    vec![
        ("items", Value::list(items.iter().copied().map(Value::Int).collect())),
        ("k", Value::Int(k)),
    ]
}

proptest! {
    #[test]
    fn render_is_deterministic(
        items in proptest::collection::vec(-1000_i64..1000, 0..20),
        k in -50_i64..50,
    ) {
        let ctx = context();
        let first = ctx.render("page", args(&items, k)).unwrap();
        let second = ctx.render("page", args(&items, k)).unwrap();
        let fresh = context().render("page", args(&items, k)).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &fresh);
    }

    #[test]
    fn add_filter_matches_integer_addition(a in -100_000_i64..100_000, b in -100_000_i64..100_000) {
        let out = ScriptContext::builder()
            .build()
            .render_source("{{ a | add(b) }}", vec![("a", Value::Int(a)), ("b", Value::Int(b))])
            .unwrap();
        prop_assert_eq!(out, (a + b).to_string());
    }

    #[test]
    fn join_matches_display_of_items(items in proptest::collection::vec(any::<i32>(), 0..16)) {
        let list = Value::list(items.iter().copied().map(Value::from).collect());
        let out = ScriptContext::builder()
            .build()
            .render_source("{{ items | join('/') }}", vec![("items", list)])
            .unwrap();
        let expected: Vec<String> = items.iter().map(ToString::to_string).collect();
        prop_assert_eq!(out, expected.join("/"));
    }
}
