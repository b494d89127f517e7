#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use quill_eval::ScriptContext;
use quill_value::Value;

use crate::{read_all, to_string, LispContextExt, LispLanguage};

fn atom() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        "[a-z][a-z0-9-]{0,6}",
        "\"[a-z ]{0,6}\"",
    ]
}

fn form() -> impl Strategy<Value = String> {
    atom().prop_recursive(3, 24, 4, |inner| {
        proptest::collection::vec(inner, 0..4).prop_map(|items| format!("({})", items.join(" ")))
    })
}

fn reprint(source: &str) -> String {
    read_all(source)
        .unwrap()
        .iter()
        .map(|form| to_string(form, true))
        .collect::<Vec<_>>()
        .join(" ")
}

proptest! {
    #[test]
    fn printed_forms_read_back_identically(source in form()) {
        let once = reprint(&source);
        prop_assert_eq!(reprint(&once), once);
    }

    #[test]
    fn addition_matches_integer_addition(a in -1_000_000_i64..1_000_000, b in -1_000_000_i64..1_000_000) {
        let ctx = ScriptContext::builder().language(LispLanguage::new().unwrap()).build();
        let sum = ctx
            .evaluate_lisp("(+ a b)", vec![("a", Value::Int(a)), ("b", Value::Int(b))])
            .unwrap();
        prop_assert_eq!(sum, Value::Int(a + b));
    }
}
