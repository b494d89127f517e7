//! Default filters.
//!
//! Registered as the first provider of every context built with the default
//! builder, so embedder providers cannot shadow them; exclude a name on the
//! session to hide one.

use quill_ir::{BinaryOp, Name};
use quill_value::errors::{runtime_error, thrown};
use quill_value::{EvalResult, Number, Signal, Value};

use crate::operators::{compare, evaluate_binary, loose_eq};
use crate::registry::ScriptMethods;
use crate::scope::ScopeContext;

pub(crate) fn default_scripts() -> ScriptMethods {
    let methods = ScriptMethods::new("default");
    let methods = arithmetic(methods);
    let methods = comparison(methods);
    let methods = text(methods);
    let methods = collections(methods);
    let methods = control(methods);
    let methods = diagnostics(methods);
    partials(methods)
}

fn binary(op: BinaryOp) -> impl Fn(&Value, &Value) -> EvalResult + Send + Sync + 'static {
    move |a, b| evaluate_binary(a, b, op)
}

fn arithmetic(methods: ScriptMethods) -> ScriptMethods {
    methods
        .filter2("add", binary(BinaryOp::Add))
        .filter2("sub", binary(BinaryOp::Sub))
        .filter2("subtract", binary(BinaryOp::Sub))
        .filter2("mul", binary(BinaryOp::Mul))
        .filter2("multiply", binary(BinaryOp::Mul))
        .filter2("div", binary(BinaryOp::Div))
        .filter2("divide", binary(BinaryOp::Div))
        .filter2("mod", binary(BinaryOp::Mod))
        .filter2("pow", binary(BinaryOp::Pow))
        .filter1("incr", |v| evaluate_binary(v, &Value::Int(1), BinaryOp::Add))
        .filter2("incrBy", binary(BinaryOp::Add))
        .filter1("decr", |v| evaluate_binary(v, &Value::Int(1), BinaryOp::Sub))
        .filter2("decrBy", binary(BinaryOp::Sub))
}

fn comparison(methods: ScriptMethods) -> ScriptMethods {
    fn ordered(
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> impl Fn(&Value, &Value) -> EvalResult + Send + Sync + 'static {
        move |a, b| Ok(Value::Bool(compare(a, b).is_some_and(accept)))
    }
    methods
        .filter2("eq", |a, b| Ok(Value::Bool(loose_eq(a, b))))
        .filter2("ne", |a, b| Ok(Value::Bool(!loose_eq(a, b))))
        .filter2("gt", ordered(std::cmp::Ordering::is_gt))
        .filter2("gte", ordered(std::cmp::Ordering::is_ge))
        .filter2("lt", ordered(std::cmp::Ordering::is_lt))
        .filter2("lte", ordered(std::cmp::Ordering::is_le))
        .filter1("not", |v| Ok(Value::Bool(!v.is_truthy())))
        .filter1("isNull", |v| Ok(Value::Bool(v.is_null())))
        .filter1("typeName", |v| Ok(Value::string(v.type_name())))
}

fn text(methods: ScriptMethods) -> ScriptMethods {
    methods
        .filter1("upper", |v| Ok(Value::string(v.to_string().to_uppercase())))
        .filter1("lower", |v| Ok(Value::string(v.to_string().to_lowercase())))
        .filter1("trim", |v| Ok(Value::string(v.to_string().trim())))
        .filter2("append", |a, b| Ok(Value::string(format!("{a}{b}"))))
        .filter1("join", |v| join(v, ","))
        .filter2("join", |v, sep| join(v, &sep.to_string()))
        .filter1("len", |v| length(v).map(Value::from))
        .filter2("substring", |v, start| substring(v, start, None))
        .filter_n("substring", 3, |args| substring(&args[0], &args[1], Some(&args[2])))
}

fn join(value: &Value, separator: &str) -> EvalResult {
    let items = value
        .items()
        .ok_or_else(|| runtime_error(format!("cannot join {}", value.type_name())))?;
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    Ok(Value::string(parts.join(separator)))
}

fn length(value: &Value) -> Result<usize, quill_value::EvalError> {
    match value {
        Value::Null => Ok(0),
        Value::Str(s) => Ok(s.chars().count()),
        Value::List(list) => Ok(list.len()),
        Value::Map(map) => Ok(map.len()),
        other => other
            .items()
            .map(|items| items.len())
            .ok_or_else(|| runtime_error(format!("{} has no length", other.type_name()))),
    }
}

fn index_arg(value: &Value, what: &str) -> Result<usize, quill_value::EvalError> {
    value
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| runtime_error(format!("{what} must be a non-negative integer, got {value}")))
}

fn substring(value: &Value, start: &Value, len: Option<&Value>) -> EvalResult {
    let text = value.to_string();
    let start = index_arg(start, "start")?;
    let chars = text.chars().skip(start);
    let out: String = match len {
        Some(len) => chars.take(index_arg(len, "length")?).collect(),
        None => chars.collect(),
    };
    Ok(Value::string(out))
}

fn collections(methods: ScriptMethods) -> ScriptMethods {
    methods
        .filter1("count", |v| length(v).map(Value::from))
        .filter1("first", |v| Ok(items_of(v)?.into_iter().next().unwrap_or(Value::Null)))
        .filter1("last", |v| Ok(items_of(v)?.pop().unwrap_or(Value::Null)))
        .filter1("reverse", |v| match v {
            Value::Str(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
            other => {
                let mut items = items_of(other)?;
                items.reverse();
                Ok(Value::list(items))
            }
        })
        .filter1("toList", |v| Ok(Value::list(items_of(v)?)))
        .context_filter("range", 1, |scope, args| range(scope, &Value::Int(0), &args[0]))
        .context_filter("range", 2, |scope, args| range(scope, &args[0], &args[1]))
}

fn items_of(value: &Value) -> Result<Vec<Value>, quill_value::EvalError> {
    match value {
        Value::Null => Ok(Vec::new()),
        other => other
            .items()
            .ok_or_else(|| runtime_error(format!("{} is not enumerable", other.type_name()))),
    }
}

/// `count` integers from `start`, bounded by the iteration quota.
fn range(scope: &ScopeContext, start: &Value, count: &Value) -> EvalResult {
    let start = start
        .as_int()
        .ok_or_else(|| runtime_error(format!("range start must be an integer, got {start}")))?;
    let count = index_arg(count, "range count")? as u64;
    scope.session().assert_within_quota(count)?;
    let items = (0..count as i64)
        .map(|i| Number::Int(start).add(Number::Int(i)).into_value())
        .collect();
    Ok(Value::list(items))
}

fn control(methods: ScriptMethods) -> ScriptMethods {
    methods
        .filter0("end", || Ok(Value::Signal(Signal::Stop)))
        .filter1("end", |_| Ok(Value::Signal(Signal::Stop)))
        .filter1("ignore", |_| Ok(Value::Signal(Signal::Ignore)))
        .filter1("echo", |v| Ok(v.clone()))
        .filter1("throw", |v| Err(thrown(v.to_string())))
        .filter2("default", |v, fallback| {
            Ok(if v.is_null() || v.as_str() == Some("") {
                fallback.clone()
            } else {
                v.clone()
            })
        })
        .context_filter("ifError", 1, |scope, args| {
            Ok(if scope.session().last_error().is_some() {
                args[0].clone()
            } else {
                Value::Signal(Signal::Stop)
            })
        })
        .context_filter("assignTo", 2, assign_to)
        .context_filter("to", 2, assign_to)
        .context_filter("assign", 2, |scope, args| {
            scope.session().set_arg(arg_name(&args[0])?, args[1].clone());
            Ok(Value::Signal(Signal::Ignore))
        })
        .context_filter("return", 0, |scope, _| {
            scope.session().set_return_value(Value::Null);
            Ok(Value::Signal(Signal::Ignore))
        })
        .context_filter("return", 1, |scope, args| {
            scope.session().set_return_value(args[0].clone());
            Ok(Value::Signal(Signal::Ignore))
        })
        .context_filter("halt", 0, |scope, _| {
            scope.session().halt();
            Ok(Value::Signal(Signal::Stop))
        })
}

/// `value | assignTo('name')` stores the value in the session args.
fn assign_to(scope: &ScopeContext, args: &[quill_value::Value]) -> EvalResult {
    scope.session().set_arg(arg_name(&args[1])?, args[0].clone());
    Ok(Value::Signal(Signal::Ignore))
}

fn arg_name(value: &Value) -> Result<Name, quill_value::EvalError> {
    match value.as_str() {
        Some(name) if !name.is_empty() => Ok(Name::intern(name)),
        _ => Err(runtime_error(format!("expected a variable name, got {value}"))),
    }
}

fn diagnostics(methods: ScriptMethods) -> ScriptMethods {
    methods
        .context_filter("lastError", 0, |scope, _| {
            Ok(scope
                .session()
                .last_error()
                .map_or(Value::Null, Value::error))
        })
        .context_filter("lastErrorMessage", 0, |scope, _| {
            Ok(scope
                .session()
                .last_error()
                .map_or(Value::Null, |err| Value::string(err.message())))
        })
        .context_filter("lastErrorStackTrace", 0, |scope, _| {
            Ok(scope
                .session()
                .last_error_stack_trace()
                .map_or(Value::Null, Value::string))
        })
}

fn partials(methods: ScriptMethods) -> ScriptMethods {
    methods
        .context_block("partial", 1, |scope, args| {
            scope
                .session()
                .write_partial(scope, &args[0].to_string(), Vec::new())
        })
        .context_block("partial", 2, |scope, args| {
            let bindings = match &args[1] {
                Value::Map(map) => map
                    .read()
                    .iter()
                    .map(|(k, v)| (Name::intern(k), v.clone()))
                    .collect(),
                Value::Null => Vec::new(),
                other => {
                    return Err(runtime_error(format!(
                        "partial arguments must be a map, got {}",
                        other.type_name()
                    )))
                }
            };
            scope
                .session()
                .write_partial(scope, &args[0].to_string(), bindings)
        })
        .context_block("include", 1, |scope, args| {
            let path = args[0].to_string();
            let source = scope
                .context()
                .page_source(&path)
                .ok_or_else(|| runtime_error(format!("page '{path}' not found")))?;
            scope.write(&source);
            Ok(())
        })
}

#[cfg(test)]
mod tests;
