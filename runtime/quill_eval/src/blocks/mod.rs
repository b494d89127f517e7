//! Template blocks, `{{#name argument}} ... {{/name}}`.

use std::sync::Arc;

use quill_ir::{BlockBody, BlockFragment, ElseBlock, Name};
use quill_parse::parse_expression;
use quill_value::errors::{binding_failure, syntax_error};
use quill_value::{EvalError, EvalResult, Value};

use crate::evaluator::{evaluate, resolve_deferred};
use crate::output::OutputStream;
use crate::page::Page;
use crate::scope::ScopeContext;

/// Handler for one block name.
pub trait ScriptBlock: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the body is kept as raw text.
    fn raw_body(&self) -> bool {
        false
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError>;
}

pub(crate) fn default_blocks() -> Vec<Arc<dyn ScriptBlock>> {
    vec![
        Arc::new(IfBlock),
        Arc::new(EachBlock),
        Arc::new(WithBlock),
        Arc::new(CaptureBlock),
        Arc::new(RawBlock),
        Arc::new(NoopBlock),
        Arc::new(PartialBlock),
    ]
}

/// Evaluate a block argument as an expression.
fn evaluate_argument(scope: &ScopeContext, source: &str) -> EvalResult {
    let expr = parse_expression(source)?;
    resolve_deferred(evaluate(&expr, scope)?)
}

fn write_body(scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
    scope
        .session()
        .write_fragments(scope, block.body.fragments())
}

/// First `{{else}}` or `{{else if cond}}` section that applies.
fn write_else(scope: &ScopeContext, else_blocks: &[ElseBlock]) -> Result<(), EvalError> {
    for section in else_blocks {
        let argument = section.argument.trim();
        let applies = match argument.strip_prefix("if ") {
            Some(cond) => evaluate_argument(scope, cond)?.is_truthy(),
            None if argument.is_empty() => true,
            None => evaluate_argument(scope, argument)?.is_truthy(),
        };
        if applies {
            return scope.session().write_fragments(scope, &section.body);
        }
    }
    Ok(())
}

/// `{{#if cond}} ... {{else if other}} ... {{else}} ... {{/if}}`
struct IfBlock;

impl ScriptBlock for IfBlock {
    fn name(&self) -> &str {
        "if"
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        if evaluate_argument(scope, &block.argument)?.is_truthy() {
            write_body(scope, block)
        } else {
            write_else(scope, &block.else_blocks)
        }
    }
}

/// `{{#each items}}`, `{{#each item in items}}` or
/// `{{#each item in items where cond}}`.
///
/// Each iteration runs in a forked scope binding the item (`it` unless
/// named) and `index`. Iterations count against the iteration quota.
struct EachBlock;

struct EachArgs<'a> {
    binding: Name,
    source: &'a str,
    filter: Option<&'a str>,
}

fn parse_each(argument: &str) -> EachArgs<'_> {
    let argument = argument.trim();
    let (head, filter) = match argument.split_once(" where ") {
        Some((head, cond)) => (head.trim(), Some(cond.trim())),
        None => (argument, None),
    };
    match head.split_once(" in ") {
        Some((name, source)) if is_identifier(name.trim()) => EachArgs {
            binding: Name::intern(name.trim()),
            source: source.trim(),
            filter,
        },
        _ => EachArgs {
            binding: Name::intern("it"),
            source: head,
            filter,
        },
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl ScriptBlock for EachBlock {
    fn name(&self) -> &str {
        "each"
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        let args = parse_each(&block.argument);
        let source = evaluate_argument(scope, args.source)?;
        let items = match &source {
            Value::Null => Vec::new(),
            other => other.items().ok_or_else(|| {
                binding_failure(
                    args.source,
                    format!("{} is not enumerable", other.type_name()),
                )
            })?,
        };
        let filter = args.filter.map(parse_expression).transpose()?;

        let session = scope.session();
        let index_name = Name::intern("index");
        let mut written = 0_u64;
        for (index, item) in items.into_iter().enumerate() {
            session.assert_within_quota(index as u64 + 1)?;
            if session.is_halted() {
                break;
            }
            let child = scope.fork_with([(args.binding, item), (index_name, Value::from(index))]);
            if let Some(cond) = &filter {
                if !resolve_deferred(evaluate(cond, &child)?)?.is_truthy() {
                    continue;
                }
            }
            session.write_fragments(&child, block.body.fragments())?;
            written += 1;
        }

        if written == 0 {
            write_else(scope, &block.else_blocks)?;
        }
        Ok(())
    }
}

/// `{{#with map}}` binds each entry of the map in a forked scope.
struct WithBlock;

impl ScriptBlock for WithBlock {
    fn name(&self) -> &str {
        "with"
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        match evaluate_argument(scope, &block.argument)? {
            Value::Map(map) => {
                let bindings: Vec<_> = map
                    .read()
                    .iter()
                    .map(|(k, v)| (Name::intern(k), v.clone()))
                    .collect();
                let child = scope.fork_with(bindings);
                write_body(&child, block)
            }
            Value::Null => write_else(scope, &block.else_blocks),
            other => {
                let child = scope.fork_with([(Name::intern("it"), other)]);
                write_body(&child, block)
            }
        }
    }
}

/// `{{#capture name}}` renders the body into `name` instead of the output.
struct CaptureBlock;

impl ScriptBlock for CaptureBlock {
    fn name(&self) -> &str {
        "capture"
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        let name = block.argument.trim();
        if !is_identifier(name) {
            return Err(syntax_error(format!(
                "capture requires a variable name, got '{name}'"
            )));
        }
        let sub = OutputStream::new();
        write_body(&scope.with_output(sub.clone()), block)?;
        scope.define(Name::intern(name), Value::string(sub.take_string()));
        Ok(())
    }
}

/// `{{#raw}}` writes its body verbatim; `{{#raw name}}` binds it instead.
struct RawBlock;

impl ScriptBlock for RawBlock {
    fn name(&self) -> &str {
        "raw"
    }

    fn raw_body(&self) -> bool {
        true
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        let BlockBody::Raw(body) = &block.body else {
            return Ok(());
        };
        let name = block.argument.trim();
        if name.is_empty() {
            scope.write(body);
        } else {
            scope.define(Name::intern(name), Value::string(&**body));
        }
        Ok(())
    }
}

/// Renders nothing.
struct NoopBlock;

impl ScriptBlock for NoopBlock {
    fn name(&self) -> &str {
        "noop"
    }

    fn write(&self, _scope: &ScopeContext, _block: &BlockFragment) -> Result<(), EvalError> {
        Ok(())
    }
}

/// `{{#partial name}}` defines an inline partial for the rest of the render.
struct PartialBlock;

impl ScriptBlock for PartialBlock {
    fn name(&self) -> &str {
        "partial"
    }

    fn write(&self, scope: &ScopeContext, block: &BlockFragment) -> Result<(), EvalError> {
        let name = block.argument.trim();
        if name.is_empty() {
            return Err(syntax_error("partial requires a name"));
        }
        let page = Page::from_fragments(name, block.body.fragments().to_vec());
        scope
            .session()
            .define_partial(Name::intern(name), Arc::new(page));
        Ok(())
    }
}
