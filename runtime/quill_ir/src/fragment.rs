//! Page fragments: the flat-to-nested unit a template page is parsed into.

use std::fmt;
use std::sync::Arc;

use crate::{Expr, Name};

/// One `| name(args)` stage of a variable fragment's filter chain.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterCall {
    pub name: Name,
    pub args: Vec<Expr>,
}

impl fmt::Display for FilterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        if self.args.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// `{{ expr | filter | filter(arg) }}`
#[derive(Clone, Debug, PartialEq)]
pub struct VariableFragment {
    /// Original text between the braces, used in traces and error messages.
    pub source: Arc<str>,
    pub expr: Expr,
    /// Set when `expr` is a bare identifier.
    pub binding: Option<Name>,
    pub filters: Vec<FilterCall>,
}

impl VariableFragment {
    pub fn new(source: impl Into<Arc<str>>, expr: Expr, filters: Vec<FilterCall>) -> Self {
        let binding = expr.as_identifier();
        VariableFragment {
            source: source.into(),
            expr,
            binding,
            filters,
        }
    }
}

/// Body of a block: parsed fragments, or raw text handed to the block
/// (or to a registered language) unparsed.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockBody {
    Fragments(Vec<PageFragment>),
    Raw(Arc<str>),
}

impl BlockBody {
    pub fn fragments(&self) -> &[PageFragment] {
        match self {
            BlockBody::Fragments(body) => body,
            BlockBody::Raw(_) => &[],
        }
    }
}

/// `{{else argument}}` section of a block.
#[derive(Clone, Debug, PartialEq)]
pub struct ElseBlock {
    pub argument: Arc<str>,
    pub body: Vec<PageFragment>,
}

/// `{{#name argument}} body {{else ...}} ... {{/name}}`
#[derive(Clone, Debug, PartialEq)]
pub struct BlockFragment {
    pub name: Name,
    pub argument: Arc<str>,
    pub body: BlockBody,
    pub else_blocks: Vec<ElseBlock>,
}

/// Statement list produced by the `code` sub-language.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementFragment {
    pub statements: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PageFragment {
    Text(Arc<str>),
    Variable(VariableFragment),
    Block(BlockFragment),
    Statements(StatementFragment),
}

impl PageFragment {
    pub fn text(s: &str) -> Self {
        PageFragment::Text(Arc::from(s))
    }

    /// Short description used in call traces.
    pub fn describe(&self) -> String {
        match self {
            PageFragment::Text(_) => "text".to_owned(),
            PageFragment::Variable(var) => format!("{{{{ {} }}}}", var.source.trim()),
            PageFragment::Block(block) => {
                let arg = block.argument.trim();
                if arg.is_empty() {
                    format!("{{{{#{}}}}}", block.name)
                } else {
                    format!("{{{{#{} {arg}}}}}", block.name)
                }
            }
            PageFragment::Statements(stmts) => format!("code ({} statements)", stmts.statements.len()),
        }
    }
}
