//! Template page parser.
//!
//! Splits page source into fragments:
//!
//! ```text
//! text {{ expr | filter(arg) }} {{* comment *}}
//! {{#name argument}} body {{else argument}} body {{/name}}
//! {{#code}} let a = 1; {{/code}}
//! ```
//!
//! Blocks named in [`TemplateSyntax::raw_blocks`] keep their body as raw
//! text for the block (or registered language) to interpret.

use std::sync::Arc;

use quill_ir::{
    BlockBody, BlockFragment, ElseBlock, Name, PageFragment, Span, StatementFragment,
};
use rustc_hash::FxHashSet;

use crate::parser::{parse_statements, parse_variable};
use crate::ParseError;

/// Block name whose raw body is parsed as a statement list.
const CODE_BLOCK: &str = "code";

/// Parse options.
#[derive(Clone, Debug)]
pub struct TemplateSyntax {
    raw_blocks: FxHashSet<Name>,
}

impl Default for TemplateSyntax {
    fn default() -> Self {
        let mut raw_blocks = FxHashSet::default();
        raw_blocks.insert(Name::intern("raw"));
        raw_blocks.insert(Name::intern(CODE_BLOCK));
        TemplateSyntax { raw_blocks }
    }
}

impl TemplateSyntax {
    /// Keep the body of blocks named `name` unparsed.
    #[must_use]
    pub fn with_raw_block(mut self, name: &str) -> Self {
        self.raw_blocks.insert(Name::intern(name));
        self
    }

    pub fn is_raw(&self, name: Name) -> bool {
        self.raw_blocks.contains(&name)
    }
}

/// Parse a whole page.
pub fn parse_template(source: &str, syntax: &TemplateSyntax) -> Result<Vec<PageFragment>, ParseError> {
    TemplateParser { source, syntax }.parse(0, source.len())
}

fn span(start: usize, end: usize) -> Span {
    Span::from_range(start..end)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

/// Drop one leading line break, so block bodies do not start with a blank line.
fn trim_first_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

/// Offset of the `}}` closing a tag whose content starts at `from`, skipping
/// quoted strings and balanced braces inside expressions.
fn find_tag_end(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth > 0 => depth -= 1,
                b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Block open/close/else tags seen while looking for the end of a block.
enum Tag {
    Open,
    Close(String),
    Else,
    Other,
}

struct TemplateParser<'a> {
    source: &'a str,
    syntax: &'a TemplateSyntax,
}

impl TemplateParser<'_> {
    fn parse(&self, start: usize, end: usize) -> Result<Vec<PageFragment>, ParseError> {
        let mut fragments = Vec::new();
        let mut pos = start;
        while pos < end {
            let Some(rel) = self.source[pos..end].find("{{") else {
                fragments.push(PageFragment::text(&self.source[pos..end]));
                break;
            };
            let open = pos + rel;
            if open > pos {
                fragments.push(PageFragment::text(&self.source[pos..open]));
            }
            let rest = &self.source[open + 2..end];
            pos = if rest.starts_with('*') {
                let close = rest
                    .find("*}}")
                    .ok_or_else(|| ParseError::new("unterminated comment", span(open, end)))?;
                open + 2 + close + 3
            } else if rest.starts_with('#') {
                let (fragment, next) = self.parse_block(open, end)?;
                fragments.push(fragment);
                next
            } else if rest.starts_with('/') {
                return Err(ParseError::new("unexpected block close", span(open, open + 3)));
            } else if rest.starts_with("else") && !rest[4..].starts_with(is_name_char) {
                return Err(ParseError::new("'else' outside of a block", span(open, open + 6)));
            } else {
                let tag_end = find_tag_end(self.source, open + 2)
                    .filter(|e| *e < end)
                    .ok_or_else(|| ParseError::new("unterminated '{{'", span(open, end)))?;
                let content = &self.source[open + 2..tag_end];
                let fragment =
                    parse_variable(content).map_err(|e| e.offset_by(open + 2))?;
                fragments.push(PageFragment::Variable(fragment));
                tag_end + 2
            };
        }
        Ok(fragments)
    }

    fn classify(&self, at: usize) -> (Tag, usize) {
        let rest = &self.source[at + 2..];
        let tag_end = find_tag_end(self.source, at + 2).unwrap_or(self.source.len());
        let tag = if rest.starts_with('#') {
            Tag::Open
        } else if let Some(name) = rest.strip_prefix('/') {
            Tag::Close(name.chars().take_while(|c| is_name_char(*c)).collect())
        } else if rest.starts_with("else") && !rest[4..].starts_with(is_name_char) {
            Tag::Else
        } else {
            Tag::Other
        };
        (tag, tag_end)
    }

    /// Parse `{{#name arg}} ... {{/name}}` starting at `open`.
    fn parse_block(&self, open: usize, end: usize) -> Result<(PageFragment, usize), ParseError> {
        let head_end = find_tag_end(self.source, open + 2)
            .filter(|e| *e < end)
            .ok_or_else(|| ParseError::new("unterminated block tag", span(open, end)))?;
        let head = &self.source[open + 3..head_end];
        let name_len = head.find(|c: char| !is_name_char(c)).unwrap_or(head.len());
        if name_len == 0 {
            return Err(ParseError::new("block name expected", span(open, head_end)));
        }
        let name_text = &head[..name_len];
        let name = Name::intern(name_text);
        let argument: Arc<str> = Arc::from(head[name_len..].trim());
        let body_start = head_end + 2;

        // Sections: (argument, start, end) for the body and each else.
        let mut sections: Vec<(Arc<str>, usize, usize)> = Vec::new();
        let mut section_arg = Arc::clone(&argument);
        let mut section_start = body_start;
        let mut depth = 0usize;
        let mut pos = body_start;
        let raw = self.syntax.is_raw(name);
        loop {
            let Some(rel) = self.source[pos..end].find("{{") else {
                return Err(ParseError::new(
                    format!("end block for '{name_text}' not found"),
                    span(open, end),
                ));
            };
            let at = pos + rel;
            let (tag, tag_end) = self.classify(at);
            match tag {
                // Raw bodies only track nesting of their own name.
                Tag::Open if raw => {
                    let nested = &self.source[at + 3..];
                    if nested.starts_with(name_text)
                        && !nested[name_text.len()..].starts_with(is_name_char)
                    {
                        depth += 1;
                    }
                }
                Tag::Open => depth += 1,
                Tag::Close(closed) if depth == 0 && (!raw || closed == name_text) => {
                    if closed != name_text {
                        return Err(ParseError::new(
                            format!("expected '{{{{/{name_text}}}}}' but found '{{{{/{closed}}}}}'"),
                            span(at, tag_end + 2),
                        ));
                    }
                    sections.push((section_arg, section_start, at));
                    pos = tag_end + 2;
                    break;
                }
                Tag::Close(closed) => {
                    if !raw || closed == name_text {
                        depth -= 1;
                    }
                }
                Tag::Else if depth == 0 && !raw => {
                    sections.push((section_arg, section_start, at));
                    section_arg = Arc::from(self.source[at + 6..tag_end].trim());
                    section_start = tag_end + 2;
                }
                Tag::Else | Tag::Other => {}
            }
            pos = tag_end.saturating_add(2).min(end);
        }

        let mut sections = sections.into_iter();
        let Some((_, body_from, body_to)) = sections.next() else {
            return Err(ParseError::new("empty block", span(open, pos)));
        };
        let body_text = trim_first_newline(&self.source[body_from..body_to]);
        let body_offset = body_to - body_text.len();

        let fragment = if raw {
            if name_text == CODE_BLOCK {
                let statements =
                    parse_statements(body_text).map_err(|e| e.offset_by(body_offset))?;
                PageFragment::Statements(StatementFragment { statements })
            } else {
                PageFragment::Block(BlockFragment {
                    name,
                    argument,
                    body: BlockBody::Raw(Arc::from(body_text)),
                    else_blocks: Vec::new(),
                })
            }
        } else {
            let body = self.parse(body_offset, body_to)?;
            let mut else_blocks = Vec::new();
            for (arg, from, to) in sections {
                let text = trim_first_newline(&self.source[from..to]);
                else_blocks.push(ElseBlock {
                    argument: arg,
                    body: self.parse(to - text.len(), to)?,
                });
            }
            PageFragment::Block(BlockFragment {
                name,
                argument,
                body: BlockBody::Fragments(body),
                else_blocks,
            })
        };
        Ok((fragment, pos))
    }
}
