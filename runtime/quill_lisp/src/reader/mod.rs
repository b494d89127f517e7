//! S-expression reader built on logos.
//!
//! Besides plain lists, dotted pairs and the quote family (`'` `` ` `` `,`
//! `,@`) the reader expands three shorthands:
//!
//! - `[a b]` reads as `([] a b)`; `[]` evaluates to `list` and is accepted as
//!   a parameter list
//! - `{ :a 1 "b" 2 }` reads as `(new-map (list "a" 1) (list "b" 2))`
//! - `#(+ % 1)` reads as `(fn (%1) (+ %1 1))`; `%N` names the Nth argument

use logos::Logos;
use quill_ir::Span;
use quill_value::errors::syntax_error;
use quill_value::EvalError;

use crate::obj::Obj;
use crate::sym::{syms, Sym};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[regex(r";[^\n]*", logos::skip)]
    Comment,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("#(")]
    HashParen,
    #[token("'")]
    Quote,
    #[token("`")]
    Backquote,
    #[token(",")]
    Comma,
    #[token(",@")]
    CommaAt,

    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    #[regex(r#"[^\s"(),'`{}\[\];#]+"#)]
    Atom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    HashParen,
    Quote,
    Backquote,
    Comma,
    CommaAt,
    Str,
    Atom,
}

#[derive(Clone, Copy, Debug)]
struct Token {
    kind: TokenKind,
    span: Span,
}

fn lex(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(raw) = lexer.next() {
        let span = Span::from_range(lexer.span());
        let kind = match raw {
            Ok(RawToken::LParen) => TokenKind::LParen,
            Ok(RawToken::RParen) => TokenKind::RParen,
            Ok(RawToken::LBracket) => TokenKind::LBracket,
            Ok(RawToken::RBracket) => TokenKind::RBracket,
            Ok(RawToken::LBrace) => TokenKind::LBrace,
            Ok(RawToken::RBrace) => TokenKind::RBrace,
            Ok(RawToken::HashParen) => TokenKind::HashParen,
            Ok(RawToken::Quote) => TokenKind::Quote,
            Ok(RawToken::Backquote) => TokenKind::Backquote,
            Ok(RawToken::Comma) => TokenKind::Comma,
            Ok(RawToken::CommaAt) => TokenKind::CommaAt,
            Ok(RawToken::Str) => TokenKind::Str,
            Ok(RawToken::Atom) => TokenKind::Atom,
            Ok(RawToken::Comment) | Err(()) => {
                return Err(read_error(source, span, "unexpected character"));
            }
        };
        tokens.push(Token { kind, span });
    }
    Ok(tokens)
}

fn read_error(source: &str, span: Span, message: &str) -> EvalError {
    let (line, col) = span.line_col(source);
    syntax_error(format!("{message} at {line}:{col}"))
}

/// Read every top-level form in `source`.
pub fn read_all(source: &str) -> Result<Vec<Obj>, EvalError> {
    let tokens = lex(source)?;
    let mut reader = Reader {
        source,
        tokens: &tokens,
        pos: 0,
    };
    let mut forms = Vec::new();
    while reader.peek().is_some() {
        forms.push(reader.expression()?);
    }
    Ok(forms)
}

struct Reader<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl Reader<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<Token, EvalError> {
        let token = self.peek().ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(token)
    }

    fn eof(&self) -> EvalError {
        let end = Span::from_range(self.source.len()..self.source.len());
        read_error(self.source, end, "unexpected EOF")
    }

    fn text(&self, token: Token) -> &str {
        &self.source[token.span.start as usize..token.span.end as usize]
    }

    fn expression(&mut self) -> Result<Obj, EvalError> {
        let token = self.next()?;
        let s = syms();
        match token.kind {
            TokenKind::LParen => self.list_body(TokenKind::RParen),
            TokenKind::LBracket => {
                let items = self.list_body(TokenKind::RBracket)?;
                Ok(Obj::cons(Obj::Sym(s.bracket), items))
            }
            TokenKind::LBrace => self.map_body(),
            TokenKind::HashParen => {
                let body = self.list_body(TokenKind::RParen)?;
                Ok(short_lambda(body))
            }
            TokenKind::Quote => self.quoted(s.quote),
            TokenKind::Backquote => self.quoted(s.quasiquote),
            TokenKind::Comma => self.quoted(s.unquote),
            TokenKind::CommaAt => self.quoted(s.unquote_splicing),
            TokenKind::Str => Ok(Obj::str(&unescape(self.text(token)))),
            TokenKind::Atom => Ok(atom(self.text(token))),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                let close = self.text(token).to_owned();
                Err(read_error(
                    self.source,
                    token.span,
                    &format!("unexpected {close}"),
                ))
            }
        }
    }

    fn quoted(&mut self, head: Sym) -> Result<Obj, EvalError> {
        let form = self.expression()?;
        Ok(Obj::list([Obj::Sym(head), form]))
    }

    /// Elements up to `close`, with an optional `. tail`.
    fn list_body(&mut self, close: TokenKind) -> Result<Obj, EvalError> {
        let mut items = Vec::new();
        let mut tail = Obj::Nil;
        loop {
            let token = self.peek().ok_or_else(|| self.eof())?;
            if token.kind == close {
                self.pos += 1;
                break;
            }
            if token.kind == TokenKind::Atom && self.text(token) == "." && !items.is_empty() {
                self.pos += 1;
                tail = self.expression()?;
                let end = self.next()?;
                if end.kind != close {
                    return Err(read_error(self.source, end.span, "expected end of dotted pair"));
                }
                break;
            }
            items.push(self.expression()?);
        }
        Ok(items
            .into_iter()
            .rev()
            .fold(tail, |rest, item| Obj::cons(item, rest)))
    }

    /// `{ key value, ... }` with `:key` or string keys and optional commas.
    fn map_body(&mut self) -> Result<Obj, EvalError> {
        let s = syms();
        let mut entries = vec![Obj::Sym(s.new_map)];
        loop {
            let token = self.next()?;
            let key = match token.kind {
                TokenKind::RBrace => break,
                TokenKind::Comma => continue,
                TokenKind::Str => unescape(self.text(token)),
                TokenKind::Atom if self.text(token).len() > 1 && self.text(token).starts_with(':') => {
                    self.text(token)[1..].to_owned()
                }
                _ => {
                    return Err(read_error(
                        self.source,
                        token.span,
                        "map key must be a :keyword or a string",
                    ));
                }
            };
            let value = self.expression()?;
            entries.push(Obj::list([Obj::Sym(s.list), Obj::str(&key), value]));
        }
        Ok(Obj::list(entries))
    }
}

/// Number, `nil` or symbol.
fn atom(text: &str) -> Obj {
    if text == "nil" {
        return Obj::Nil;
    }
    if let Some(number) = parse_number(text) {
        return number;
    }
    Obj::Sym(Sym::intern(text))
}

fn parse_number(text: &str) -> Option<Obj> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let digits = digits.strip_prefix('.').unwrap_or(digits);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(Obj::int(n));
    }
    text.parse::<f64>()
        .ok()
        .map(|x| Obj::Atom(quill_value::Value::Float(x)))
}

/// Contents of a string token with escapes resolved.
pub fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// `#(...)` body to `(fn (%1 .. %N) body)`.
fn short_lambda(body: Obj) -> Obj {
    let s = syms();
    let mut arity = 0;
    let body = rename_placeholders(&body, &mut arity);
    let params = (1..=arity).map(|n| Obj::Sym(Sym::intern(&format!("%{n}"))));
    Obj::list([Obj::Sym(s.fn_), Obj::list(params.collect::<Vec<_>>()), body])
}

/// Rewrite `%` to `%1` and record the highest `%N`. Nested `fn` forms keep
/// their own placeholders.
fn rename_placeholders(x: &Obj, arity: &mut usize) -> Obj {
    match x {
        Obj::Sym(sym) if sym.is_interned() => {
            let name = sym.name();
            if name == "%" {
                *arity = (*arity).max(1);
                return Obj::Sym(Sym::intern("%1"));
            }
            if let Some(n) = name.strip_prefix('%').and_then(|n| n.parse::<usize>().ok()) {
                *arity = (*arity).max(n);
            }
            x.clone()
        }
        Obj::Cell(cell) => {
            if cell.car().as_sym() == Some(syms().fn_) {
                return x.clone();
            }
            Obj::cons(
                rename_placeholders(&cell.car(), arity),
                rename_placeholders(&cell.cdr(), arity),
            )
        }
        other => other.clone(),
    }
}
