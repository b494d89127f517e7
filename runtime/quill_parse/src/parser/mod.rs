//! Expression parser.
//!
//! Precedence climbing, loosest first:
//!
//! | level | operators |
//! |-------|-----------|
//! | assignment | `=` `+=` `-=` `*=` `/=` (right) |
//! | pipe | `\|>` |
//! | conditional | `?:` (right) |
//! | binary | `??` `\|\|` `&&` equality relational additive multiplicative `**` |
//! | unary | `!` `-` `+` |
//! | postfix | `.name` `[expr]` `(args)` |
//!
//! `a |> f(b)` is desugared into the call `f(a, b)` at parse time.

use std::sync::Arc;

use quill_ir::{
    AssignOp, BinaryOp, DeclKind, Declarator, Expr, FilterCall, Literal, Name, Property,
    PropertyKey, Span, UnaryOp, VariableFragment,
};

use crate::lexer::{lex, Token, TokenKind};
use crate::ParseError;

/// Binding power of a binary operator token, and the operator.
fn binary_op(kind: &TokenKind) -> Option<(u8, BinaryOp)> {
    Some(match kind {
        TokenKind::QuestionQuestion => (1, BinaryOp::Coalesce),
        TokenKind::OrOr => (2, BinaryOp::Or),
        TokenKind::AndAnd => (3, BinaryOp::And),
        TokenKind::EqEq => (4, BinaryOp::Eq),
        TokenKind::NotEq => (4, BinaryOp::NotEq),
        TokenKind::EqEqEq => (4, BinaryOp::StrictEq),
        TokenKind::NotEqEq => (4, BinaryOp::StrictNotEq),
        TokenKind::Lt => (5, BinaryOp::Lt),
        TokenKind::LtEq => (5, BinaryOp::LtEq),
        TokenKind::Gt => (5, BinaryOp::Gt),
        TokenKind::GtEq => (5, BinaryOp::GtEq),
        TokenKind::Plus => (6, BinaryOp::Add),
        TokenKind::Minus => (6, BinaryOp::Sub),
        TokenKind::Star => (7, BinaryOp::Mul),
        TokenKind::Slash => (7, BinaryOp::Div),
        TokenKind::Percent => (7, BinaryOp::Mod),
        TokenKind::StarStar => (8, BinaryOp::Pow),
        _ => return None,
    })
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::Add,
        TokenKind::MinusEq => AssignOp::Sub,
        TokenKind::StarEq => AssignOp::Mul,
        TokenKind::SlashEq => AssignOp::Div,
        _ => return None,
    })
}

/// Recursive-descent parser over a token buffer.
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Result<Self, ParseError> {
        Ok(Parser {
            source,
            tokens: lex(source)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(Span::DUMMY, |t| t.span)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {what} but found {}",
                self.peek().describe()
            )))
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError::new(message, self.span())
    }

    pub fn at_end(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected {}", self.peek().describe())))
        }
    }

    fn expect_ident(&mut self) -> Result<Name, ParseError> {
        match self.advance() {
            TokenKind::Ident(name) => Ok(name),
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("expected identifier but found {}", other.describe())))
            }
        }
    }

    /// Full expression, including assignment.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_pipe()?;
        let Some(op) = assign_op(self.peek()) else {
            return Ok(target);
        };
        if !matches!(target, Expr::Identifier(_) | Expr::Member { .. }) {
            return Err(self.error(format!("invalid assignment target '{target}'")));
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(Expr::Assignment {
            target: Box::new(target),
            op,
            value: Box::new(value),
        })
    }

    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_conditional()?;
        while self.eat(&TokenKind::PipeForward) {
            let rhs = self.parse_conditional()?;
            lhs = match rhs {
                Expr::Call { callee, mut args } => {
                    args.insert(0, lhs);
                    Expr::Call { callee, args }
                }
                callee @ (Expr::Identifier(_) | Expr::Member { .. }) => {
                    Expr::call(callee, vec![lhs])
                }
                other => {
                    return Err(self.error(format!("cannot pipe into '{other}'")));
                }
            };
        }
        Ok(lhs)
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary(1)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let then = self.parse_conditional()?;
        self.expect(&TokenKind::Colon, "':' in conditional")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_binary(&mut self, min_power: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some((power, op)) = binary_op(self.peek()) {
            if power < min_power {
                break;
            }
            self.advance();
            // `**` is right-associative.
            let next = if op == BinaryOp::Pow { power } else { power + 1 };
            let right = self.parse_binary(next)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let arg = self.parse_unary()?;
        // Fold negative numeric literals.
        Ok(match (op, arg) {
            (UnaryOp::Neg, Expr::Literal(Literal::Int(n))) => Expr::Literal(Literal::Int(-n)),
            (UnaryOp::Neg, Expr::Literal(Literal::Float(x))) => Expr::Literal(Literal::Float(-x)),
            (op, arg) => Expr::Unary {
                op,
                arg: Box::new(arg),
            },
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    expr = Expr::member(expr, Expr::Identifier(name), false);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    expr = Expr::member(expr, index, true);
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_arguments(&TokenKind::RParen)?;
                    expr = Expr::call(expr, args);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated arguments up to `close`, with `...spread` support.
    fn parse_arguments(&mut self, close: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        while !self.eat(close) {
            if self.at_end() {
                return Err(self.error("unterminated argument list".to_owned()));
            }
            if self.eat(&TokenKind::Ellipsis) {
                let inner = self.parse_expr()?;
                args.push(Expr::Spread(Box::new(inner)));
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.eat(&TokenKind::Comma) && self.peek() != close {
                return Err(self.error(format!(
                    "expected ',' but found {}",
                    self.peek().describe()
                )));
            }
        }
        Ok(args)
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let mut props = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            let key = match self.advance() {
                TokenKind::Ident(name) => PropertyKey::Named(name),
                TokenKind::Str(s) => PropertyKey::Named(Name::intern(&s)),
                TokenKind::Int(n) => PropertyKey::Named(Name::intern(&n.to_string())),
                TokenKind::LBracket => {
                    let key = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    PropertyKey::Computed(key)
                }
                other => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error(format!(
                        "expected property name but found {}",
                        other.describe()
                    )));
                }
            };
            let value = if self.eat(&TokenKind::Colon) {
                self.parse_expr()?
            } else if let PropertyKey::Named(name) = &key {
                // `{ a }` shorthand
                Expr::Identifier(*name)
            } else {
                return Err(self.error("computed property requires a value".to_owned()));
            };
            props.push(Property { key, value });
            if !self.eat(&TokenKind::Comma) && self.peek() != &TokenKind::RBrace {
                return Err(self.error(format!(
                    "expected ',' but found {}",
                    self.peek().describe()
                )));
            }
        }
        Ok(Expr::Object(props))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        Ok(match self.advance() {
            TokenKind::Int(n) => Expr::Literal(Literal::Int(n)),
            TokenKind::Float(x) => Expr::Literal(Literal::Float(x)),
            TokenKind::Str(s) => Expr::Literal(Literal::Str(s)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::Null => Expr::Literal(Literal::Null),
            TokenKind::Ident(name) => Expr::Identifier(name),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                inner
            }
            TokenKind::LBracket => Expr::Array(self.parse_arguments(&TokenKind::RBracket)?),
            TokenKind::LBrace => self.parse_object()?,
            kind @ (TokenKind::Let | TokenKind::Const | TokenKind::Var) => {
                self.parse_declaration(&kind)?
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected {}", other.describe()),
                    span,
                ))
            }
        })
    }

    fn parse_declaration(&mut self, kind: &TokenKind) -> Result<Expr, ParseError> {
        let kind = match kind {
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_pipe()?)
            } else {
                None
            };
            bindings.push(Declarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Expr::VariableDeclaration { kind, bindings })
    }

    /// One filter stage after `|`: `name`, `name(args)` or `name: rest of line`.
    fn parse_filter(&mut self) -> Result<FilterCall, ParseError> {
        let name = self.expect_ident()?;
        let args = match self.peek() {
            TokenKind::LParen => {
                self.advance();
                self.parse_arguments(&TokenKind::RParen)?
            }
            TokenKind::Colon if !matches!(self.peek_at(1), TokenKind::Eof) => {
                let start = self.span().end as usize;
                let rest = self.source.get(start..).unwrap_or("").trim();
                self.pos = self.tokens.len().saturating_sub(1);
                vec![Expr::Literal(Literal::Str(Arc::from(rest)))]
            }
            _ => Vec::new(),
        };
        Ok(FilterCall { name, args })
    }
}

/// Parse a complete expression.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse statements separated by `;` or simply juxtaposed on new lines.
pub fn parse_statements(source: &str) -> Result<Vec<Expr>, ParseError> {
    let mut parser = Parser::new(source)?;
    let mut statements = Vec::new();
    loop {
        while parser.eat(&TokenKind::Semicolon) {}
        if parser.at_end() {
            return Ok(statements);
        }
        statements.push(parser.parse_expr()?);
    }
}

/// Parse the inside of `{{ ... }}`: an expression plus its `|` filter chain.
pub fn parse_variable(source: &str) -> Result<VariableFragment, ParseError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expr()?;
    let mut filters = Vec::new();
    while parser.eat(&TokenKind::Pipe) {
        filters.push(parser.parse_filter()?);
    }
    parser.expect_end()?;
    Ok(VariableFragment::new(source.trim(), expr, filters))
}

#[cfg(test)]
mod tests;
