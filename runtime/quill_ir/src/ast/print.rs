//! Source printing for expressions.
//!
//! Output re-parses to an equal tree. Binary and conditional nodes are
//! parenthesized only when nested inside another operator.

use std::fmt::{self, Write};

use super::{AssignOp, DeclKind, Expr, Literal, PropertyKey, UnaryOp};

pub(super) fn write_string_literal(f: &mut impl Write, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Str(s) => write_string_literal(f, s),
        }
    }
}

fn is_compound(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Binary { .. } | Expr::Conditional { .. } | Expr::Assignment { .. }
    )
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if is_compound(expr) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(name) => f.write_str(name.as_str()),
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Array(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
            Expr::Object(props) => {
                f.write_char('{')?;
                for (i, prop) in props.iter().enumerate() {
                    f.write_str(if i > 0 { ", " } else { " " })?;
                    match &prop.key {
                        PropertyKey::Named(name) => f.write_str(name.as_str())?,
                        PropertyKey::Computed(key) => write!(f, "[{key}]")?,
                    }
                    write!(f, ": {}", prop.value)?;
                }
                f.write_str(if props.is_empty() { "}" } else { " }" })
            }
            Expr::Spread(inner) => write!(f, "...{inner}"),
            Expr::Unary { op, arg } => {
                f.write_str(match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                })?;
                write_operand(f, arg)
            }
            Expr::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                write_operand(f, test)?;
                f.write_str(" ? ")?;
                write_operand(f, then)?;
                f.write_str(" : ")?;
                write_operand(f, otherwise)
            }
            Expr::Assignment { target, op, value } => {
                let op = match op {
                    AssignOp::Assign => "=",
                    AssignOp::Add => "+=",
                    AssignOp::Sub => "-=",
                    AssignOp::Mul => "*=",
                    AssignOp::Div => "/=",
                };
                write!(f, "{target} {op} {value}")
            }
            Expr::Member {
                object,
                property,
                computed,
            } => {
                write_operand(f, object)?;
                if *computed {
                    write!(f, "[{property}]")
                } else {
                    write!(f, ".{property}")
                }
            }
            Expr::Call { callee, args } => {
                write_operand(f, callee)?;
                f.write_char('(')?;
                write_list(f, args)?;
                f.write_char(')')
            }
            Expr::VariableDeclaration { kind, bindings } => {
                f.write_str(match kind {
                    DeclKind::Var => "var ",
                    DeclKind::Let => "let ",
                    DeclKind::Const => "const ",
                })?;
                for (i, decl) in bindings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(decl.name.as_str())?;
                    if let Some(init) = &decl.init {
                        write!(f, " = {init}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
