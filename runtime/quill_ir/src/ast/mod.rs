//! Expression tree.
//!
//! Nodes are immutable once parsed. Evaluation is implemented in `quill_eval`;
//! this module only provides structural equality and source printing (see
//! `print.rs`), the latter being what binding errors quote back to the user.

use std::sync::Arc;

use crate::Name;

mod print;

/// Literal constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// Loose equality (`==`), numeric-coercing.
    Eq,
    NotEq,
    /// Strict equality (`===`), no coercion between types.
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    /// `??`
    Coalesce,
}

impl BinaryOp {
    /// Operators whose right operand is evaluated conditionally.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The binary operator a compound assignment applies before storing.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    pub name: Name,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKey {
    Named(Name),
    Computed(Expr),
}

/// One `key: value` entry of an object literal.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Expr,
}

/// Expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Identifier(Name),
    Literal(Literal),
    Array(Vec<Expr>),
    Object(Vec<Property>),
    /// `...expr`, only valid inside call arguments and array literals.
    Spread(Box<Expr>),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assignment {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    VariableDeclaration {
        kind: DeclKind,
        bindings: Vec<Declarator>,
    },
}

impl Expr {
    pub fn ident(name: &str) -> Expr {
        Expr::Identifier(Name::intern(name))
    }

    pub fn string(s: &str) -> Expr {
        Expr::Literal(Literal::Str(Arc::from(s)))
    }

    pub fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Int(n))
    }

    pub fn null() -> Expr {
        Expr::Literal(Literal::Null)
    }

    pub fn as_identifier(&self) -> Option<Name> {
        match self {
            Expr::Identifier(name) => Some(*name),
            _ => None,
        }
    }

    /// Name a call resolves against: the identifier itself, or the property
    /// of a non-computed member (`a.b()` resolves `b` with `a` prepended).
    pub fn callee_name(&self) -> Option<Name> {
        match self {
            Expr::Identifier(name) => Some(*name),
            Expr::Member {
                property,
                computed: false,
                ..
            } => property.as_identifier(),
            _ => None,
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn member(object: Expr, property: Expr, computed: bool) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: Box::new(property),
            computed,
        }
    }
}

#[cfg(test)]
mod tests;
