//! Quill IR - shared syntax model for the quill scripting runtime.
//!
//! # Architecture
//!
//! - [`Name`]: 32-bit interned identifier backed by a process-wide [`StringInterner`]
//! - [`Span`]: byte range into template source
//! - [`Expr`]: immutable expression tree produced by `quill_parse`
//! - [`PageFragment`]: the unit a template page is split into (text, variable,
//!   block, statement list)
//!
//! Trees are read-only after construction. Evaluation lives in `quill_eval`,
//! which only needs structural equality and printing from this crate.

mod ast;
mod fragment;
mod interner;
mod name;
mod span;

pub use ast::{
    AssignOp, BinaryOp, DeclKind, Declarator, Expr, Literal, Property, PropertyKey, UnaryOp,
};
pub use fragment::{
    BlockBody, BlockFragment, ElseBlock, FilterCall, PageFragment, StatementFragment,
    VariableFragment,
};
pub use interner::{InternError, StringInterner};
pub use name::Name;
pub use span::Span;
