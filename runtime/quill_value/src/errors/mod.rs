//! Error taxonomy for template and Lisp evaluation.
//!
//! Factory functions are the public construction API; they keep messages
//! consistent between the two languages. `EvalError::is_fatal` decides whether
//! an error may be offered to an error-capture binding or must abort the
//! render outright.

use std::fmt;

use crate::value::Value;

/// Result of evaluation.
pub type EvalResult = Result<Value, EvalError>;

/// Lisp evaluation frames retained on an error.
pub const MAX_TRACE_FRAMES: usize = 10;

/// Ceiling that a runaway render or interpreter can hit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Quota {
    Evaluations,
    StackDepth,
    Iterations,
    LispDepth,
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quota::Evaluations => "max evaluations",
            Quota::StackDepth => "max stack depth",
            Quota::Iterations => "max iterations",
            Quota::LispDepth => "max lisp depth",
        })
    }
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalErrorKind {
    #[error("syntax error: {message}")]
    Syntax { message: String },

    /// Member or assignment resolution failed at runtime.
    #[error("failed to evaluate '{expression}': {message}")]
    Binding { expression: String, message: String },

    #[error("{message}")]
    Lisp { message: String },

    /// No filter or method matched the requested name and arity.
    #[error("{message}")]
    Dispatch {
        name: String,
        message: String,
        candidates: Vec<String>,
    },

    #[error("exceeded {quota} of {limit}")]
    QuotaExceeded { quota: Quota, limit: u64 },

    /// Failure inside a native filter or builtin body.
    #[error("{message} -- {function}")]
    NativeFault { function: String, message: String },

    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },

    #[error("render was cancelled")]
    Cancelled,

    /// Raised deliberately by script code.
    #[error("{message}")]
    Thrown { message: String },

    /// Operator and conversion failures.
    #[error("{message}")]
    Runtime { message: String },
}

impl EvalErrorKind {
    /// Short category label exposed to scripts as `error.kind`.
    pub fn label(&self) -> &'static str {
        match self {
            EvalErrorKind::Syntax { .. } => "SyntaxError",
            EvalErrorKind::Binding { .. } => "BindingError",
            EvalErrorKind::Lisp { .. } => "LispEvalError",
            EvalErrorKind::Dispatch { .. } => "DispatchError",
            EvalErrorKind::QuotaExceeded { .. } => "QuotaExceeded",
            EvalErrorKind::NativeFault { .. } => "NativeFault",
            EvalErrorKind::NotImplemented { .. } => "NotImplemented",
            EvalErrorKind::Cancelled => "Cancelled",
            EvalErrorKind::Thrown { .. } => "Error",
            EvalErrorKind::Runtime { .. } => "RuntimeError",
        }
    }
}

/// Evaluation error with the call trace collected while it propagated.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Innermost frame first.
    pub trace: Vec<String>,
    pub notes: Vec<String>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvalError {
            kind,
            trace: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Fatal errors bypass error-capture bindings and abort the render.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            EvalErrorKind::QuotaExceeded { .. }
                | EvalErrorKind::Dispatch { .. }
                | EvalErrorKind::NotImplemented { .. }
                | EvalErrorKind::Cancelled
        )
    }

    /// Append an enclosing frame, keeping at most [`MAX_TRACE_FRAMES`].
    #[must_use]
    pub fn with_frame(mut self, frame: impl FnOnce() -> String) -> Self {
        if self.trace.len() < MAX_TRACE_FRAMES {
            self.trace.push(frame());
        }
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Trace formatted one frame per line, `   at <frame>`.
    pub fn stack_trace(&self) -> String {
        format_trace(&self.trace)
    }
}

/// Format frames one per line as `   at <frame>`.
pub fn format_trace(frames: &[String]) -> String {
    let mut out = String::new();
    for frame in frames {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("   at ");
        out.push_str(frame);
    }
    out
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        EvalError::new(kind)
    }
}

// Factories

pub fn syntax_error(message: impl Into<String>) -> EvalError {
    EvalErrorKind::Syntax {
        message: message.into(),
    }
    .into()
}

pub fn binding_failure(expression: impl fmt::Display, message: impl Into<String>) -> EvalError {
    EvalErrorKind::Binding {
        expression: expression.to_string(),
        message: message.into(),
    }
    .into()
}

pub fn lisp_error(message: impl Into<String>) -> EvalError {
    EvalErrorKind::Lisp {
        message: message.into(),
    }
    .into()
}

/// Lisp error naming the offending datum, `message: irritant`.
pub fn lisp_error_with(message: &str, irritant: impl fmt::Display) -> EvalError {
    lisp_error(format!("{message}: {irritant}"))
}

/// Dispatch failure listing near-miss candidates.
pub fn missing_method(name: &str, arity: usize, candidates: Vec<String>) -> EvalError {
    let mut message = format!("Filter in '{name}' with {arity} argument(s) was not found.");
    if !candidates.is_empty() {
        message.push_str(" Similar filters: ");
        message.push_str(&candidates.join(", "));
    }
    EvalErrorKind::Dispatch {
        name: name.to_owned(),
        message,
        candidates,
    }
    .into()
}

pub fn quota_exceeded(quota: Quota, limit: u64) -> EvalError {
    EvalErrorKind::QuotaExceeded { quota, limit }.into()
}

pub fn native_fault(function: impl Into<String>, message: impl Into<String>) -> EvalError {
    EvalErrorKind::NativeFault {
        function: function.into(),
        message: message.into(),
    }
    .into()
}

pub fn not_implemented(feature: impl Into<String>) -> EvalError {
    EvalErrorKind::NotImplemented {
        feature: feature.into(),
    }
    .into()
}

pub fn cancelled() -> EvalError {
    EvalErrorKind::Cancelled.into()
}

pub fn thrown(message: impl Into<String>) -> EvalError {
    EvalErrorKind::Thrown {
        message: message.into(),
    }
    .into()
}

pub fn runtime_error(message: impl Into<String>) -> EvalError {
    EvalErrorKind::Runtime {
        message: message.into(),
    }
    .into()
}

pub fn type_mismatch(op: &str, left: &str, right: &str) -> EvalError {
    runtime_error(format!("cannot apply '{op}' to {left} and {right}"))
}

pub fn wrong_arg_count(name: &str, expected: usize, got: usize) -> EvalError {
    runtime_error(format!(
        "'{name}' expects {expected} argument(s) but was given {got}"
    ))
}

pub fn division_by_zero() -> EvalError {
    runtime_error("division by zero")
}
