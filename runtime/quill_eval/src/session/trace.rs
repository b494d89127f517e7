//! Live page/partial stack of a render.

use quill_value::errors::{format_trace, quota_exceeded};
use quill_value::{EvalError, Quota};

/// Pages and partials currently being rendered, outermost first.
///
/// The depth check is part of [`CallTrace::push`], so a nested render that
/// would exceed the ceiling is never entered.
#[derive(Clone, Debug)]
pub struct CallTrace {
    frames: Vec<String>,
    max_depth: usize,
}

impl CallTrace {
    pub fn new(max_depth: usize) -> Self {
        CallTrace {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a frame. The frame is not pushed when the ceiling is reached.
    pub fn push(&mut self, frame: String) -> Result<(), EvalError> {
        if self.frames.len() >= self.max_depth {
            return Err(quota_exceeded(Quota::StackDepth, self.max_depth as u64));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        debug_assert!(!self.frames.is_empty(), "CallTrace::pop() on empty trace");
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost frame first.
    pub fn capture(&self) -> Vec<String> {
        self.frames.iter().rev().cloned().collect()
    }

    /// Error frames followed by the live frames, one `   at` line each.
    pub fn format_with(&self, err: &EvalError) -> String {
        let mut frames = err.trace.clone();
        frames.extend(self.capture());
        format_trace(&frames)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use quill_value::EvalErrorKind;

    #[test]
    fn test_push_respects_ceiling() {
        let mut trace = CallTrace::new(2);
        trace.push("a".into()).unwrap();
        trace.push("b".into()).unwrap();
        let err = trace.push("c".into()).unwrap_err();
        assert!(matches!(
            err.kind,
            EvalErrorKind::QuotaExceeded {
                quota: Quota::StackDepth,
                limit: 2
            }
        ));
        assert_eq!(trace.depth(), 2);
        trace.pop();
        assert_eq!(trace.capture(), vec!["a".to_owned()]);
    }

    #[test]
    fn test_format_with_error_frames_first() {
        let mut trace = CallTrace::new(4);
        trace.push("page 'index'".into()).unwrap();
        let err = quill_value::errors::thrown("boom").with_frame(|| "{{ x | f }}".into());
        assert_eq!(
            trace.format_with(&err),
            "   at {{ x | f }}\n   at page 'index'"
        );
    }
}
