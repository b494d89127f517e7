//! Output streams.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use quill_value::EvalError;

/// Rewrites a fully buffered stream.
pub type StreamTransformer = Arc<dyn Fn(Vec<u8>) -> Result<Vec<u8>, EvalError> + Send + Sync>;

/// In-memory byte stream a scope writes into.
///
/// Clones share the buffer; [`OutputStream::new`] starts a fresh sub-stream.
#[derive(Clone, Debug, Default)]
pub struct OutputStream(Rc<RefCell<Vec<u8>>>);

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_str(&self, s: &str) {
        self.0.borrow_mut().extend_from_slice(s.as_bytes());
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        self.0.borrow_mut().extend_from_slice(bytes);
    }

    pub fn bytes(&self) -> Ref<'_, Vec<u8>> {
        self.0.borrow()
    }

    /// Drain the buffer.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    /// Drain the buffer as text, replacing invalid UTF-8.
    pub fn take_string(&self) -> String {
        match String::from_utf8(self.take()) {
            Ok(s) => s,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
