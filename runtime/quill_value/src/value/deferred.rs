//! In-flight values.
//!
//! A filter may hand back work that has not run yet. The render pipeline
//! resolves it before passing the result to the next stage.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::EvalResult;

type Pending = Box<dyn FnOnce() -> EvalResult + Send>;

enum State {
    Pending(Pending),
    Running,
    Done(EvalResult),
}

/// Lazily computed value, resolved at most once.
#[derive(Clone)]
pub struct Deferred(Arc<Mutex<State>>);

impl Deferred {
    pub fn new(f: impl FnOnce() -> EvalResult + Send + 'static) -> Self {
        Deferred(Arc::new(Mutex::new(State::Pending(Box::new(f)))))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.0.lock(), State::Done(_))
    }

    /// Run the pending work, or return the cached outcome.
    pub fn resolve(&self) -> EvalResult {
        let pending = {
            let mut state = self.0.lock();
            match std::mem::replace(&mut *state, State::Running) {
                State::Pending(f) => f,
                State::Done(result) => {
                    *state = State::Done(result.clone());
                    return result;
                }
                State::Running => {
                    return Err(crate::errors::runtime_error(
                        "deferred value resolved re-entrantly",
                    ))
                }
            }
        };
        let result = pending();
        *self.0.lock() = State::Done(result.clone());
        result
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            f.write_str("Deferred(resolved)")
        } else {
            f.write_str("Deferred(pending)")
        }
    }
}
