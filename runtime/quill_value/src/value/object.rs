//! Duck-typed host objects.

use std::any::Any;
use std::fmt;

use crate::errors::{runtime_error, EvalError, EvalResult};
use crate::Value;

/// An embedder type exposed to scripts.
///
/// Every accessor has a "not found" default. `Ok(None)` from a getter means
/// the member does not exist and the script sees `null`; `Err` is a real
/// failure and surfaces as a binding error.
pub trait HostObject: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    /// Public property or field by name.
    fn get_member(&self, _name: &str) -> Result<Option<Value>, EvalError> {
        Ok(None)
    }

    /// Indexer access, `obj[key]`.
    fn get_index(&self, _key: &Value) -> Result<Option<Value>, EvalError> {
        Ok(None)
    }

    fn set_member(&self, name: &str, _value: Value) -> Result<(), EvalError> {
        Err(runtime_error(format!(
            "{} has no settable member '{name}'",
            self.type_name()
        )))
    }

    fn set_index(&self, _key: &Value, _value: Value) -> Result<(), EvalError> {
        Err(runtime_error(format!(
            "{} does not support indexed assignment",
            self.type_name()
        )))
    }

    /// Instance method call. `None` when no such method exists.
    fn call_method(&self, _name: &str, _args: &[Value]) -> Option<EvalResult> {
        None
    }

    /// Items when the object is enumerable.
    fn items(&self) -> Option<Vec<Value>> {
        None
    }

    /// Text written when the object is rendered.
    fn display(&self) -> String {
        self.type_name().to_owned()
    }

    fn as_any(&self) -> &dyn Any;
}
