//! Dynamic numeric coercion.
//!
//! Integer operands stay integral until an operation overflows or mixes with
//! a float, at which point both sides are promoted to `f64`.

use std::cmp::Ordering;

use crate::errors::{division_by_zero, EvalError};
use crate::Value;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Numeric view of a value. Booleans and strings are not numbers.
    pub fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }

    /// Like [`Number::from_value`], but also parses numeric strings.
    pub fn coerce(value: &Value) -> Option<Number> {
        match value {
            Value::Str(s) => Number::parse(s),
            other => Number::from_value(other),
        }
    }

    pub fn parse(s: &str) -> Option<Number> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(Number::Int(n));
        }
        s.parse::<f64>().ok().map(Number::Float)
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(n) => Value::Int(n),
            Number::Float(x) => Value::Float(x),
        }
    }

    fn combine(
        self,
        rhs: Number,
        int_op: impl FnOnce(i64, i64) -> Option<i64>,
        float_op: impl FnOnce(f64, f64) -> f64,
    ) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
                Some(n) => Number::Int(n),
                None => Number::Float(float_op(a as f64, b as f64)),
            },
            (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
        }
    }

    #[must_use]
    pub fn add(self, rhs: Number) -> Number {
        self.combine(rhs, i64::checked_add, |a, b| a + b)
    }

    #[must_use]
    pub fn sub(self, rhs: Number) -> Number {
        self.combine(rhs, i64::checked_sub, |a, b| a - b)
    }

    #[must_use]
    pub fn mul(self, rhs: Number) -> Number {
        self.combine(rhs, i64::checked_mul, |a, b| a * b)
    }

    /// Two integers divide with truncation toward zero; a float operand
    /// promotes.
    pub fn div(self, rhs: Number) -> Result<Number, EvalError> {
        if let (Number::Int(_), Number::Int(0)) = (self, rhs) {
            return Err(division_by_zero());
        }
        Ok(self.combine(rhs, i64::checked_div, |a, b| a / b))
    }

    pub fn rem(self, rhs: Number) -> Result<Number, EvalError> {
        if let (Number::Int(_), Number::Int(0)) = (self, rhs) {
            return Err(division_by_zero());
        }
        Ok(self.combine(rhs, i64::checked_rem, |a, b| a % b))
    }

    #[must_use]
    pub fn pow(self, rhs: Number) -> Number {
        self.combine(
            rhs,
            |a, b| u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
            f64::powf,
        )
    }

    #[must_use]
    pub fn neg(self) -> Number {
        match self {
            Number::Int(n) => n.checked_neg().map_or(Number::Float(-(n as f64)), Number::Int),
            Number::Float(x) => Number::Float(-x),
        }
    }

    pub fn compare(self, rhs: Number) -> Option<Ordering> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }

    pub fn num_eq(self, rhs: Number) -> bool {
        self.compare(rhs) == Some(Ordering::Equal)
    }
}
