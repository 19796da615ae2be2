//! Arithmetic, bitwise, comparison and string primitives.
//!
//! Numeric promotion: two integers stay integral (wrapping, two's
//! complement); any float operand promotes the operation to floats.
//! Integer division truncates toward zero and rejects a zero divisor;
//! float division follows IEEE-754. Bitwise operations and `%` are
//! integer-only; shift counts are masked mod 64.

use crate::error::RuntimeError;
use crate::value::Value;

use std::cmp::Ordering;
use std::rc::Rc;

enum NumPair {
    Int(i64, i64),
    Float(f64, f64),
}

fn num_pair(l: &Value, r: &Value) -> Result<NumPair, RuntimeError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(NumPair::Int(*a, *b)),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(NumPair::Float(a, b)),
            _ => {
                let offender = if l.is_number() { r } else { l };
                Err(RuntimeError::TypeMismatch {
                    expected: "number",
                    found: offender.type_name(),
                })
            }
        },
    }
}

fn int_pair(l: &Value, r: &Value) -> Result<(i64, i64), RuntimeError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        (Value::Int(_), other) | (other, _) => Err(RuntimeError::TypeMismatch {
            expected: "integer",
            found: other.type_name(),
        }),
    }
}

pub(crate) fn add(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    Ok(match num_pair(l, r)? {
        NumPair::Int(a, b) => Value::Int(a.wrapping_add(b)),
        NumPair::Float(a, b) => Value::Float(a + b),
    })
}

pub(crate) fn sub(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    Ok(match num_pair(l, r)? {
        NumPair::Int(a, b) => Value::Int(a.wrapping_sub(b)),
        NumPair::Float(a, b) => Value::Float(a - b),
    })
}

pub(crate) fn mul(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    Ok(match num_pair(l, r)? {
        NumPair::Int(a, b) => Value::Int(a.wrapping_mul(b)),
        NumPair::Float(a, b) => Value::Float(a * b),
    })
}

pub(crate) fn div(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    match num_pair(l, r)? {
        NumPair::Int(_, 0) => Err(RuntimeError::DivisionByZero),
        NumPair::Int(a, b) => Ok(Value::Int(a.wrapping_div(b))),
        NumPair::Float(a, b) => Ok(Value::Float(a / b)),
    }
}

pub(crate) fn rem(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    match int_pair(l, r)? {
        (_, 0) => Err(RuntimeError::DivisionByZero),
        (a, b) => Ok(Value::Int(a.wrapping_rem(b))),
    }
}

pub(crate) fn neg(v: &Value) -> Result<Value, RuntimeError> {
    match v {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(RuntimeError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
        }),
    }
}

/// INC/DEC: mutate-in-place arithmetic with a ±1 delta.
pub(crate) fn step_by(v: &Value, delta: i64) -> Result<Value, RuntimeError> {
    match v {
        Value::Int(i) => Ok(Value::Int(i.wrapping_add(delta))),
        Value::Float(f) => Ok(Value::Float(f + delta as f64)),
        other => Err(RuntimeError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
        }),
    }
}

pub(crate) fn bit_and(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    int_pair(l, r).map(|(a, b)| Value::Int(a & b))
}

pub(crate) fn bit_or(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    int_pair(l, r).map(|(a, b)| Value::Int(a | b))
}

pub(crate) fn bit_xor(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    int_pair(l, r).map(|(a, b)| Value::Int(a ^ b))
}

pub(crate) fn shl(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    int_pair(l, r).map(|(a, b)| Value::Int(a.wrapping_shl(b as u32)))
}

pub(crate) fn shr(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    int_pair(l, r).map(|(a, b)| Value::Int(a.wrapping_shr(b as u32)))
}

pub(crate) fn bit_not(v: &Value) -> Result<Value, RuntimeError> {
    match v {
        Value::Int(i) => Ok(Value::Int(!i)),
        other => Err(RuntimeError::TypeMismatch {
            expected: "integer",
            found: other.type_name(),
        }),
    }
}

pub(crate) fn log_not(v: &Value) -> Result<Value, RuntimeError> {
    match v {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(RuntimeError::TypeMismatch {
            expected: "bool",
            found: other.type_name(),
        }),
    }
}

pub(crate) fn concat(l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::Str(Rc::from(joined.as_str())))
        }
        (Value::Str(_), other) | (other, _) => Err(RuntimeError::TypeMismatch {
            expected: "string",
            found: other.type_name(),
        }),
    }
}

pub(crate) fn compare(l: &Value, r: &Value) -> Result<Ordering, RuntimeError> {
    l.try_cmp(r).ok_or(RuntimeError::NotComparable {
        left: l.type_name(),
        right: r.type_name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_ops_stay_integral_and_wrap() {
        assert_eq!(add(&Value::Int(i64::MAX), &Value::Int(1)).unwrap(), Value::Int(i64::MIN));
        assert_eq!(mul(&Value::Int(3), &Value::Int(4)).unwrap(), Value::Int(12));
    }

    #[test]
    fn float_contaminates() {
        assert_eq!(add(&Value::Int(1), &Value::Float(0.5)).unwrap(), Value::Float(1.5));
        assert_eq!(div(&Value::Float(1.0), &Value::Int(0)).unwrap(), Value::Float(f64::INFINITY));
    }

    #[test]
    fn integer_division_truncates_and_guards_zero() {
        assert_eq!(div(&Value::Int(7), &Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(div(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-3));
        assert_eq!(
            div(&Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            rem(&Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn modulo_is_integer_only() {
        assert!(matches!(
            rem(&Value::Float(1.0), &Value::Int(1)),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn comparing_number_and_string_fails() {
        assert_eq!(
            compare(&Value::Int(1), &Value::from("1")),
            Err(RuntimeError::NotComparable {
                left: "number",
                right: "string",
            })
        );
    }

    #[test]
    fn concat_requires_strings() {
        assert_eq!(
            concat(&Value::from("ab"), &Value::from("cd")).unwrap(),
            Value::from("abcd")
        );
        assert!(concat(&Value::from("ab"), &Value::Int(1)).is_err());
    }
}
