//! Runtime values and arithmetic
//!
//! Every expression evaluates to one of four scalar values matching the
//! typed stores: BOOL, the signed 32-bit integer lane (INT/DINT/UINT all
//! promote here), REAL as f64, and TIME as a millisecond count.
//!
//! Arithmetic runs in the widest operand type: REAL wins over everything,
//! TIME over the integer lane. Integer division truncates toward zero
//! and modulo follows the sign of the dividend, which is exactly what
//! Rust's `/` and `%` do on integers.

use rungc::ast::{BinaryOp, UnaryOp};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Real(f64),
    /// Milliseconds
    Time(i64),
}

/// Arithmetic failure inside a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericError {
    DivisionByZero,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl Value {
    /// Boolean reading: numerics are true when non-zero
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Real(r) => *r != 0.0,
            Value::Time(ms) => *ms != 0,
        }
    }

    /// Integer-lane reading; booleans count as 0/1, reals truncate
    pub fn as_int(&self) -> i32 {
        match self {
            Value::Bool(b) => *b as i32,
            Value::Int(n) => *n,
            Value::Real(r) => *r as i32,
            Value::Time(ms) => (*ms).clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        }
    }

    pub fn as_real(&self) -> f64 {
        match self {
            Value::Bool(b) => *b as i32 as f64,
            Value::Int(n) => *n as f64,
            Value::Real(r) => *r,
            Value::Time(ms) => *ms as f64,
        }
    }

    pub fn as_time_ms(&self) -> i64 {
        match self {
            Value::Bool(b) => *b as i64,
            Value::Int(n) => *n as i64,
            Value::Real(r) => *r as i64,
            Value::Time(ms) => *ms,
        }
    }

    fn is_real(&self) -> bool {
        matches!(self, Value::Real(_))
    }

    fn is_time(&self) -> bool {
        matches!(self, Value::Time(_))
    }
}

/// Apply a binary operator with promotion to the widest operand type
pub fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, NumericError> {
    if op.is_boolean() {
        let l = left.truthy();
        let r = right.truthy();
        return Ok(Value::Bool(match op {
            BinaryOp::And => l && r,
            BinaryOp::Or => l || r,
            _ => l != r,
        }));
    }

    if op.is_comparison() {
        let ordering = if left.is_real() || right.is_real() {
            left.as_real().partial_cmp(&right.as_real())
        } else {
            Some(left.as_time_ms().cmp(&right.as_time_ms()))
        };
        // NaN compares false on everything except <>
        let result = match ordering {
            Some(ord) => match op {
                BinaryOp::Eq => ord.is_eq(),
                BinaryOp::Ne => ord.is_ne(),
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            },
            None => op == BinaryOp::Ne,
        };
        return Ok(Value::Bool(result));
    }

    // Arithmetic
    if left.is_real() || right.is_real() {
        let l = left.as_real();
        let r = right.as_real();
        let result = match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => {
                if r == 0.0 {
                    return Err(NumericError::DivisionByZero);
                }
                l / r
            }
            _ => {
                if r == 0.0 {
                    return Err(NumericError::DivisionByZero);
                }
                l % r
            }
        };
        return Ok(Value::Real(result));
    }

    if left.is_time() || right.is_time() {
        let l = left.as_time_ms();
        let r = right.as_time_ms();
        let result = match op {
            BinaryOp::Add => l.wrapping_add(r),
            BinaryOp::Sub => l.wrapping_sub(r),
            BinaryOp::Mul => l.wrapping_mul(r),
            BinaryOp::Div => {
                if r == 0 {
                    return Err(NumericError::DivisionByZero);
                }
                l.wrapping_div(r)
            }
            _ => {
                if r == 0 {
                    return Err(NumericError::DivisionByZero);
                }
                l.wrapping_rem(r)
            }
        };
        return Ok(Value::Time(result));
    }

    let l = left.as_int();
    let r = right.as_int();
    let result = match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div => {
            if r == 0 {
                return Err(NumericError::DivisionByZero);
            }
            l.wrapping_div(r)
        }
        _ => {
            if r == 0 {
                return Err(NumericError::DivisionByZero);
            }
            l.wrapping_rem(r)
        }
    };
    Ok(Value::Int(result))
}

pub fn apply_unary(op: UnaryOp, operand: Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!operand.truthy()),
        UnaryOp::Neg => match operand {
            Value::Real(r) => Value::Real(-r),
            Value::Time(ms) => Value::Time(ms.wrapping_neg()),
            other => Value::Int(other.as_int().wrapping_neg()),
        },
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(r) => write!(f, "{}", r),
            Value::Time(ms) => write!(f, "{}", rungc::timeval::format_time_ms(*ms)),
        }
    }
}
