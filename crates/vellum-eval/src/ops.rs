//! Binary operator semantics. Integer arithmetic wraps; division and modulo
//! by zero fail; `%` with a string left-hand side is printf-style formatting.

use vellum_core::{BinOp, EvalResult, SourceLoc, Value};

use crate::eval::Evaluator;
use crate::format::format_multi;

impl<'e> Evaluator<'e> {
    pub(crate) fn apply_bin_op(
        &self,
        op: BinOp,
        left: &Value,
        right: &Value,
        loc: SourceLoc,
    ) -> EvalResult {
        // Range operators build integer arrays
        if matches!(op, BinOp::RangeExclusive | BinOp::RangeInclusive) {
            let (Some(start), Some(end)) = (left.as_int(), right.as_int()) else {
                return Err(self.err("Range operands must be integers", loc));
            };
            let end = if op == BinOp::RangeInclusive {
                end.saturating_add(1)
            } else {
                end
            };
            let range: Vec<Value> = (start..end).map(Value::int).collect();
            return Ok(Value::array(range));
        }

        // Equality works on all types
        if op == BinOp::Eq {
            return Ok(Value::bool(left == right));
        }
        if op == BinOp::Ne {
            return Ok(Value::bool(left != right));
        }

        // String concatenation
        if op == BinOp::Add {
            if let (Value::String(a), Value::String(b)) = (left, right) {
                let mut out = a.borrow().clone();
                out.extend_from_slice(&b.borrow());
                return Ok(Value::string(out));
            }
            // Array concatenation produces a new array; operands unchanged
            if let (Value::Array(a), Value::Array(b)) = (left, right) {
                let mut out = a.borrow().clone();
                out.extend_from_slice(&b.borrow());
                return Ok(Value::array(out));
            }
        }

        // printf-style formatting: "fmt" % value or "fmt" % [values...]
        if op == BinOp::Rem {
            if let Value::String(fmt) = left {
                let fmt = fmt.borrow().clone();
                let formatted = match right {
                    Value::Array(values) => {
                        let values: Vec<Value> = values.borrow().clone();
                        format_multi(&fmt, &values, Some(&self.interner.borrow()))
                    }
                    single => format_multi(
                        &fmt,
                        std::slice::from_ref(single),
                        Some(&self.interner.borrow()),
                    ),
                };
                return formatted
                    .map(Value::string)
                    .map_err(|message| self.err(message, loc));
            }
        }

        // Numeric arithmetic and comparison, Int+Int stays Int
        if left.is_numeric() && right.is_numeric() {
            let use_float = left.is_float() || right.is_float();
            match op {
                BinOp::Add => {
                    return Ok(if use_float {
                        Value::float(left.as_number().unwrap() + right.as_number().unwrap())
                    } else {
                        Value::int(left.as_int().unwrap().wrapping_add(right.as_int().unwrap()))
                    });
                }
                BinOp::Sub => {
                    return Ok(if use_float {
                        Value::float(left.as_number().unwrap() - right.as_number().unwrap())
                    } else {
                        Value::int(left.as_int().unwrap().wrapping_sub(right.as_int().unwrap()))
                    });
                }
                BinOp::Mul => {
                    return Ok(if use_float {
                        Value::float(left.as_number().unwrap() * right.as_number().unwrap())
                    } else {
                        Value::int(left.as_int().unwrap().wrapping_mul(right.as_int().unwrap()))
                    });
                }
                BinOp::Div => {
                    if use_float {
                        let divisor = right.as_number().unwrap();
                        if divisor == 0.0 {
                            return Err(self.err("Division by zero", loc));
                        }
                        return Ok(Value::float(left.as_number().unwrap() / divisor));
                    }
                    let divisor = right.as_int().unwrap();
                    if divisor == 0 {
                        return Err(self.err("Division by zero", loc));
                    }
                    // Truncating division
                    return Ok(Value::int(left.as_int().unwrap().wrapping_div(divisor)));
                }
                BinOp::Rem => {
                    if use_float {
                        let divisor = right.as_number().unwrap();
                        if divisor == 0.0 {
                            return Err(self.err("Modulo by zero", loc));
                        }
                        return Ok(Value::float(left.as_number().unwrap() % divisor));
                    }
                    let divisor = right.as_int().unwrap();
                    if divisor == 0 {
                        return Err(self.err("Modulo by zero", loc));
                    }
                    // C-style: result takes the sign of the dividend
                    return Ok(Value::int(left.as_int().unwrap().wrapping_rem(divisor)));
                }
                BinOp::Lt => {
                    return Ok(Value::bool(
                        left.as_number().unwrap() < right.as_number().unwrap(),
                    ));
                }
                BinOp::Gt => {
                    return Ok(Value::bool(
                        left.as_number().unwrap() > right.as_number().unwrap(),
                    ));
                }
                BinOp::Le => {
                    return Ok(Value::bool(
                        left.as_number().unwrap() <= right.as_number().unwrap(),
                    ));
                }
                BinOp::Ge => {
                    return Ok(Value::bool(
                        left.as_number().unwrap() >= right.as_number().unwrap(),
                    ));
                }
                _ => {}
            }
        }

        // Lexicographic string comparison (byte order)
        if let (Value::String(a), Value::String(b)) = (left, right) {
            let a = a.borrow();
            let b = b.borrow();
            let result = match op {
                BinOp::Lt => Some(a.as_slice() < b.as_slice()),
                BinOp::Gt => Some(a.as_slice() > b.as_slice()),
                BinOp::Le => Some(a.as_slice() <= b.as_slice()),
                BinOp::Ge => Some(a.as_slice() >= b.as_slice()),
                _ => None,
            };
            if let Some(result) = result {
                return Ok(Value::bool(result));
            }
        }

        Err(self.err(
            format!(
                "Cannot apply '{}' to {} and {}",
                op,
                left.type_name(),
                right.type_name()
            ),
            loc,
        ))
    }
}
