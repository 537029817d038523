//! The built-in function catalog installed into every engine's global scope:
//! math, comparison, string, type conversion, I/O and the `map` constructor.
//! These are deliberately lenient about arity; missing arguments generally
//! yield Nil rather than an error.

use rand::Rng;

use vellum_core::{MapData, ScriptError, SourceLoc, Value};
use vellum_eval::format::format_multi;

use crate::engine::ScriptEngine;

pub fn register_builtins(engine: &ScriptEngine) {
    register_math_builtins(engine);
    register_comparison_builtins(engine);
    register_string_builtins(engine);
    register_type_builtins(engine);
    register_io_builtins(engine);
    register_map_constructor(engine);
}

// ---- Math ----

fn register_math_builtins(engine: &ScriptEngine) {
    engine.register_function("abs", |_ctx, args| {
        Ok(match args.first() {
            Some(Value::Int(n)) => Value::int(n.wrapping_abs()),
            Some(Value::Float(f)) => Value::float(f.abs()),
            _ => Value::Nil,
        })
    });

    engine.register_function("min", |_ctx, args| {
        if args.len() < 2 {
            return Ok(args.first().cloned().unwrap_or(Value::Nil));
        }
        Ok(numeric_pair(&args[0], &args[1], i64::min, f64::min))
    });

    engine.register_function("max", |_ctx, args| {
        if args.len() < 2 {
            return Ok(args.first().cloned().unwrap_or(Value::Nil));
        }
        Ok(numeric_pair(&args[0], &args[1], i64::max, f64::max))
    });

    engine.register_function("floor", |_ctx, args| {
        Ok(match args.first() {
            Some(v @ Value::Int(_)) => v.clone(),
            Some(Value::Float(f)) => Value::int(f.floor() as i64),
            _ => Value::Nil,
        })
    });

    engine.register_function("ceil", |_ctx, args| {
        Ok(match args.first() {
            Some(v @ Value::Int(_)) => v.clone(),
            Some(Value::Float(f)) => Value::int(f.ceil() as i64),
            _ => Value::Nil,
        })
    });

    engine.register_function("round", |_ctx, args| {
        Ok(match args.first() {
            Some(v @ Value::Int(_)) => v.clone(),
            Some(Value::Float(f)) => Value::int(f.round() as i64),
            _ => Value::Nil,
        })
    });

    engine.register_function("sqrt", |_ctx, args| {
        Ok(match args.first().and_then(|v| v.as_number()) {
            Some(n) => Value::float(n.sqrt()),
            None => Value::Nil,
        })
    });

    engine.register_function("pow", |_ctx, args| {
        if args.len() < 2 {
            return Ok(Value::Nil);
        }
        let (Some(base), Some(exp)) = (args[0].as_number(), args[1].as_number()) else {
            return Ok(Value::Nil);
        };
        let result = base.powf(exp);
        let both_int = args[0].is_int() && args[1].is_int();
        // Integer base and exponent with an integral result stays Int
        if both_int
            && result == result.floor()
            && result >= i64::MIN as f64
            && result <= i64::MAX as f64
        {
            return Ok(Value::int(result as i64));
        }
        Ok(Value::float(result))
    });

    engine.register_function("sin", |_ctx, args| {
        Ok(match args.first().and_then(|v| v.as_number()) {
            Some(n) => Value::float(n.sin()),
            None => Value::Nil,
        })
    });

    engine.register_function("cos", |_ctx, args| {
        Ok(match args.first().and_then(|v| v.as_number()) {
            Some(n) => Value::float(n.cos()),
            None => Value::Nil,
        })
    });

    engine.register_function("tan", |_ctx, args| {
        Ok(match args.first().and_then(|v| v.as_number()) {
            Some(n) => Value::float(n.tan()),
            None => Value::Nil,
        })
    });

    engine.register_function("random", |_ctx, _args| {
        Ok(Value::int(rand::rng().random::<u32>() as i64))
    });

    engine.register_function("random_range", |_ctx, args| {
        if args.len() < 2 {
            return Ok(Value::Nil);
        }
        let (Some(lo), Some(hi)) = (args[0].as_int(), args[1].as_int()) else {
            return Ok(Value::Nil);
        };
        if lo > hi {
            return Ok(Value::Nil);
        }
        Ok(Value::int(rand::rng().random_range(lo..=hi)))
    });

    engine.register_function("random_float", |_ctx, _args| {
        Ok(Value::float(rand::rng().random::<f64>()))
    });
}

fn numeric_pair(a: &Value, b: &Value, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Value {
    if a.is_float() || b.is_float() {
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Value::float(float_op(x, y)),
            _ => Value::Nil,
        }
    } else {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Value::int(int_op(x, y)),
            _ => Value::Nil,
        }
    }
}

// ---- Comparison ----

fn register_comparison_builtins(engine: &ScriptEngine) {
    engine.register_function("eq", |_ctx, args| {
        if args.len() < 2 {
            return Ok(Value::bool(false));
        }
        Ok(Value::bool(args[0] == args[1]))
    });

    engine.register_function("ne", |_ctx, args| {
        if args.len() < 2 {
            return Ok(Value::bool(true));
        }
        Ok(Value::bool(args[0] != args[1]))
    });

    engine.register_function("lt", |_ctx, args| numeric_compare(args, |a, b| a < b));
    engine.register_function("gt", |_ctx, args| numeric_compare(args, |a, b| a > b));
    engine.register_function("le", |_ctx, args| numeric_compare(args, |a, b| a <= b));
    engine.register_function("ge", |_ctx, args| numeric_compare(args, |a, b| a >= b));
}

fn numeric_compare(args: &[Value], op: fn(f64, f64) -> bool) -> Result<Value, ScriptError> {
    if args.len() < 2 {
        return Ok(Value::bool(false));
    }
    match (args[0].as_number(), args[1].as_number()) {
        (Some(a), Some(b)) => Ok(Value::bool(op(a, b))),
        _ => Ok(Value::bool(false)),
    }
}

// ---- String ----

fn register_string_builtins(engine: &ScriptEngine) {
    engine.register_function("str_length", |_ctx, args| {
        Ok(match args.first() {
            Some(Value::String(s)) => Value::int(s.borrow().len() as i64),
            _ => Value::int(0),
        })
    });

    engine.register_function("str_concat", |ctx, args| {
        let mut out: Vec<u8> = Vec::new();
        let interner = ctx.interner().borrow();
        for arg in args {
            match arg {
                Value::String(s) => out.extend_from_slice(&s.borrow()),
                other => out.extend_from_slice(other.to_display_string(Some(&interner)).as_bytes()),
            }
        }
        drop(interner);
        Ok(Value::string(out))
    });

    engine.register_function("str_substr", |_ctx, args| {
        let (Some(Value::String(s)), Some(start)) = (args.first(), args.get(1).and_then(|v| v.as_int()))
        else {
            return Ok(Value::Nil);
        };
        let bytes = s.borrow();
        // Unsigned-cast semantics: a negative start lands past the end and
        // yields an empty string, a negative length clamps to the end
        let start = start as usize;
        if start >= bytes.len() {
            return Ok(Value::string(Vec::new()));
        }
        let end = match args.get(2).and_then(|v| v.as_int()) {
            Some(len) => start.saturating_add(len as usize).min(bytes.len()),
            None => bytes.len(),
        };
        Ok(Value::string(bytes[start..end].to_vec()))
    });

    engine.register_function("str_find", |_ctx, args| {
        let (Some(Value::String(s)), Some(Value::String(needle))) = (args.first(), args.get(1))
        else {
            return Ok(Value::int(-1));
        };
        let haystack = s.borrow();
        let needle = needle.borrow();
        Ok(match find_in_bytes(&haystack, &needle) {
            Some(pos) => Value::int(pos as i64),
            None => Value::int(-1),
        })
    });

    engine.register_function("str_upper", |_ctx, args| {
        Ok(match args.first() {
            Some(Value::String(s)) => {
                let mut bytes = s.borrow().clone();
                bytes.make_ascii_uppercase();
                Value::string(bytes)
            }
            _ => Value::Nil,
        })
    });

    engine.register_function("str_lower", |_ctx, args| {
        Ok(match args.first() {
            Some(Value::String(s)) => {
                let mut bytes = s.borrow().clone();
                bytes.make_ascii_lowercase();
                Value::string(bytes)
            }
            _ => Value::Nil,
        })
    });

    // format "fmt" arg1 arg2 ... : multi-arg printf-style formatting
    engine.register_function("format", |ctx, args| {
        let Some(Value::String(fmt)) = args.first() else {
            return Ok(Value::Nil);
        };
        let fmt = fmt.borrow().clone();
        format_multi(&fmt, &args[1..], Some(&ctx.interner().borrow()))
            .map(Value::string)
            .map_err(|message| ScriptError::runtime(message, SourceLoc::default()))
    });
}

fn find_in_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ---- Type conversion ----

/// Parse a leading integer, `strtoll`-style: optional whitespace and sign,
/// then digits; trailing bytes are ignored. None if there are no digits or
/// the value overflows.
fn parse_int_prefix(bytes: &[u8]) -> Option<i64> {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let negative = match bytes.get(i) {
        Some(&b'-') => {
            i += 1;
            true
        }
        Some(&b'+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let digits_start = i;
    let mut value: i64 = 0;
    while let Some(&b) = bytes.get(i) {
        if !b.is_ascii_digit() {
            break;
        }
        let digit = (b - b'0') as i64;
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    Some(value)
}

/// Parse a leading float, `strtod`-style: optional whitespace and sign,
/// digits with an optional fraction and exponent; trailing bytes are
/// ignored.
fn parse_float_prefix(bytes: &[u8]) -> Option<f64> {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let start = i;
    if matches!(bytes.get(i), Some(&b'+') | Some(&b'-')) {
        i += 1;
    }
    let mut any_digits = false;
    while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
        i += 1;
        any_digits = true;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
            i += 1;
            any_digits = true;
        }
    }
    if !any_digits {
        return None;
    }
    let mut end = i;
    // Exponent only counts when at least one digit follows the marker
    if matches!(bytes.get(i), Some(&b'e') | Some(&b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(&b'+') | Some(&b'-')) {
            j += 1;
        }
        if matches!(bytes.get(j), Some(b) if b.is_ascii_digit()) {
            while matches!(bytes.get(j), Some(b) if b.is_ascii_digit()) {
                j += 1;
            }
            end = j;
        }
    }
    std::str::from_utf8(&bytes[start..end]).ok()?.parse().ok()
}

fn register_type_builtins(engine: &ScriptEngine) {
    engine.register_function("to_int", |_ctx, args| {
        Ok(match args.first() {
            Some(v @ Value::Int(_)) => v.clone(),
            Some(Value::Float(f)) => Value::int(*f as i64),
            Some(Value::Bool(b)) => Value::int(if *b { 1 } else { 0 }),
            Some(Value::String(s)) => match parse_int_prefix(&s.borrow()) {
                Some(n) => Value::int(n),
                None => Value::Nil,
            },
            _ => Value::Nil,
        })
    });

    engine.register_function("to_float", |_ctx, args| {
        Ok(match args.first() {
            Some(v @ Value::Float(_)) => v.clone(),
            Some(Value::Int(n)) => Value::float(*n as f64),
            Some(Value::Bool(b)) => Value::float(if *b { 1.0 } else { 0.0 }),
            Some(Value::String(s)) => match parse_float_prefix(&s.borrow()) {
                Some(f) => Value::float(f),
                None => Value::Nil,
            },
            _ => Value::Nil,
        })
    });

    engine.register_function("to_str", |ctx, args| {
        Ok(match args.first() {
            Some(v) => Value::string(v.to_display_string(Some(&ctx.interner().borrow()))),
            None => Value::string(Vec::new()),
        })
    });

    engine.register_function("to_bool", |_ctx, args| {
        Ok(Value::bool(args.first().is_some_and(Value::truthy)))
    });

    engine.register_function("type", |_ctx, args| {
        Ok(match args.first() {
            Some(v) => Value::string(v.type_name()),
            None => Value::string("nil"),
        })
    });
}

// ---- I/O ----

fn register_io_builtins(engine: &ScriptEngine) {
    engine.register_function("print", |ctx, args| {
        let interner = ctx.interner().borrow();
        let line = args
            .iter()
            .map(|v| v.to_display_string(Some(&interner)))
            .collect::<Vec<_>>()
            .join(" ");
        drop(interner);
        println!("{line}");
        Ok(Value::Nil)
    });
}

// ---- Map constructor ----

fn register_map_constructor(engine: &ScriptEngine) {
    // map :key1 val1 :key2 val2 ... ; named arguments arrive as a trailing
    // kwargs map and are folded in
    engine.register_function("map", |_ctx, args| {
        let mut data = MapData::new();
        let mut end = args.len();
        if let Some(Value::Map(kwargs)) = args.last() {
            let kwargs = kwargs.borrow();
            for key in kwargs.keys() {
                data.set(key, kwargs.get(key));
            }
            end -= 1;
        }
        let mut i = 0;
        while i + 1 < end {
            if let Some(key) = args[i].as_symbol() {
                data.set(key, args[i + 1].clone());
            }
            i += 2;
        }
        Ok(Value::map_from_data(data))
    });
}
