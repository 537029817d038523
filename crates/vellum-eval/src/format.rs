//! printf-style formatting for the string `%` operator and the `format`
//! builtin. A specifier is `%[flags][width][.precision]conv` with flags
//! `- + space 0 #` and conversions `d i f e g F E G x X o s`. `%%` is a
//! literal percent; every other specifier consumes one substitution value.

use vellum_core::{Interner, Value};

#[derive(Debug, Default)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conv: u8,
}

/// Format `fmt` against `values`, consuming one value per conversion.
pub fn format_multi(
    fmt: &[u8],
    values: &[Value],
    interner: Option<&Interner>,
) -> Result<Vec<u8>, String> {
    let mut out: Vec<u8> = Vec::with_capacity(fmt.len());
    let mut value_idx = 0;
    let mut i = 0;

    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i]);
            i += 1;
            continue;
        }
        if i + 1 < fmt.len() && fmt[i + 1] == b'%' {
            out.push(b'%');
            i += 2;
            continue;
        }

        let (spec, consumed) = parse_spec(&fmt[i..])?;
        i += consumed;

        if value_idx >= values.len() {
            return Err("Not enough arguments for format string".to_string());
        }
        out.extend_from_slice(&format_one(&spec, &values[value_idx], interner));
        value_idx += 1;
    }

    Ok(out)
}

/// Parse one `%...conv` specifier starting at `bytes[0] == b'%'`. Returns the
/// spec and the number of bytes consumed.
fn parse_spec(bytes: &[u8]) -> Result<(Spec, usize), String> {
    let mut spec = Spec::default();
    let mut i = 1; // skip '%'

    while i < bytes.len() {
        match bytes[i] {
            b'-' => spec.minus = true,
            b'+' => spec.plus = true,
            b' ' => spec.space = true,
            b'0' => spec.zero = true,
            b'#' => spec.alt = true,
            _ => break,
        }
        i += 1;
    }

    let mut width = 0usize;
    let mut has_width = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        has_width = true;
        width = width * 10 + (bytes[i] - b'0') as usize;
        i += 1;
    }
    if has_width {
        spec.width = Some(width);
    }

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let mut precision = 0usize;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            precision = precision * 10 + (bytes[i] - b'0') as usize;
            i += 1;
        }
        spec.precision = Some(precision);
    }

    if i >= bytes.len() {
        return Err("Incomplete format specifier in format string".to_string());
    }
    spec.conv = bytes[i];
    i += 1;

    Ok((spec, i))
}

fn format_one(spec: &Spec, value: &Value, interner: Option<&Interner>) -> Vec<u8> {
    match spec.conv {
        b'd' | b'i' => format_signed(spec, int_coerce(value)),
        b'x' | b'X' | b'o' => format_unsigned(spec, int_coerce(value) as u64),
        b'f' | b'F' | b'e' | b'E' | b'g' | b'G' => format_float(spec, float_coerce(value)),
        b's' => format_str(spec, value, interner),
        other => vec![b'%', other],
    }
}

/// Int passed to a float conversion promotes; Float passed to an int
/// conversion truncates; anything else formats as zero.
fn int_coerce(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        Value::Float(f) => *f as i64,
        _ => 0,
    }
}

fn float_coerce(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        Value::Int(n) => *n as f64,
        _ => 0.0,
    }
}

fn format_signed(spec: &Spec, v: i64) -> Vec<u8> {
    let mut digits = v.unsigned_abs().to_string();
    if let Some(p) = spec.precision {
        while digits.len() < p {
            digits.insert(0, '0');
        }
    }
    let sign = if v < 0 {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    pad_numeric(spec, sign, &digits, spec.precision.is_none())
}

fn format_unsigned(spec: &Spec, v: u64) -> Vec<u8> {
    let mut digits = match spec.conv {
        b'x' => format!("{v:x}"),
        b'X' => format!("{v:X}"),
        _ => format!("{v:o}"),
    };
    if let Some(p) = spec.precision {
        while digits.len() < p {
            digits.insert(0, '0');
        }
    }
    let prefix = if spec.alt && v != 0 {
        match spec.conv {
            b'x' => "0x",
            b'X' => "0X",
            _ => {
                if !digits.starts_with('0') {
                    digits.insert(0, '0');
                }
                ""
            }
        }
    } else {
        ""
    };
    pad_numeric(spec, prefix, &digits, spec.precision.is_none())
}

fn format_float(spec: &Spec, v: f64) -> Vec<u8> {
    let precision = spec.precision.unwrap_or(6);
    let upper = matches!(spec.conv, b'F' | b'E' | b'G');

    let mut body = if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        "inf".to_string()
    } else {
        let magnitude = v.abs();
        match spec.conv | 0x20 {
            b'f' => format!("{magnitude:.precision$}"),
            b'e' => format_exponential(magnitude, precision),
            _ => format_general(magnitude, precision, spec.alt),
        }
    };
    if upper {
        body = body.to_uppercase();
    }

    let sign = if v.is_sign_negative() && !v.is_nan() {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    pad_numeric(spec, sign, &body, true)
}

/// C-style `%e`: mantissa with fixed precision, exponent with a sign and at
/// least two digits.
fn format_exponential(v: f64, precision: usize) -> String {
    let s = format!("{v:.precision$e}");
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.abs())
}

/// C-style `%g`: fixed or exponential depending on the decimal exponent,
/// trailing zeros stripped unless `#` is given.
fn format_general(v: f64, precision: usize, alt: bool) -> String {
    let p = precision.max(1);
    let exp = if v == 0.0 {
        0
    } else {
        let s = format!("{v:e}");
        s.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };

    let mut s = if exp >= -4 && exp < p as i32 {
        let prec = (p as i32 - 1 - exp).max(0) as usize;
        format!("{v:.prec$}")
    } else {
        format_exponential(v, p - 1)
    };

    if !alt {
        s = strip_trailing_zeros(&s);
    }
    s
}

fn strip_trailing_zeros(s: &str) -> String {
    let (mantissa, exp) = match s.split_once('e') {
        Some((m, e)) => (m, Some(e)),
        None => (s, None),
    };
    let trimmed = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    match exp {
        Some(e) => format!("{trimmed}e{e}"),
        None => trimmed.to_string(),
    }
}

fn format_str(spec: &Spec, value: &Value, interner: Option<&Interner>) -> Vec<u8> {
    let mut bytes = match value {
        Value::String(h) => h.borrow().clone(),
        other => other.to_display_string(interner).into_bytes(),
    };
    if let Some(p) = spec.precision {
        bytes.truncate(p);
    }
    if let Some(width) = spec.width {
        if bytes.len() < width {
            let padding = vec![b' '; width - bytes.len()];
            if spec.minus {
                bytes.extend_from_slice(&padding);
            } else {
                let mut out = padding;
                out.extend_from_slice(&bytes);
                bytes = out;
            }
        }
    }
    bytes
}

/// Width padding for numeric conversions: left spaces by default, right
/// spaces with `-`, zeros after the sign with `0` (suppressed for integer
/// conversions that carry an explicit precision).
fn pad_numeric(spec: &Spec, prefix: &str, body: &str, zero_allowed: bool) -> Vec<u8> {
    let total = prefix.len() + body.len();
    let out = match spec.width {
        Some(width) if width > total => {
            let pad = width - total;
            if spec.minus {
                format!("{prefix}{body}{}", " ".repeat(pad))
            } else if spec.zero && zero_allowed {
                format!("{prefix}{}{body}", "0".repeat(pad))
            } else {
                format!("{}{prefix}{body}", " ".repeat(pad))
            }
        }
        _ => format!("{prefix}{body}"),
    };
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(pattern: &str, values: &[Value]) -> String {
        let out = format_multi(pattern.as_bytes(), values, None).expect("format failure");
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn float_precision() {
        assert_eq!(fmt("%.2f", &[Value::float(3.14159)]), "3.14");
        assert_eq!(fmt("%.0f", &[Value::float(59.99)]), "60");
        assert_eq!(fmt("%f", &[Value::float(1.5)]), "1.500000");
    }

    #[test]
    fn int_conversions() {
        assert_eq!(fmt("%d", &[Value::int(42)]), "42");
        assert_eq!(fmt("%d", &[Value::int(-7)]), "-7");
        assert_eq!(fmt("%04d", &[Value::int(7)]), "0007");
        assert_eq!(fmt("%+d", &[Value::int(7)]), "+7");
        assert_eq!(fmt("%5d", &[Value::int(42)]), "   42");
        assert_eq!(fmt("%-5d|", &[Value::int(42)]), "42   |");
    }

    #[test]
    fn hex_and_octal() {
        assert_eq!(fmt("%x", &[Value::int(255)]), "ff");
        assert_eq!(fmt("%X", &[Value::int(255)]), "FF");
        assert_eq!(fmt("%o", &[Value::int(8)]), "10");
        assert_eq!(fmt("%#x", &[Value::int(255)]), "0xff");
    }

    #[test]
    fn string_conversion() {
        assert_eq!(fmt("%s", &[Value::string("hello")]), "hello");
        assert_eq!(fmt("%-10s", &[Value::string("hi")]), "hi        ");
        assert_eq!(fmt("%10s", &[Value::string("hi")]), "        hi");
        assert_eq!(fmt("%.3s", &[Value::string("hello")]), "hel");
        // Non-strings render through display
        assert_eq!(fmt("%s", &[Value::int(5)]), "5");
    }

    #[test]
    fn cross_type_coercion() {
        // Int promoted for %f, float truncated for %d
        assert_eq!(fmt("%.1f", &[Value::int(42)]), "42.0");
        assert_eq!(fmt("%d", &[Value::float(3.9)]), "3");
    }

    #[test]
    fn exponential() {
        assert_eq!(fmt("%.2e", &[Value::float(15.0)]), "1.50e+01");
        assert_eq!(fmt("%.1e", &[Value::float(0.05)]), "5.0e-02");
        assert_eq!(fmt("%E", &[Value::float(15.0)]), "1.500000E+01");
    }

    #[test]
    fn general() {
        assert_eq!(fmt("%g", &[Value::float(0.5)]), "0.5");
        assert_eq!(fmt("%g", &[Value::float(100000.0)]), "100000");
        assert_eq!(fmt("%g", &[Value::float(1000000.0)]), "1e+06");
        assert_eq!(fmt("%.3g", &[Value::float(3.14159)]), "3.14");
    }

    #[test]
    fn literal_percent() {
        assert_eq!(fmt("%d%%", &[Value::int(42)]), "42%");
        assert_eq!(fmt("100%%", &[]), "100%");
    }

    #[test]
    fn multiple_values_in_order() {
        assert_eq!(fmt("%d/%d", &[Value::int(10), Value::int(20)]), "10/20");
        assert_eq!(
            fmt(
                "%s has %d HP (%.1f%%)",
                &[Value::string("Goblin"), Value::int(50), Value::float(75.5)]
            ),
            "Goblin has 50 HP (75.5%)"
        );
    }

    #[test]
    fn error_cases() {
        assert!(format_multi(b"%d", &[], None).is_err());
        assert!(format_multi(b"trailing %", &[Value::int(1)], None).is_err());
    }
}
