//! Numeric coercions shared by dispatch and the built-in operators.

use num_traits::ToPrimitive;

use super::Value;

/// Exact float to integer conversion; `None` when `f` has a fractional part
/// or falls outside the `i64` range.
pub fn float_to_integer(f: f64) -> Option<i64> {
    if f.fract() != 0.0 {
        return None;
    }
    f.to_i64()
}

/// Parse a numeric string the way the runtime coerces strings in
/// arithmetic: surrounding whitespace is ignored, `0x` introduces a
/// wrapping hexadecimal integer, decimal integers that overflow become
/// floats, and `inf`/`nan` spellings are rejected.
pub fn str_to_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if s.is_empty() || s.contains(['n', 'N']) {
        return None;
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return None;
        }
        let mut acc: u64 = 0;
        for c in hex.chars() {
            acc = acc.wrapping_mul(16).wrapping_add(c.to_digit(16)? as u64);
        }
        let n = acc as i64;
        return Some(Value::Int(if negative { n.wrapping_neg() } else { n }));
    }
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = s.parse::<i64>() {
            return Some(Value::Int(n));
        }
    }
    s.parse::<f64>().ok().map(Value::Float)
}

/// Numeric view of a value: numbers as-is, numeric strings parsed.
pub fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        Value::Str(s) => str_to_number(s).and_then(|n| to_number(&n)),
        _ => None,
    }
}

/// Like [`to_number`] but keeps integers exact.
pub fn to_numeric(v: &Value) -> Option<Value> {
    match v {
        Value::Int(_) | Value::Float(_) => Some(v.clone()),
        Value::Str(s) => str_to_number(s),
        _ => None,
    }
}

/// Exact integer view of a value, numeric strings included.
pub fn to_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Int(n) => Some(*n),
        Value::Float(f) => float_to_integer(*f),
        Value::Str(s) => str_to_number(s).and_then(|n| to_integer(&n)),
        _ => None,
    }
}

/// Render a number the way `tostring` does: integers in decimal, floats with
/// 14 significant digits and a trailing `.0` when they look integral.
pub fn number_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Int(n) => Some(n.to_string()),
        Value::Float(f) => Some(float_to_string(*f)),
        _ => None,
    }
}

fn float_to_string(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let mut out = format_g14(f);
    if !out.contains(['.', 'e']) {
        out.push_str(".0");
    }
    out
}

// printf("%.14g")
fn format_g14(f: f64) -> String {
    const PRECISION: i32 = 14;
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, f)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
