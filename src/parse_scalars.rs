use saphyr_parser::ScalarStyle;

use crate::value::Value;

/// Parse a YAML 1.1 boolean from a &str (handles the "Norway problem").
///
/// Accepted TRUE literals (case-insensitive): "y", "yes", "true", "on"
/// Accepted FALSE literals (case-insensitive): "n", "no", "false", "off"
pub(crate) fn parse_yaml11_bool(s: &str) -> Result<bool, String> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true")
        || t.eq_ignore_ascii_case("yes")
        || t.eq_ignore_ascii_case("y")
        || t.eq_ignore_ascii_case("on")
    {
        Ok(true)
    } else if t.eq_ignore_ascii_case("false")
        || t.eq_ignore_ascii_case("no")
        || t.eq_ignore_ascii_case("n")
        || t.eq_ignore_ascii_case("off")
    {
        Ok(false)
    } else {
        Err(format!("invalid YAML 1.1 bool: `{}`", s))
    }
}

/// Parse a YAML 1.2 core schema boolean: `true`/`True`/`TRUE` and the `false` forms.
pub(crate) fn parse_yaml12_bool(s: &str) -> Result<bool, String> {
    match s.trim() {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" => Ok(false),
        _ => Err(format!("invalid bool: `{}`", s)),
    }
}

/// Parse a boolean honoring the strictness setting.
pub(crate) fn parse_bool(s: &str, strict: bool) -> Result<bool, String> {
    if strict {
        parse_yaml12_bool(s)
    } else {
        parse_yaml11_bool(s)
    }
}

fn parse_digits_u128(digits: &str, radix: u32) -> Option<u128> {
    let mut val: u128 = 0;
    let mut saw = false;
    for b in digits.as_bytes() {
        if *b == b'_' {
            continue;
        }
        let d = (*b as char).to_digit(radix)?;
        val = val.checked_mul(radix as u128)?;
        val = val.checked_add(d as u128)?;
        saw = true;
    }
    if saw { Some(val) } else { None }
}

/// Parse a YAML integer: optional sign, then decimal, `0x` hex, `0o` octal or `0b` binary
/// digits; `_` separators are ignored. With `legacy_octal`, a leading `00` also means octal.
///
/// Returns `None` if the text is not an integer or does not fit into `i128`.
pub(crate) fn parse_int(s: &str, legacy_octal: bool) -> Option<i128> {
    let t = s.trim();
    let (neg, rest) = match t.strip_prefix('+') {
        Some(r) => (false, r),
        None => match t.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, t),
        },
    };

    // Detect base
    let (radix, digits) = if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16u32, r)
    } else if let Some(r) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8u32, r)
    } else if let Some(r) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2u32, r)
    } else if legacy_octal && rest.len() > 2 && rest.starts_with("00") {
        (8u32, &rest[2..])
    } else {
        (10u32, rest)
    };
    if digits.starts_with('_') {
        return None;
    }

    let mag = parse_digits_u128(digits, radix)?;
    if neg {
        // Accumulated as magnitude; i128::MIN is the only value whose magnitude overflows.
        if mag == i128::MIN.unsigned_abs() {
            Some(i128::MIN)
        } else {
            i128::try_from(mag).ok().map(|v| -v)
        }
    } else {
        i128::try_from(mag).ok()
    }
}

/// Parse a YAML 1.2 float, including `.inf`, `-.inf` and `.nan` in their case variants.
///
/// Rust spellings such as `inf` or `NaN` are rejected.
pub(crate) fn parse_yaml12_float(s: &str) -> Option<f64> {
    let t = s.trim();
    let lower = t.to_ascii_lowercase();
    match lower.as_str() {
        ".nan" | "+.nan" | "-.nan" => Some(f64::NAN),
        ".inf" | "+.inf" => Some(f64::INFINITY),
        "-.inf" => Some(f64::NEG_INFINITY),
        _ => {
            if lower.contains("inf") || lower.contains("nan") {
                return None;
            }
            let cleaned: String = t.chars().filter(|c| *c != '_').collect();
            cleaned.parse::<f64>().ok()
        }
    }
}

/// True for plain scalars that denote null: empty, `~` and the `null` spellings.
pub(crate) fn scalar_is_nullish(value: &str, style: ScalarStyle) -> bool {
    style == ScalarStyle::Plain && matches!(value, "" | "~" | "null" | "Null" | "NULL")
}

/// Infer a value from an untyped scalar using the YAML 1.2 core schema.
///
/// Quoted and block scalars always stay strings.
pub(crate) fn infer_scalar(value: &str, style: ScalarStyle, legacy_octal: bool) -> Value {
    if style != ScalarStyle::Plain {
        return Value::String(value.to_owned());
    }
    if scalar_is_nullish(value, style) {
        return Value::Null;
    }
    if let Ok(b) = parse_yaml12_bool(value) {
        return Value::Bool(b);
    }
    if let Some(i) = parse_int(value, legacy_octal) {
        if let Ok(small) = i64::try_from(i) {
            return Value::Int(small);
        }
        if let Ok(big) = u64::try_from(i) {
            return Value::UInt(big);
        }
    }
    if looks_numeric(value) {
        if let Some(f) = parse_yaml12_float(value) {
            return Value::Float(f);
        }
    }
    Value::String(value.to_owned())
}

/// Cheap guard so words like `e` or `.` never become floats during inference.
fn looks_numeric(s: &str) -> bool {
    let t = s.trim_start_matches(['+', '-']);
    t.starts_with(|c: char| c.is_ascii_digit())
        || (t.starts_with('.') && t[1..].starts_with(|c: char| c.is_ascii_digit() || c == 'i' || c == 'I' || c == 'n' || c == 'N'))
}
