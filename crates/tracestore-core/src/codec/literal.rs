use crate::error::StoreError;

use super::value::MetadataValue;

pub const NAN_TOKEN: &str = "nan";
pub const INF_TOKEN: &str = "inf";
pub const NEG_INF_TOKEN: &str = "-inf";

/// Encode a value as its canonical string literal.
///
/// Fails with [`StoreError::EncodingViolation`] when the literal would not
/// decode back to the same value, e.g. a string that reads as a number, or a
/// list element containing a quote.
pub fn encode(value: &MetadataValue) -> Result<String, StoreError> {
    let literal = to_literal(value);
    let back = decode(&literal);
    if back != *value {
        return Err(StoreError::EncodingViolation(format!(
            "{} value '{literal}' would be read back as {} '{back}'",
            value.type_name(),
            back.type_name()
        )));
    }
    Ok(literal)
}

/// Decode a stored literal. Never fails: anything that is not another
/// literal is a string.
pub fn decode(literal: &str) -> MetadataValue {
    if let Some(f) = special_float(literal) {
        return MetadataValue::Float(f);
    }
    if is_int_literal(literal) {
        if let Ok(i) = literal.parse::<i64>() {
            return MetadataValue::Int(i);
        }
    }
    if is_int_literal(literal) || is_float_literal(literal) {
        if let Ok(f) = literal.parse::<f64>() {
            return MetadataValue::Float(f);
        }
    }
    match literal {
        "true" | "True" => return MetadataValue::Bool(true),
        "false" | "False" => return MetadataValue::Bool(false),
        _ => {}
    }
    if let Some(inner) = literal.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        if let Some(list) = decode_list(inner) {
            return list;
        }
    }
    if let Some(inner) = unquote(literal) {
        return decode(inner);
    }
    MetadataValue::Str(literal.to_string())
}

pub(crate) fn to_literal(value: &MetadataValue) -> String {
    match value {
        MetadataValue::Str(s) => s.clone(),
        MetadataValue::Int(i) => i.to_string(),
        MetadataValue::Float(f) => format_float(*f),
        MetadataValue::Bool(b) => b.to_string(),
        MetadataValue::StrList(items) => {
            let items: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
            format!("[{}]", items.join(", "))
        }
        MetadataValue::FloatList(values) => {
            let items: Vec<String> = values.iter().map(|f| format_float(*f)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Shortest round-trip form; always carries a `.` or an exponent so it never
/// reads back as an integer.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        NAN_TOKEN.to_string()
    } else if f == f64::INFINITY {
        INF_TOKEN.to_string()
    } else if f == f64::NEG_INFINITY {
        NEG_INF_TOKEN.to_string()
    } else {
        format!("{f:?}")
    }
}

/// Tokens for non-finite floats, including the YAML spellings.
pub(crate) fn special_float(s: &str) -> Option<f64> {
    match s {
        "nan" | "NaN" | "NAN" | ".nan" | ".NaN" => Some(f64::NAN),
        "inf" | "+inf" | ".inf" | "+.inf" => Some(f64::INFINITY),
        "-inf" | "-.inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s)
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn is_int_literal(s: &str) -> bool {
    let digits = strip_sign(s);
    !digits.is_empty() && all_digits(digits)
}

fn is_float_literal(s: &str) -> bool {
    let body = strip_sign(s);
    let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
        Some(at) => (&body[..at], Some(&body[at + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return false;
    }
    match exponent {
        Some(exp) => is_int_literal(exp),
        None => true,
    }
}

pub(crate) fn is_numeric_token(s: &str) -> bool {
    special_float(s).is_some() || is_int_literal(s) || is_float_literal(s)
}

fn unquote(s: &str) -> Option<&str> {
    let first = s.chars().next()?;
    if s.len() < 2 || !(first == '\'' || first == '"') || !s.ends_with(first) {
        return None;
    }
    Some(&s[1..s.len() - 1])
}

fn decode_list(inner: &str) -> Option<MetadataValue> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Some(MetadataValue::StrList(Vec::new()));
    }

    // (text, quoted)
    let mut items: Vec<(&str, bool)> = Vec::new();
    let mut rest = inner;
    loop {
        rest = rest.trim_start();
        let remainder = match rest.chars().next() {
            Some(q @ ('\'' | '"')) => {
                let body = &rest[1..];
                let end = body.find(q)?;
                items.push((&body[..end], true));
                &body[end + 1..]
            }
            _ => {
                let end = rest.find(',').unwrap_or(rest.len());
                let item = rest[..end].trim();
                let nested = item.contains(|c: char| matches!(c, '[' | ']' | '\'' | '"'));
                if item.is_empty() || nested {
                    return None;
                }
                items.push((item, false));
                &rest[end..]
            }
        };
        let remainder = remainder.trim_start();
        if remainder.is_empty() {
            break;
        }
        rest = remainder.strip_prefix(',')?;
    }

    let numeric = items
        .iter()
        .all(|(text, quoted)| !quoted && is_numeric_token(text));
    if numeric {
        let values: Option<Vec<f64>> = items
            .iter()
            .map(|(text, _)| special_float(text).or_else(|| text.parse().ok()))
            .collect();
        return values.map(MetadataValue::FloatList);
    }
    Some(MetadataValue::StrList(
        items.into_iter().map(|(text, _)| text.to_string()).collect(),
    ))
}
