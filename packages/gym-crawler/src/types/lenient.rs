//! Forgiving field decoders for model-produced JSON.
//!
//! Models drift between `"1500"`, `1500` and `"S/ 1,500.00"` for the same
//! field, or send `null` where a string belongs. These decoders accept any
//! JSON value and keep what can be read.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any scalar as a trimmed, non-empty string.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

/// Like [`opt_string`] but empty when absent.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string(deserializer)?.unwrap_or_default())
}

/// A number, or a string holding one (currency symbols and separators allowed).
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_amount(&s),
        _ => None,
    })
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse a human-written amount like `S/ 1,500.00` or `1.500,50`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        // Whichever separator comes last is the decimal point.
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(comma)) => {
            let decimals = cleaned.len() - comma - 1;
            if decimals == 3 || cleaned.matches(',').count() > 1 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (Some(dot), None) => {
            let decimals = cleaned.len() - dot - 1;
            if cleaned.matches('.').count() > 1 || (decimals == 3 && dot <= 3 && !cleaned.starts_with('0')) {
                cleaned.replace('.', "")
            } else {
                cleaned.to_string()
            }
        }
        (None, None) => cleaned.to_string(),
    };

    normalized.parse::<f64>().ok()
}
