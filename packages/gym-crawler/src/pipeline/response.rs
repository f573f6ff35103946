//! Decoding model responses that should hold a keyed JSON object.
//!
//! Models return the object directly, wrap it under one key (`{"data": {...}}`),
//! put it in a one-element array, surround it with markdown fences or prose,
//! or return something else entirely. Each shape is a distinct variant and
//! the decoder tries them in a fixed order.

use openai_client::strip_code_blocks;
use serde_json::{Map, Value};

/// Shape of a decoded response.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Top-level object carrying at least one expected key
    Direct(Map<String, Value>),
    /// Expected keys nested under a single wrapper key
    Wrapped {
        key: String,
        object: Map<String, Value>,
    },
    /// One-element array whose element carries expected keys
    ArrayItem(Map<String, Value>),
    /// Valid JSON of no recognized shape
    Unrecognized(Value),
    /// Not JSON at all
    Invalid,
}

impl Decoded {
    /// The keyed object, for every recognized shape.
    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            Self::Direct(object) | Self::ArrayItem(object) => Some(object),
            Self::Wrapped { object, .. } => Some(object),
            Self::Unrecognized(_) | Self::Invalid => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(
            self,
            Self::Direct(_) | Self::Wrapped { .. } | Self::ArrayItem(_)
        )
    }
}

/// Decode `text` as an object keyed by any of `expected`.
///
/// Order: direct object, single-key wrapper, one-element array. Text that
/// does not parse is retried on its outermost `{...}` span.
pub fn decode_keyed_object(text: &str, expected: &[&str]) -> Decoded {
    let Some(value) = parse_lenient(text) else {
        return Decoded::Invalid;
    };

    let has_expected = |object: &Map<String, Value>| expected.iter().any(|k| object.contains_key(*k));

    match value {
        Value::Object(object) if has_expected(&object) => Decoded::Direct(object),
        Value::Object(object) if object.len() == 1 => {
            let mut entries = object.into_iter();
            match entries.next() {
                Some((key, Value::Object(inner))) if has_expected(&inner) => Decoded::Wrapped {
                    key,
                    object: inner,
                },
                Some((key, inner)) => {
                    Decoded::Unrecognized(Value::Object(Map::from_iter([(key, inner)])))
                }
                None => Decoded::Unrecognized(Value::Object(Map::new())),
            }
        }
        Value::Array(items) if items.len() == 1 => match items.into_iter().next() {
            Some(Value::Object(object)) if has_expected(&object) => Decoded::ArrayItem(object),
            Some(other) => Decoded::Unrecognized(Value::Array(vec![other])),
            None => Decoded::Unrecognized(Value::Array(Vec::new())),
        },
        other => Decoded::Unrecognized(other),
    }
}

fn parse_lenient(text: &str) -> Option<Value> {
    let stripped = strip_code_blocks(text);
    if stripped.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(stripped) {
        return Some(value);
    }
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&stripped[start..=end]).ok()
}

/// Whether a JSON response looks cut off mid-document.
pub fn looks_truncated(text: &str) -> bool {
    let trimmed = strip_code_blocks(text);
    !(trimmed.ends_with('}') || trimmed.ends_with(']'))
}
