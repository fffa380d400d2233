//! Flat encoding for metadata crossing a storage boundary.
//!
//! Scalars are stored as-is. Objects and arrays become JSON strings and their
//! keys are listed under [`NESTED_KEYS`], so decoding only parses values that
//! were encoded, never user strings that merely look like JSON.

use serde_json::Value;

use ragkit_core::error::{Error, Result};
use ragkit_core::types::Metadata;

/// Reserved key; user metadata may not use it.
pub const NESTED_KEYS: &str = "__nested_keys";

pub fn encode(metadata: &Metadata) -> Result<Metadata> {
    if metadata.contains_key(NESTED_KEYS) {
        return Err(Error::store(format!("metadata key '{NESTED_KEYS}' is reserved")));
    }
    let mut flat = Metadata::new();
    let mut nested = Vec::new();
    for (k, v) in metadata {
        match v {
            Value::Object(_) | Value::Array(_) => {
                flat.insert(k.clone(), Value::String(serde_json::to_string(v)?));
                nested.push(Value::String(k.clone()));
            }
            _ => {
                flat.insert(k.clone(), v.clone());
            }
        }
    }
    if !nested.is_empty() {
        flat.insert(NESTED_KEYS.to_string(), Value::Array(nested));
    }
    Ok(flat)
}

pub fn decode(flat: &Metadata) -> Result<Metadata> {
    let nested: Vec<&str> = match flat.get(NESTED_KEYS) {
        Some(Value::Array(keys)) => keys.iter().filter_map(Value::as_str).collect(),
        Some(other) => return Err(Error::store(format!("malformed {NESTED_KEYS}: {other}"))),
        None => Vec::new(),
    };
    let mut out = Metadata::new();
    for (k, v) in flat {
        if k == NESTED_KEYS { continue; }
        let value = match v {
            Value::String(s) if nested.contains(&k.as_str()) => serde_json::from_str(s)?,
            _ => v.clone(),
        };
        out.insert(k.clone(), value);
    }
    Ok(out)
}

/// Encode to a single JSON string column value.
pub fn encode_to_string(metadata: &Metadata) -> Result<String> {
    Ok(serde_json::to_string(&encode(metadata)?)?)
}

pub fn decode_from_str(s: &str) -> Result<Metadata> {
    if s.is_empty() { return Ok(Metadata::new()); }
    let flat: Metadata = serde_json::from_str(s)?;
    decode(&flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Metadata { v.as_object().cloned().unwrap() }

    #[test]
    fn nested_values_round_trip_exactly() {
        let m = meta(json!({
            "extractors": {"entities": {"PERSON": ["Alice"]}},
            "keywords": ["fire", "water"],
            "score": 0.1234567890123,
            "title": "{\"looks\": \"like json\"}",
            "none": null,
        }));
        let flat = encode(&m).unwrap();
        assert!(flat.values().all(|v| !v.is_object()));
        assert_eq!(flat["title"], m["title"]);
        assert_eq!(decode(&flat).unwrap(), m);
        assert_eq!(decode_from_str(&encode_to_string(&m).unwrap()).unwrap(), m);
    }

    #[test]
    fn flat_metadata_has_no_marker() {
        let m = meta(json!({"a": 1, "b": "x"}));
        assert!(!encode(&m).unwrap().contains_key(NESTED_KEYS));
    }

    #[test]
    fn reserved_key_is_rejected() {
        let m = meta(json!({NESTED_KEYS: []}));
        assert!(encode(&m).is_err());
    }
}
