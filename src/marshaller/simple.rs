//! Line-oriented marshaller: `<type>/<key>/<hex-encoded value>\n` per entry.
//!
//! Grounded on `original_source/core/marshaller/marshallers/simple.py`. The
//! payload must be a JSON object at the top level — each key becomes one
//! line. Hex-encoding the value lets arbitrary UTF-8 text (slashes,
//! newlines, non-ASCII) survive the line-oriented grammar untouched.

use serde_json::Value;

use crate::error::SwitchboardError;

use super::Marshaller;

pub struct SimpleMarshaller;

fn type_tag(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("str"),
        Value::Bool(_) => Some("bool"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("int"),
        Value::Number(n) if n.is_f64() => Some("float"),
        Value::Null => Some("None"),
        Value::Array(_) => Some("list"),
        Value::Object(_) => Some("dict"),
        _ => None,
    }
}

fn encode_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn decode_value_text(type_name: &str, text: &str) -> Result<Value, SwitchboardError> {
    match type_name {
        "str" => Ok(Value::String(text.to_string())),
        "bool" => text
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| SwitchboardError::UnmarshalError(format!("bad bool literal: {e}"))),
        "int" => text
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|e| SwitchboardError::UnmarshalError(format!("bad int literal: {e}"))),
        "float" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| SwitchboardError::UnmarshalError("bad float literal".to_string())),
        "None" => Ok(Value::Null),
        "list" | "tuple" | "dict" => serde_json::from_str(text)
            .map_err(|e| SwitchboardError::UnmarshalError(format!("bad embedded json: {e}"))),
        other => Err(SwitchboardError::UnmarshalError(format!("unknown simple type tag: {other}"))),
    }
}

impl Marshaller for SimpleMarshaller {
    fn encode_payload(&self, payload: &Value) -> Result<Vec<u8>, SwitchboardError> {
        let object = payload
            .as_object()
            .ok_or_else(|| SwitchboardError::MarshalError("simple payload must be an object".to_string()))?;

        let mut out = String::new();
        for (key, value) in object {
            let tag = type_tag(value)
                .ok_or_else(|| SwitchboardError::MarshalError(format!("unsupported value type for key '{key}'")))?;
            let hex = hex::encode(encode_value_text(value).as_bytes());
            out.push_str(&format!("{tag}/{key}/{hex}\n"));
        }
        Ok(out.into_bytes())
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<Value, SwitchboardError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SwitchboardError::UnmarshalError(format!("payload is not utf-8: {e}")))?;

        let mut map = serde_json::Map::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, '/');
            let tag = parts
                .next()
                .ok_or_else(|| SwitchboardError::UnmarshalError("malformed simple line".to_string()))?;
            let key = parts
                .next()
                .ok_or_else(|| SwitchboardError::UnmarshalError("malformed simple line".to_string()))?;
            let hex_value = parts
                .next()
                .ok_or_else(|| SwitchboardError::UnmarshalError("malformed simple line".to_string()))?;

            let raw = hex::decode(hex_value)
                .map_err(|e| SwitchboardError::UnmarshalError(format!("bad hex in simple line: {e}")))?;
            let decoded_text = String::from_utf8(raw)
                .map_err(|e| SwitchboardError::UnmarshalError(format!("simple value is not utf-8: {e}")))?;
            map.insert(key.to_string(), decode_value_text(tag, &decoded_text)?);
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_scalar_types() {
        let marshaller = SimpleMarshaller;
        let payload = json!({
            "name": "hi there/with\nnewline",
            "count": 3,
            "ratio": 1.5,
            "enabled": true,
            "missing": null,
        });
        let encoded = marshaller.encode_payload(&payload).unwrap();
        let decoded = marshaller.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn round_trips_nested_collections() {
        let marshaller = SimpleMarshaller;
        let payload = json!({ "items": [1, 2, 3], "meta": {"a": "b"} });
        let encoded = marshaller.encode_payload(&payload).unwrap();
        let decoded = marshaller.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn unicode_survives_round_trip() {
        let marshaller = SimpleMarshaller;
        let payload = json!({ "greeting": "héllo / wörld \n \u{1F600}" });
        let encoded = marshaller.encode_payload(&payload).unwrap();
        let decoded = marshaller.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let marshaller = SimpleMarshaller;
        assert!(marshaller.encode_payload(&json!([1, 2, 3])).is_err());
    }
}
