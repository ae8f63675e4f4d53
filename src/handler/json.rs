//! JSON header dialect: the header map as a flat JSON object.

use serde_json::Value;

use crate::error::SwitchboardError;
use crate::package::{HeaderMap, HeaderValue};

use super::HeaderCodec;

pub struct JsonHeaderCodec;

impl HeaderCodec for JsonHeaderCodec {
    fn encode_header(&self, header: &HeaderMap) -> Result<Vec<u8>, SwitchboardError> {
        serde_json::to_vec(header).map_err(|e| SwitchboardError::BadHeader(e.to_string()))
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<HeaderMap, SwitchboardError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| SwitchboardError::BadHeader(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| SwitchboardError::BadHeader("header must be a flat json object".to_string()))?;

        let mut header = HeaderMap::new();
        for (key, value) in object {
            let header_value = match value {
                Value::String(s) => HeaderValue::Str(s.clone()),
                Value::Bool(b) => HeaderValue::Bool(*b),
                Value::Number(n) if n.is_i64() => HeaderValue::Int(n.as_i64().unwrap()),
                other => return Err(SwitchboardError::BadHeader(format!("unsupported header value: {other}"))),
            };
            header.insert(key.clone(), header_value);
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_map() {
        let codec = JsonHeaderCodec;
        let mut header = HeaderMap::new();
        header.insert("Content-Length".to_string(), HeaderValue::Int(10));
        header.insert("Accept-Encoding".to_string(), HeaderValue::Str("text/json".to_string()));

        let encoded = codec.encode_header(&header).unwrap();
        let decoded = codec.decode_header(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_non_object_header() {
        let codec = JsonHeaderCodec;
        assert!(codec.decode_header(b"[1,2,3]").is_err());
    }
}
