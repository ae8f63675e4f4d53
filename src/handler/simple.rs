//! Simple line-oriented header dialect: same grammar as the Simple
//! marshaller, restricted to the three header-value primitives.

use crate::error::SwitchboardError;
use crate::package::{HeaderMap, HeaderValue};

use super::HeaderCodec;

pub struct SimpleHeaderCodec;

fn type_tag(value: &HeaderValue) -> &'static str {
    match value {
        HeaderValue::Str(_) => "str",
        HeaderValue::Int(_) => "int",
        HeaderValue::Bool(_) => "bool",
    }
}

fn value_text(value: &HeaderValue) -> String {
    match value {
        HeaderValue::Str(s) => s.clone(),
        HeaderValue::Int(n) => n.to_string(),
        HeaderValue::Bool(b) => b.to_string(),
    }
}

impl HeaderCodec for SimpleHeaderCodec {
    fn encode_header(&self, header: &HeaderMap) -> Result<Vec<u8>, SwitchboardError> {
        let mut out = String::new();
        for (key, value) in header {
            let hex = hex::encode(value_text(value).as_bytes());
            out.push_str(&format!("{}/{key}/{hex}\n", type_tag(value)));
        }
        Ok(out.into_bytes())
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<HeaderMap, SwitchboardError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SwitchboardError::BadHeader(format!("header is not utf-8: {e}")))?;

        let mut header = HeaderMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, '/');
            let tag = parts.next().ok_or_else(|| SwitchboardError::BadHeader("malformed header line".to_string()))?;
            let key = parts.next().ok_or_else(|| SwitchboardError::BadHeader("malformed header line".to_string()))?;
            let hex_value = parts
                .next()
                .ok_or_else(|| SwitchboardError::BadHeader("malformed header line".to_string()))?;

            let raw = hex::decode(hex_value).map_err(|e| SwitchboardError::BadHeader(format!("bad hex: {e}")))?;
            let text = String::from_utf8(raw).map_err(|e| SwitchboardError::BadHeader(e.to_string()))?;
            let value = match tag {
                "str" => HeaderValue::Str(text),
                "int" => text
                    .parse::<i64>()
                    .map(HeaderValue::Int)
                    .map_err(|e| SwitchboardError::BadHeader(format!("bad int header value: {e}")))?,
                "bool" => text
                    .parse::<bool>()
                    .map(HeaderValue::Bool)
                    .map_err(|e| SwitchboardError::BadHeader(format!("bad bool header value: {e}")))?,
                other => return Err(SwitchboardError::BadHeader(format!("unknown header type tag: {other}"))),
            };
            header.insert(key.to_string(), value);
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_header_values() {
        let codec = SimpleHeaderCodec;
        let mut header = HeaderMap::new();
        header.insert("Content-Length".to_string(), HeaderValue::Int(42));
        header.insert("Connection".to_string(), HeaderValue::Str("keep-alive".to_string()));
        header.insert("X-Flag".to_string(), HeaderValue::Bool(true));

        let encoded = codec.encode_header(&header).unwrap();
        let decoded = codec.decode_header(&encoded).unwrap();
        assert_eq!(decoded, header);
    }
}
