//! XML header dialect: a flat `<root><k>v</k>...</root>` tree.
//!
//! Hand-rolled rather than pulling in an XML crate — the schema is a single
//! flat level of string-valued elements, not worth a general-purpose parser
//! dependency (the pack favors hand-rolled parsers for small flat formats,
//! e.g. teacher's manual camelCase/snake_case conversion in `jtag-mcp`).

use crate::error::SwitchboardError;
use crate::package::{HeaderMap, HeaderValue};

use super::HeaderCodec;

const ROOT_OPEN: &str = "<root>";
const ROOT_CLOSE: &str = "</root>";

pub struct XmlHeaderCodec;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Value type tag stashed in a `type="..."` attribute, since XML text nodes
/// are otherwise untyped.
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

impl HeaderCodec for XmlHeaderCodec {
    fn encode_header(&self, header: &HeaderMap) -> Result<Vec<u8>, SwitchboardError> {
        let mut out = String::from(ROOT_OPEN);
        for (key, value) in header {
            out.push_str(&format!(
                "<{key} type=\"{}\">{}</{key}>",
                type_tag(value),
                escape(&value_text(value))
            ));
        }
        out.push_str(ROOT_CLOSE);
        Ok(out.into_bytes())
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<HeaderMap, SwitchboardError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SwitchboardError::BadHeader(format!("header is not utf-8: {e}")))?;
        let inner = text
            .strip_prefix(ROOT_OPEN)
            .and_then(|rest| rest.strip_suffix(ROOT_CLOSE))
            .ok_or_else(|| SwitchboardError::BadHeader("missing <root> wrapper".to_string()))?;

        let mut header = HeaderMap::new();
        let mut rest = inner;
        while !rest.is_empty() {
            let open_end = rest
                .find('>')
                .ok_or_else(|| SwitchboardError::BadHeader("malformed xml element".to_string()))?;
            let open_tag = &rest[1..open_end];
            let (key, tag) = open_tag
                .split_once(" type=\"")
                .ok_or_else(|| SwitchboardError::BadHeader("missing type attribute".to_string()))?;
            let tag = tag
                .strip_suffix('"')
                .ok_or_else(|| SwitchboardError::BadHeader("malformed type attribute".to_string()))?;

            let close_tag = format!("</{key}>");
            let body_start = open_end + 1;
            let close_pos = rest[body_start..]
                .find(&close_tag)
                .ok_or_else(|| SwitchboardError::BadHeader(format!("unterminated element: {key}")))?
                + body_start;
            let raw_value = unescape(&rest[body_start..close_pos]);

            let value = match tag {
                "str" => HeaderValue::Str(raw_value),
                "int" => raw_value
                    .parse::<i64>()
                    .map(HeaderValue::Int)
                    .map_err(|e| SwitchboardError::BadHeader(format!("bad int header value: {e}")))?,
                "bool" => raw_value
                    .parse::<bool>()
                    .map(HeaderValue::Bool)
                    .map_err(|e| SwitchboardError::BadHeader(format!("bad bool header value: {e}")))?,
                other => return Err(SwitchboardError::BadHeader(format!("unknown header type tag: {other}"))),
            };
            header.insert(key.to_string(), value);

            rest = &rest[close_pos + close_tag.len()..];
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_header_values() {
        let codec = XmlHeaderCodec;
        let mut header = HeaderMap::new();
        header.insert("Content-Length".to_string(), HeaderValue::Int(42));
        header.insert("Connection".to_string(), HeaderValue::Str("keep-alive".to_string()));
        header.insert("X-Flag".to_string(), HeaderValue::Bool(false));

        let encoded = codec.encode_header(&header).unwrap();
        let decoded = codec.decode_header(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn escapes_special_characters() {
        let codec = XmlHeaderCodec;
        let mut header = HeaderMap::new();
        header.insert("X-Note".to_string(), HeaderValue::Str("<a> & \"b\"".to_string()));

        let encoded = codec.encode_header(&header).unwrap();
        let decoded = codec.decode_header(&encoded).unwrap();
        assert_eq!(decoded, header);
    }
}
