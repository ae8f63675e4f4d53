//! JSON marshaller with deterministic, lexicographically-sorted keys.
//!
//! Grounded on `original_source/core/marshaller/marshallers/json_marshaller.py`
//! (`json.dumps(..., sort_keys=True)`). `serde_json::Map` preserves
//! insertion order by default, so encoding routes through a `BTreeMap`
//! intermediate to get the same sorted-key guarantee.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SwitchboardError;

use super::Marshaller;

pub struct JsonMarshaller;

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

impl Marshaller for JsonMarshaller {
    fn encode_payload(&self, payload: &Value) -> Result<Vec<u8>, SwitchboardError> {
        let sorted = sort_keys(payload);
        serde_json::to_vec(&sorted).map_err(|e| SwitchboardError::MarshalError(e.to_string()))
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<Value, SwitchboardError> {
        serde_json::from_slice(bytes).map_err(|e| SwitchboardError::UnmarshalError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_object_keys_in_sorted_order() {
        let marshaller = JsonMarshaller;
        let payload = json!({ "zebra": 1, "apple": 2, "mango": 3 });
        let encoded = marshaller.encode_payload(&payload).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        let apple = text.find("apple").unwrap();
        let mango = text.find("mango").unwrap();
        let zebra = text.find("zebra").unwrap();
        assert!(apple < mango && mango < zebra);
    }

    #[test]
    fn round_trips_arbitrary_payload() {
        let marshaller = JsonMarshaller;
        let payload = json!({ "nested": {"b": 1, "a": [1, 2, {"x": "y"}]} });
        let encoded = marshaller.encode_payload(&payload).unwrap();
        let decoded = marshaller.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let marshaller = JsonMarshaller;
        assert!(marshaller.decode_payload(b"{not json").is_err());
    }
}
