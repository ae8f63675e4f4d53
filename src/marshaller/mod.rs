//! Payload bytes <-> structured payload conversion.
//!
//! A marshaller is deliberately narrow: `encode`/`decode` around
//! `serde_json::Value`, with the four marshaller adapter hooks fired around
//! the inner conversion, per spec §4.1.

pub mod json;
pub mod simple;

use serde_json::Value;
use uuid::Uuid;

use crate::adapter::AdapterList;
use crate::error::Result;
use crate::package::HeaderMap;

pub use json::JsonMarshaller;
pub use simple::SimpleMarshaller;

pub trait Marshaller: Send + Sync {
    fn encode_payload(&self, payload: &Value) -> Result<Vec<u8>>;
    fn decode_payload(&self, bytes: &[u8]) -> Result<Value>;

    fn encode(&self, txid: Uuid, adapters: &AdapterList, payload: &Value) -> Result<Vec<u8>> {
        adapters.fire_marshaller_pre_encode_package(txid, payload);
        let bytes = self.encode_payload(payload)?;
        adapters.fire_marshaller_post_encode_package(txid, &bytes);
        Ok(bytes)
    }

    fn decode(&self, txid: Uuid, adapters: &AdapterList, header: &HeaderMap, bytes: &[u8]) -> Result<Value> {
        adapters.fire_marshaller_pre_decode_package(txid, header, bytes);
        let payload = self.decode_payload(bytes)?;
        adapters.fire_marshaller_post_decode_package(txid, &payload);
        Ok(payload)
    }
}
