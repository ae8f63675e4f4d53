//! Ordered interceptors at every named hook point in a transaction.
//!
//! Adapters fire in registration order (spec §4.6/§5). No hook may raise —
//! a panicking adapter is caught at the call site and logged, never
//! allowed to abort the transaction, mirroring the original `clacks`
//! adapter base class where every hook is a no-op `pass` by default and
//! the server wraps each call in its own try/except.

pub mod stock;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::package::{HeaderMap, Question, Response};

pub use stock::{DeprecationWarnings, GnuTerryPratchett, HeaderAsKwarg, Profiling, StatusCode};

/// Full 14-hook contract from spec §4.6. Every method defaults to a no-op
/// so an adapter only needs to override the hooks it cares about.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str {
        "adapter"
    }

    fn handler_pre_receive_header(&self, _txid: Uuid) {}
    fn handler_post_receive_header(&self, _txid: Uuid, _header: &mut HeaderMap) {}
    fn handler_pre_receive_content(&self, _txid: Uuid, _header: &HeaderMap) {}
    fn handler_post_receive_content(&self, _txid: Uuid, _header: &HeaderMap, _body: &mut Value) {}

    fn handler_pre_compile_buffer(&self, _txid: Uuid, _header: &mut HeaderMap, _body: &mut Value) {}
    fn handler_post_compile_buffer(&self, _txid: Uuid, _bytes: &[u8]) {}

    fn handler_pre_respond(&self, _txid: Uuid, _header: &mut HeaderMap, _body: &mut Value) {}
    fn handler_post_respond(&self, _txid: Uuid) {}

    fn marshaller_pre_encode_package(&self, _txid: Uuid, _payload: &Value) {}
    fn marshaller_post_encode_package(&self, _txid: Uuid, _bytes: &[u8]) {}
    fn marshaller_pre_decode_package(&self, _txid: Uuid, _header: &HeaderMap, _bytes: &[u8]) {}
    fn marshaller_post_decode_package(&self, _txid: Uuid, _payload: &Value) {}

    fn server_pre_add_to_queue(&self, _txid: Uuid) {}
    fn server_post_remove_from_queue(&self, _txid: Uuid) {}
    fn server_pre_digest(&self, _txid: Uuid, _header: &mut HeaderMap, _question: &mut Question) {}
    fn server_post_digest(&self, _txid: Uuid, _question: &Question, _response: &mut Response) {}
}

/// An ordered, registration-order list of adapters. Owns the "fire a hook
/// on every adapter, swallow panics" behavior shared by the handler,
/// marshaller, and server.
#[derive(Clone, Default)]
pub struct AdapterList {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl AdapterList {
    pub fn new() -> Self {
        AdapterList { adapters: Vec::new() }
    }

    pub fn push(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    fn guard<F: FnOnce()>(&self, hook: &str, name: &str, f: F) {
        if catch_unwind(AssertUnwindSafe(f)).is_err() {
            warn!(adapter = name, hook, "adapter hook panicked, swallowing");
        }
    }

    pub fn fire_handler_pre_receive_header(&self, txid: Uuid) {
        for adapter in &self.adapters {
            self.guard("handler_pre_receive_header", adapter.name(), || {
                adapter.handler_pre_receive_header(txid)
            });
        }
    }

    pub fn fire_handler_post_receive_header(&self, txid: Uuid, header: &mut HeaderMap) {
        for adapter in &self.adapters {
            let header = &mut *header;
            self.guard("handler_post_receive_header", adapter.name(), move || {
                adapter.handler_post_receive_header(txid, header)
            });
        }
    }

    pub fn fire_handler_pre_receive_content(&self, txid: Uuid, header: &HeaderMap) {
        for adapter in &self.adapters {
            self.guard("handler_pre_receive_content", adapter.name(), || {
                adapter.handler_pre_receive_content(txid, header)
            });
        }
    }

    pub fn fire_handler_post_receive_content(&self, txid: Uuid, header: &HeaderMap, body: &mut Value) {
        for adapter in &self.adapters {
            let body = &mut *body;
            self.guard("handler_post_receive_content", adapter.name(), move || {
                adapter.handler_post_receive_content(txid, header, body)
            });
        }
    }

    pub fn fire_handler_pre_compile_buffer(&self, txid: Uuid, header: &mut HeaderMap, body: &mut Value) {
        for adapter in &self.adapters {
            let header = &mut *header;
            let body = &mut *body;
            self.guard("handler_pre_compile_buffer", adapter.name(), move || {
                adapter.handler_pre_compile_buffer(txid, header, body)
            });
        }
    }

    pub fn fire_handler_post_compile_buffer(&self, txid: Uuid, bytes: &[u8]) {
        for adapter in &self.adapters {
            self.guard("handler_post_compile_buffer", adapter.name(), || {
                adapter.handler_post_compile_buffer(txid, bytes)
            });
        }
    }

    pub fn fire_handler_pre_respond(&self, txid: Uuid, header: &mut HeaderMap, body: &mut Value) {
        for adapter in &self.adapters {
            let header = &mut *header;
            let body = &mut *body;
            self.guard("handler_pre_respond", adapter.name(), move || {
                adapter.handler_pre_respond(txid, header, body)
            });
        }
    }

    pub fn fire_handler_post_respond(&self, txid: Uuid) {
        for adapter in &self.adapters {
            self.guard("handler_post_respond", adapter.name(), || {
                adapter.handler_post_respond(txid)
            });
        }
    }

    pub fn fire_marshaller_pre_encode_package(&self, txid: Uuid, payload: &Value) {
        for adapter in &self.adapters {
            self.guard("marshaller_pre_encode_package", adapter.name(), || {
                adapter.marshaller_pre_encode_package(txid, payload)
            });
        }
    }

    pub fn fire_marshaller_post_encode_package(&self, txid: Uuid, bytes: &[u8]) {
        for adapter in &self.adapters {
            self.guard("marshaller_post_encode_package", adapter.name(), || {
                adapter.marshaller_post_encode_package(txid, bytes)
            });
        }
    }

    pub fn fire_marshaller_pre_decode_package(&self, txid: Uuid, header: &HeaderMap, bytes: &[u8]) {
        for adapter in &self.adapters {
            self.guard("marshaller_pre_decode_package", adapter.name(), || {
                adapter.marshaller_pre_decode_package(txid, header, bytes)
            });
        }
    }

    pub fn fire_marshaller_post_decode_package(&self, txid: Uuid, payload: &Value) {
        for adapter in &self.adapters {
            self.guard("marshaller_post_decode_package", adapter.name(), || {
                adapter.marshaller_post_decode_package(txid, payload)
            });
        }
    }

    pub fn fire_server_pre_add_to_queue(&self, txid: Uuid) {
        for adapter in &self.adapters {
            self.guard("server_pre_add_to_queue", adapter.name(), || {
                adapter.server_pre_add_to_queue(txid)
            });
        }
    }

    pub fn fire_server_post_remove_from_queue(&self, txid: Uuid) {
        for adapter in &self.adapters {
            self.guard("server_post_remove_from_queue", adapter.name(), || {
                adapter.server_post_remove_from_queue(txid)
            });
        }
    }

    pub fn fire_server_pre_digest(&self, txid: Uuid, header: &mut HeaderMap, question: &mut Question) {
        for adapter in &self.adapters {
            let header = &mut *header;
            let question = &mut *question;
            self.guard("server_pre_digest", adapter.name(), move || {
                adapter.server_pre_digest(txid, header, question)
            });
        }
    }

    pub fn fire_server_post_digest(&self, txid: Uuid, question: &Question, response: &mut Response) {
        for adapter in &self.adapters {
            let response = &mut *response;
            self.guard("server_post_digest", adapter.name(), move || {
                adapter.server_post_digest(txid, question, response)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter(Arc<AtomicUsize>);

    impl Adapter for CountingAdapter {
        fn name(&self) -> &str {
            "counting"
        }

        fn server_pre_digest(&self, _txid: Uuid, _header: &mut HeaderMap, _question: &mut Question) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingAdapter;

    impl Adapter for PanickingAdapter {
        fn name(&self) -> &str {
            "panicking"
        }

        fn server_pre_digest(&self, _txid: Uuid, _header: &mut HeaderMap, _question: &mut Question) {
            panic!("boom");
        }
    }

    #[test]
    fn hooks_fire_in_registration_order_and_survive_panics() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut adapters = AdapterList::new();
        adapters.push(Arc::new(PanickingAdapter));
        adapters.push(Arc::new(CountingAdapter(counter.clone())));

        let mut header = HeaderMap::new();
        let mut question = Question::new("echo");
        adapters.fire_server_pre_digest(Uuid::new_v4(), &mut header, &mut question);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
