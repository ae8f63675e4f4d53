//! The five stock adapters from spec §4.6, each grounded on its Python
//! counterpart under `original_source/core/adapters/`.
//!
//! `HeaderAsKwarg` and `StatusCode` need to know facts about the *resolved
//! command* (`takes_header_data`, `returns_status_code`) that the hook
//! signatures don't carry directly. The dispatcher stamps those facts into
//! `Question.kwargs` under the marker keys below before firing
//! `server_pre_digest`/`server_post_digest`; this mirrors how the original
//! `clacks` adapters read `command.takes_header_data` off the command object
//! it already has in hand during digest.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::package::{HeaderMap, HeaderValue, Package, Question, Response};

use super::Adapter;

/// Set by the dispatcher when the inbound alias is a former (deprecated)
/// alias of the resolved command, carrying the resolved command's primary
/// key so the warning text can name it.
pub const MARKER_FORMER_ALIAS_TARGET: &str = "__former_alias_target";
/// Set by the dispatcher when the resolved command is `takes_header_data`.
pub const MARKER_TAKES_HEADER_DATA: &str = "__takes_header_data";
/// Set by the dispatcher when the resolved command is `returns_status_code`.
pub const MARKER_RETURNS_STATUS_CODE: &str = "__returns_status_code";

pub const HEADER_DATA_KWARG: &str = "_header_data";
pub const CLACKS_HEADER: &str = "X-Clacks-Overhead";
pub const CLACKS_MESSAGE: &str = "GNU Terry Pratchett";

/// Grounded on `original_source/core/adapters/deprecation_warnings.py`.
#[derive(Default)]
pub struct DeprecationWarnings;

impl Adapter for DeprecationWarnings {
    fn name(&self) -> &str {
        "deprecation_warnings"
    }

    fn server_post_digest(&self, _txid: Uuid, question: &Question, response: &mut Response) {
        if let Some(Value::String(target)) = question.kwargs.get(MARKER_FORMER_ALIAS_TARGET) {
            response
                .warnings
                .push(format!("this alias is deprecated, use '{target}' instead"));
            if response.code == 200 {
                response.code = 201;
            }
        }
    }
}

/// Grounded on `original_source/core/adapters/gnutp.py`. GNU Terry
/// Pratchett — https://www.gnuterrypratchett.com/.
#[derive(Default)]
pub struct GnuTerryPratchett;

impl Adapter for GnuTerryPratchett {
    fn name(&self) -> &str {
        "gnu_terry_pratchett"
    }

    fn handler_pre_respond(&self, _txid: Uuid, header: &mut HeaderMap, _body: &mut Value) {
        header.insert(CLACKS_HEADER.to_string(), HeaderValue::from(CLACKS_MESSAGE));
    }
}

/// Grounded on `original_source/core/adapters/header_data_as_kwarg.py`.
#[derive(Default)]
pub struct HeaderAsKwarg;

impl Adapter for HeaderAsKwarg {
    fn name(&self) -> &str {
        "header_as_kwarg"
    }

    fn server_pre_digest(&self, _txid: Uuid, header: &mut HeaderMap, question: &mut Question) {
        if question.kwargs.contains_key(MARKER_TAKES_HEADER_DATA) {
            let header_json: serde_json::Map<String, Value> = header
                .iter()
                .map(|(k, v)| (k.clone(), header_value_to_json(v)))
                .collect();
            question
                .kwargs
                .insert(HEADER_DATA_KWARG.to_string(), Value::Object(header_json));
        }
    }
}

fn header_value_to_json(value: &HeaderValue) -> Value {
    match value {
        HeaderValue::Str(s) => Value::String(s.clone()),
        HeaderValue::Int(i) => json!(i),
        HeaderValue::Bool(b) => Value::Bool(*b),
    }
}

/// Grounded on `original_source/core/adapters/status_code.py`. The command's
/// return value is expected to be a two-element `[value, code]` array; this
/// splits it back into `response.response` / `response.code`.
#[derive(Default)]
pub struct StatusCode;

impl Adapter for StatusCode {
    fn name(&self) -> &str {
        "status_code"
    }

    fn server_post_digest(&self, _txid: Uuid, question: &Question, response: &mut Response) {
        if !question.kwargs.contains_key(MARKER_RETURNS_STATUS_CODE) {
            return;
        }
        if let Value::Array(pair) = response.response.clone() {
            if pair.len() == 2 {
                response.response = pair[0].clone();
                if let Some(code) = pair[1].as_u64() {
                    response.code = code as u32;
                }
            }
        }
    }
}

/// Grounded on `original_source/core/adapters/profiling.py`. Tracks wall
/// time per transaction and reports it back to the caller, rather than
/// shelling out to a real profiler — the original uses `cProfile`, which has
/// no direct Rust analogue worth the dependency for this scope.
///
/// `server_post_digest` fires strictly before `handler_pre_respond` in the
/// real pipeline (`server/queue.rs` digests the question, then
/// `handler.send_one` fires the respond hooks), so the elapsed time has to
/// be measured at `server_post_digest` and handed off for
/// `handler_pre_respond` to attach — measuring at `handler_pre_respond`
/// directly would find nothing to measure against.
#[derive(Default)]
pub struct Profiling {
    started: dashmap::DashMap<Uuid, std::time::Instant>,
    elapsed_ms: dashmap::DashMap<Uuid, f64>,
}

impl Profiling {
    pub fn new() -> Self {
        Profiling {
            started: dashmap::DashMap::new(),
            elapsed_ms: dashmap::DashMap::new(),
        }
    }
}

impl Adapter for Profiling {
    fn name(&self) -> &str {
        "profiling"
    }

    fn server_pre_digest(&self, txid: Uuid, _header: &mut HeaderMap, _question: &mut Question) {
        self.started.insert(txid, std::time::Instant::now());
    }

    fn server_post_digest(&self, txid: Uuid, _question: &Question, _response: &mut Response) {
        if let Some((_, started)) = self.started.remove(&txid) {
            self.elapsed_ms.insert(txid, started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    fn handler_pre_respond(&self, txid: Uuid, _header: &mut HeaderMap, body: &mut Value) {
        if let Some((_, elapsed_ms)) = self.elapsed_ms.remove(&txid) {
            if let Value::Object(map) = body {
                map.insert("profiling".to_string(), json!({ "elapsed_ms": elapsed_ms }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gnu_terry_pratchett_injects_header() {
        let adapter = GnuTerryPratchett;
        let mut header = HeaderMap::new();
        let mut body = Value::Null;
        adapter.handler_pre_respond(Uuid::new_v4(), &mut header, &mut body);
        assert_eq!(
            header.get(CLACKS_HEADER).and_then(HeaderValue::as_str),
            Some(CLACKS_MESSAGE)
        );
    }

    #[test]
    fn deprecation_warning_bumps_code_when_marked() {
        let adapter = DeprecationWarnings;
        let mut question = Question::new("old_name");
        question
            .kwargs
            .insert(MARKER_FORMER_ALIAS_TARGET.to_string(), Value::String("new_name".to_string()));
        let mut response = Response::ok(Value::Null);
        adapter.server_post_digest(Uuid::new_v4(), &question, &mut response);
        assert_eq!(response.code, 201);
        assert_eq!(response.warnings.len(), 1);
        assert!(response.warnings[0].contains("new_name"));
    }

    #[test]
    fn deprecation_warning_does_nothing_without_marker() {
        let adapter = DeprecationWarnings;
        let question = Question::new("current");
        let mut response = Response::ok(Value::Null);
        adapter.server_post_digest(Uuid::new_v4(), &question, &mut response);
        assert_eq!(response.code, 200);
        assert!(response.warnings.is_empty());
    }

    #[test]
    fn header_as_kwarg_only_fires_when_marked() {
        let adapter = HeaderAsKwarg;
        let mut header = HeaderMap::new();
        header.insert("X-Trace".to_string(), HeaderValue::from("abc"));
        let mut question = Question::new("needs_header");
        question
            .kwargs
            .insert(MARKER_TAKES_HEADER_DATA.to_string(), Value::Bool(true));
        adapter.server_pre_digest(Uuid::new_v4(), &mut header, &mut question);
        assert!(question.kwargs.contains_key(HEADER_DATA_KWARG));
    }

    #[test]
    fn status_code_splits_pair_when_marked() {
        let adapter = StatusCode;
        let mut question = Question::new("returns_pair");
        question
            .kwargs
            .insert(MARKER_RETURNS_STATUS_CODE.to_string(), Value::Bool(true));
        let mut response = Response::ok(json!(["hello", 201]));
        adapter.server_post_digest(Uuid::new_v4(), &question, &mut response);
        assert_eq!(response.response, json!("hello"));
        assert_eq!(response.code, 201);
    }

    #[test]
    fn profiling_attaches_summary_on_respond() {
        let adapter = Profiling::new();
        let txid = Uuid::new_v4();
        let mut header = HeaderMap::new();
        let mut question = Question::new("echo");
        let mut response = Response::ok(Value::Null);
        adapter.server_pre_digest(txid, &mut header, &mut question);
        adapter.server_post_digest(txid, &question, &mut response);
        let mut body = json!({"response": "hi"});
        adapter.handler_pre_respond(txid, &mut header, &mut body);
        assert!(body.get("profiling").is_some());
    }
}
