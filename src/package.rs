//! Question/Response value objects and the payload schema they share.
//!
//! `Package` is not a Rust trait with dynamic dispatch — the two Python
//! subclasses (`Question`, `Answer`) differ only in their payload fields,
//! so here they're two concrete structs that both expose `header_data()` /
//! `accept_encoding()` / `keep_alive()` through a small shared trait.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SwitchboardError};

/// A header value: string, integer, or bool — the three primitives spec §3
/// allows in `header_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Str(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Str(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

/// Ordered-enough header map. A `BTreeMap` keeps header emission
/// deterministic across dialects without needing a separate "sorted keys"
/// step at encode time.
pub type HeaderMap = BTreeMap<String, HeaderValue>;

pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const HEADER_CONNECTION: &str = "Connection";
pub const DEFAULT_ACCEPT_ENCODING: &str = "text/json";
pub const KEEP_ALIVE: &str = "keep-alive";

/// Shared envelope behavior for Question and Response.
pub trait Package {
    fn header_data(&self) -> &HeaderMap;
    fn header_data_mut(&mut self) -> &mut HeaderMap;

    fn accept_encoding(&self) -> &str {
        self.header_data()
            .get(HEADER_ACCEPT_ENCODING)
            .and_then(HeaderValue::as_str)
            .unwrap_or(DEFAULT_ACCEPT_ENCODING)
    }

    fn keep_alive(&self) -> bool {
        matches!(
            self.header_data().get(HEADER_CONNECTION).and_then(HeaderValue::as_str),
            Some(KEEP_ALIVE)
        )
    }
}

/// Client-to-server packet naming a command with arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub header_data: HeaderMap,
    pub command: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, Value>,
}

impl Question {
    pub fn new(command: impl Into<String>) -> Self {
        Question {
            header_data: HeaderMap::new(),
            command: command.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: BTreeMap<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        if keep_alive {
            self.header_data
                .insert(HEADER_CONNECTION.to_string(), HeaderValue::from(KEEP_ALIVE));
        } else {
            self.header_data.remove(HEADER_CONNECTION);
        }
        self
    }

    /// Validate the invariant from spec §3: an empty command is ill-formed.
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            return Err(SwitchboardError::BadQuestion(
                "question command must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Promote `header_data`/`command` embedded in `kwargs` into the real
    /// slots, per the dispatch algorithm in spec §4.3 step 3. The original
    /// `clacks` lets a caller smuggle header overrides or an override
    /// command name inside `kwargs` — this mirrors `Question.load()`.
    pub fn promote_embedded_fields(&mut self) {
        if let Some(Value::Object(embedded)) = self.kwargs.remove("header_data") {
            for (key, value) in embedded {
                if let Some(header_value) = json_to_header_value(&value) {
                    self.header_data.insert(key, header_value);
                }
            }
        }
        if let Some(Value::String(command)) = self.kwargs.remove("command") {
            self.command = command;
        }
    }
}

fn json_to_header_value(value: &Value) -> Option<HeaderValue> {
    match value {
        Value::String(s) => Some(HeaderValue::Str(s.clone())),
        Value::Bool(b) => Some(HeaderValue::Bool(*b)),
        Value::Number(n) => n.as_i64().map(HeaderValue::Int),
        _ => None,
    }
}

impl Package for Question {
    fn header_data(&self) -> &HeaderMap {
        &self.header_data
    }

    fn header_data_mut(&mut self) -> &mut HeaderMap {
        &mut self.header_data
    }
}

/// Server-to-client packet carrying a value, a status code, and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub header_data: HeaderMap,
    #[serde(default)]
    pub response: Value,
    #[serde(default = "default_code")]
    pub code: u32,
    #[serde(rename = "tb", skip_serializing_if = "Option::is_none", default)]
    pub traceback: Option<String>,
    #[serde(rename = "tb_type", skip_serializing_if = "Option::is_none", default)]
    pub traceback_type: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub info: BTreeMap<String, Value>,
}

fn default_code() -> u32 {
    200
}

impl Response {
    pub fn ok(response: Value) -> Self {
        Response {
            header_data: HeaderMap::new(),
            response,
            code: 200,
            traceback: None,
            traceback_type: None,
            warnings: Vec::new(),
            errors: Vec::new(),
            info: BTreeMap::new(),
        }
    }

    /// Build an error Response from a framework error, hex-encoding the
    /// textual rendering per spec §3/§7 ("hex-encoded textual description").
    pub fn from_error(error: &SwitchboardError) -> Self {
        let text = error.to_string();
        Response {
            header_data: HeaderMap::new(),
            response: Value::Null,
            code: error.code().0,
            traceback: Some(hex::encode(text.as_bytes())),
            traceback_type: Some(error.kind_key().to_string()),
            warnings: Vec::new(),
            errors: Vec::new(),
            info: BTreeMap::new(),
        }
    }

    /// Decode `tb` back to text. Falls back to the raw string if it isn't
    /// valid hex, mirroring `package.py`'s defensive `except: return value`.
    pub fn traceback_text(&self) -> Option<String> {
        let raw = self.traceback.as_ref()?;
        match hex::decode(raw) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => Some(raw.clone()),
        }
    }

    /// Invariant from spec §3: `code == 200` iff `traceback` is absent.
    pub fn check_code_traceback_invariant(&self) -> bool {
        (self.code == 200) == self.traceback.is_none()
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        if keep_alive {
            self.header_data
                .insert(HEADER_CONNECTION.to_string(), HeaderValue::from(KEEP_ALIVE));
        }
        self
    }
}

impl Package for Response {
    fn header_data(&self) -> &HeaderMap {
        &self.header_data
    }

    fn header_data_mut(&mut self) -> &mut HeaderMap {
        &mut self.header_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        let question = Question::new("");
        assert!(question.validate().is_err());
    }

    #[test]
    fn keep_alive_reads_connection_header() {
        let question = Question::new("echo").with_keep_alive(true);
        assert!(question.keep_alive());
    }

    #[test]
    fn accept_encoding_defaults_to_json() {
        let question = Question::new("echo");
        assert_eq!(question.accept_encoding(), DEFAULT_ACCEPT_ENCODING);
    }

    #[test]
    fn code_traceback_invariant_holds_for_ok_response() {
        let response = Response::ok(Value::String("hi".to_string()));
        assert!(response.check_code_traceback_invariant());
    }

    #[test]
    fn code_traceback_invariant_holds_for_error_response() {
        let err = SwitchboardError::CommandNotFound("missing".to_string());
        let response = Response::from_error(&err);
        assert!(response.check_code_traceback_invariant());
        assert_eq!(response.code, 404);
    }

    #[test]
    fn traceback_roundtrips_through_hex() {
        let err = SwitchboardError::BadQuestion("no command given".to_string());
        let response = Response::from_error(&err);
        assert_eq!(response.traceback_text().unwrap(), err.to_string());
    }

    #[test]
    fn promote_embedded_command_and_header() {
        let mut question = Question::new("placeholder");
        question
            .kwargs
            .insert("command".to_string(), Value::String("echo".to_string()));
        question.kwargs.insert(
            "header_data".to_string(),
            serde_json::json!({"X-Trace": "abc"}),
        );
        question.promote_embedded_fields();
        assert_eq!(question.command, "echo");
        assert_eq!(
            question.header_data.get("X-Trace").and_then(HeaderValue::as_str),
            Some("abc")
        );
    }
}
