//! Closed set of error kinds, each mapped to a wire status code.
//!
//! Replaces exception control flow with a sum type (see Design Note #9):
//! the dispatcher never needs to catch an unbounded set of exception
//! types, it matches on `SwitchboardError` and reads `.code()`/`.kind_key()`
//! straight off the variant.

use thiserror::Error;

/// Wire status codes, exactly as specced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnCode(pub u32);

impl ReturnCode {
    pub const NOT_RUN: ReturnCode = ReturnCode(0);
    pub const OK: ReturnCode = ReturnCode(200);
    pub const DEPRECATED: ReturnCode = ReturnCode(201);
    pub const CONNECTION_REJECTED: ReturnCode = ReturnCode(400);
    pub const NOT_FOUND: ReturnCode = ReturnCode(404);
    pub const ACCESS_DENIED: ReturnCode = ReturnCode(405);
    pub const SERVER_ERROR: ReturnCode = ReturnCode(500);
    pub const BAD_HEADER: ReturnCode = ReturnCode(501);
    pub const MARSHAL_ERROR: ReturnCode = ReturnCode(502);
    pub const UNMARSHAL_ERROR: ReturnCode = ReturnCode(503);
    pub const BAD_QUESTION: ReturnCode = ReturnCode(504);
    pub const BAD_RESPONSE: ReturnCode = ReturnCode(505);
    pub const UNHANDLED_EXCEPTION: ReturnCode = ReturnCode(600);
    pub const INVALID_COMMAND_RETURN_TYPE: ReturnCode = ReturnCode(621);
    pub const INVALID_COMMAND_ARGUMENTS: ReturnCode = ReturnCode(622);
}

/// Every fault the framework can raise, closed over the kinds named in
/// spec §7. Each variant knows its own wire code and registry key so the
/// dispatcher and the client's `tb_type` lookup share one source of truth.
#[derive(Debug, Error, Clone)]
pub enum SwitchboardError {
    #[error("unrecognized alias: {0}")]
    UnrecognizedAlias(String),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command is private: {0}")]
    CommandIsPrivate(String),

    #[error("bad command arguments: {0}")]
    BadCommandArgs(String),

    #[error("bad processor output: {0}")]
    BadArgProcessorOutput(String),

    #[error("unexpected return type: {0}")]
    UnexpectedReturnType(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("ill-formed question: {0}")]
    BadQuestion(String),

    #[error("malformed header: {0}")]
    BadHeader(String),

    #[error("marshal error: {0}")]
    MarshalError(String),

    #[error("unmarshal error: {0}")]
    UnmarshalError(String),

    #[error("client connection failed: {0}")]
    ClientConnectionFailed(String),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("{0}")]
    UnhandledException(String),
}

impl SwitchboardError {
    /// Wire status code this error maps to.
    pub fn code(&self) -> ReturnCode {
        match self {
            SwitchboardError::UnrecognizedAlias(_) => ReturnCode::NOT_FOUND,
            SwitchboardError::CommandNotFound(_) => ReturnCode::NOT_FOUND,
            SwitchboardError::CommandIsPrivate(_) => ReturnCode::ACCESS_DENIED,
            SwitchboardError::BadCommandArgs(_) => ReturnCode::INVALID_COMMAND_ARGUMENTS,
            SwitchboardError::BadArgProcessorOutput(_) => ReturnCode::INVALID_COMMAND_ARGUMENTS,
            SwitchboardError::UnexpectedReturnType(_) => ReturnCode::INVALID_COMMAND_RETURN_TYPE,
            SwitchboardError::BadResponse(_) => ReturnCode::BAD_RESPONSE,
            SwitchboardError::BadQuestion(_) => ReturnCode::BAD_QUESTION,
            SwitchboardError::BadHeader(_) => ReturnCode::BAD_HEADER,
            SwitchboardError::MarshalError(_) => ReturnCode::MARSHAL_ERROR,
            SwitchboardError::UnmarshalError(_) => ReturnCode::UNMARSHAL_ERROR,
            SwitchboardError::ClientConnectionFailed(_) => ReturnCode::CONNECTION_REJECTED,
            SwitchboardError::Timeout => ReturnCode::CONNECTION_REJECTED,
            SwitchboardError::Io(_) => ReturnCode::SERVER_ERROR,
            SwitchboardError::UnhandledException(_) => ReturnCode::UNHANDLED_EXCEPTION,
        }
    }

    /// Registry key used as `Response.traceback_type` on the wire.
    pub fn kind_key(&self) -> &'static str {
        match self {
            SwitchboardError::UnrecognizedAlias(_) => "unrecognized_alias",
            SwitchboardError::CommandNotFound(_) => "command_not_found",
            SwitchboardError::CommandIsPrivate(_) => "command_is_private",
            SwitchboardError::BadCommandArgs(_) => "bad_command_args",
            SwitchboardError::BadArgProcessorOutput(_) => "bad_arg_processor_output",
            SwitchboardError::UnexpectedReturnType(_) => "unexpected_return_type",
            SwitchboardError::BadResponse(_) => "bad_response",
            SwitchboardError::BadQuestion(_) => "bad_question",
            SwitchboardError::BadHeader(_) => "bad_header",
            SwitchboardError::MarshalError(_) => "marshal_error",
            SwitchboardError::UnmarshalError(_) => "unmarshal_error",
            SwitchboardError::ClientConnectionFailed(_) => "client_connection_failed",
            SwitchboardError::Timeout => "timeout",
            SwitchboardError::Io(_) => "io_error",
            SwitchboardError::UnhandledException(_) => "unhandled_exception",
        }
    }

    /// Look up a kind by its registry key, falling back to a generic kind
    /// when the key is unrecognized (mirrors the client-side `tb_type`
    /// lookup in spec §7: "falling back to a generic error").
    pub fn from_kind_key(key: &str, message: String) -> SwitchboardError {
        match key {
            "unrecognized_alias" => SwitchboardError::UnrecognizedAlias(message),
            "command_not_found" => SwitchboardError::CommandNotFound(message),
            "command_is_private" => SwitchboardError::CommandIsPrivate(message),
            "bad_command_args" => SwitchboardError::BadCommandArgs(message),
            "bad_arg_processor_output" => SwitchboardError::BadArgProcessorOutput(message),
            "unexpected_return_type" => SwitchboardError::UnexpectedReturnType(message),
            "bad_response" => SwitchboardError::BadResponse(message),
            "bad_question" => SwitchboardError::BadQuestion(message),
            "bad_header" => SwitchboardError::BadHeader(message),
            "marshal_error" => SwitchboardError::MarshalError(message),
            "unmarshal_error" => SwitchboardError::UnmarshalError(message),
            "client_connection_failed" => SwitchboardError::ClientConnectionFailed(message),
            "timeout" => SwitchboardError::Timeout,
            "io_error" => SwitchboardError::Io(message),
            _ => SwitchboardError::UnhandledException(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwitchboardError>;
