//! Wire framing: separate header from body, drive one connection.
//!
//! Grounded on `original_source/core/handler/base.py`. A `Handler` pairs a
//! [`HeaderCodec`] (header dialect) with a [`Marshaller`] (body dialect) —
//! the two are independently pluggable, so an XML header can carry a JSON
//! body if a deployment wants that.

pub mod json;
pub mod simple;
pub mod xml;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use uuid::Uuid;

pub use json::JsonHeaderCodec;
pub use simple::SimpleHeaderCodec;
pub use xml::XmlHeaderCodec;

use crate::adapter::AdapterList;
use crate::error::{Result, SwitchboardError};
use crate::marshaller::Marshaller;
use crate::package::{
    HeaderMap, HeaderValue, Package, Response, DEFAULT_ACCEPT_ENCODING, HEADER_ACCEPT_ENCODING,
    HEADER_CONNECTION, HEADER_CONTENT_LENGTH, KEEP_ALIVE,
};

/// Separates header bytes from body bytes on the wire.
pub const DELIMITER: &[u8; 4] = b"\r\n\r\n";
/// Per-read socket timeout (`original_source` `CONNECTION_TIMEOUT`).
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);
/// Idle window after which a session is eligible for close (`CONNECTION_LIFETIME`).
pub const CONNECTION_LIFETIME: Duration = Duration::from_secs(30);
/// Body read chunk size (`BUFFER_SIZE`).
pub const BUFFER_SIZE: usize = 16384;
/// Hardening supplement (not present in the original): cap on accumulated
/// header bytes before a connection is abandoned as a protocol error.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 1024 * 1024;

/// Encodes/decodes the header half of a wire packet. The three reference
/// dialects (simple, JSON, XML) all describe the same flat `HeaderMap`.
pub trait HeaderCodec: Send + Sync {
    fn encode_header(&self, header: &HeaderMap) -> Result<Vec<u8>>;
    fn decode_header(&self, bytes: &[u8]) -> Result<HeaderMap>;
}

fn content_length(header: &HeaderMap) -> usize {
    match header.get(HEADER_CONTENT_LENGTH) {
        Some(HeaderValue::Int(n)) if *n > 0 => *n as usize,
        Some(HeaderValue::Str(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Frames a connection: header dialect + body marshaller + adapter hooks.
pub struct Handler {
    pub header_codec: Arc<dyn HeaderCodec>,
    pub marshaller: Arc<dyn Marshaller>,
    pub max_header_bytes: usize,
}

impl Handler {
    pub fn new(header_codec: Arc<dyn HeaderCodec>, marshaller: Arc<dyn Marshaller>) -> Self {
        Handler {
            header_codec,
            marshaller,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }

    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    /// Receive-one protocol from spec §4.2. Returns `Ok(None)` on a clean
    /// peer close before any header bytes arrive.
    pub async fn receive_one<S>(
        &self,
        stream: &mut S,
        txid: Uuid,
        adapters: &AdapterList,
    ) -> Result<Option<(HeaderMap, Value)>>
    where
        S: AsyncRead + Unpin + Send,
    {
        adapters.fire_handler_pre_receive_header(txid);

        let header_bytes = match self.read_until_delimiter(stream).await? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let mut header = self.header_codec.decode_header(&header_bytes)?;
        adapters.fire_handler_post_receive_header(txid, &mut header);

        adapters.fire_handler_pre_receive_content(txid, &header);
        let needed = content_length(&header);
        let body_bytes = self.read_exact_chunked(stream, needed).await?;
        let mut body = self.marshaller.decode(txid, adapters, &header, &body_bytes)?;
        adapters.fire_handler_post_receive_content(txid, &header, &mut body);

        Ok(Some((header, body)))
    }

    /// Send-one protocol from spec §4.2.
    pub async fn send_one<S, P>(
        &self,
        stream: &mut S,
        txid: Uuid,
        adapters: &AdapterList,
        package: &mut P,
    ) -> Result<()>
    where
        S: AsyncWrite + Unpin + Send,
        P: Package + serde::Serialize,
    {
        let mut payload = serde_json::to_value(&*package)
            .map_err(|e| SwitchboardError::MarshalError(e.to_string()))?;
        adapters.fire_handler_pre_compile_buffer(txid, package.header_data_mut(), &mut payload);

        let body = match self.marshaller.encode(txid, adapters, &payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                let fallback = Response::from_error(&err);
                let fallback_payload = serde_json::to_value(&fallback)
                    .map_err(|e| SwitchboardError::MarshalError(e.to_string()))?;
                self.marshaller.encode_payload(&fallback_payload)?
            }
        };
        adapters.fire_handler_post_compile_buffer(txid, &body);

        let keep_alive = package.keep_alive();
        let accept_encoding = package.accept_encoding().to_string();
        let header = package.header_data_mut();
        header.insert(HEADER_CONTENT_LENGTH.to_string(), HeaderValue::from(body.len() as i64));
        header.insert(HEADER_ACCEPT_ENCODING.to_string(), HeaderValue::from(accept_encoding));
        if keep_alive {
            header.insert(HEADER_CONNECTION.to_string(), HeaderValue::from(KEEP_ALIVE));
        }

        let mut header_clone = header.clone();
        let mut respond_body = payload.clone();
        adapters.fire_handler_pre_respond(txid, &mut header_clone, &mut respond_body);
        *header = header_clone;
        header.insert(HEADER_CONTENT_LENGTH.to_string(), HeaderValue::from(body.len() as i64));

        let header_bytes = self.header_codec.encode_header(header)?;

        let mut wire = Vec::with_capacity(header_bytes.len() + DELIMITER.len() + body.len());
        wire.extend_from_slice(&header_bytes);
        wire.extend_from_slice(DELIMITER);
        wire.extend_from_slice(&body);

        stream
            .write_all(&wire)
            .await
            .map_err(|e| SwitchboardError::Io(e.to_string()))?;
        stream.flush().await.map_err(|e| SwitchboardError::Io(e.to_string()))?;

        adapters.fire_handler_post_respond(txid);
        Ok(())
    }

    async fn read_until_delimiter<S>(&self, stream: &mut S) -> Result<Option<Vec<u8>>>
    where
        S: AsyncRead + Unpin + Send,
    {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let read = timeout(CONNECTION_TIMEOUT, stream.read(&mut byte))
                .await
                .map_err(|_| SwitchboardError::Io("timed out reading header".to_string()))?
                .map_err(|e| SwitchboardError::Io(e.to_string()))?;
            if read == 0 {
                return if buf.is_empty() {
                    Ok(None)
                } else {
                    Err(SwitchboardError::BadHeader("connection closed mid-header".to_string()))
                };
            }
            buf.push(byte[0]);
            if buf.len() > self.max_header_bytes {
                return Err(SwitchboardError::BadHeader(format!(
                    "header exceeded {} bytes",
                    self.max_header_bytes
                )));
            }
            if buf.ends_with(DELIMITER) {
                buf.truncate(buf.len() - DELIMITER.len());
                return Ok(Some(buf));
            }
        }
    }

    async fn read_exact_chunked<S>(&self, stream: &mut S, needed: usize) -> Result<Vec<u8>>
    where
        S: AsyncRead + Unpin + Send,
    {
        if needed == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(needed);
        let mut chunk = vec![0u8; BUFFER_SIZE.min(needed)];
        while out.len() < needed {
            let remaining = needed - out.len();
            let to_read = remaining.min(chunk.len());
            let read = timeout(CONNECTION_TIMEOUT, stream.read(&mut chunk[..to_read]))
                .await
                .map_err(|_| SwitchboardError::Io("timed out reading body".to_string()))?
                .map_err(|e| SwitchboardError::Io(e.to_string()))?;
            if read == 0 {
                return Err(SwitchboardError::BadHeader("connection closed mid-body".to_string()));
            }
            out.extend_from_slice(&chunk[..read]);
        }
        Ok(out)
    }
}
