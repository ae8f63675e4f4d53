//! Synchronous-per-call client proxy: one TCP connection, one handler.
//!
//! Grounded on `original_source/core/proxy/base.py`'s `ClientProxyBase`
//! (`connection_retries = 5`, connect-then-cache-`list_commands` bring-up,
//! `question`/`disconnect`).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapter::AdapterList;
use crate::error::{Result, SwitchboardError};
use crate::handler::Handler;
use crate::package::{HeaderMap, Package, Question, Response};

const CONNECTION_RETRIES: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);
const LIST_COMMANDS_BOUND: Duration = Duration::from_secs(10);

/// One TCP connection to one address, framed by one handler/marshaller
/// pair. Not safe to call concurrently from multiple callers (spec §4.7 —
/// "not supported without external locking"), enforced here with a
/// `Mutex` around the shared stream rather than by documentation alone.
pub struct ClientProxy {
    addr: std::net::SocketAddr,
    handler: Arc<Handler>,
    adapters: AdapterList,
    stream: Mutex<TcpStream>,
    cached_commands: Mutex<Option<Vec<String>>>,
}

impl ClientProxy {
    pub async fn connect(addr: std::net::SocketAddr, handler: Arc<Handler>, adapters: AdapterList) -> Result<Self> {
        let mut last_err = None;
        for attempt in 0..CONNECTION_RETRIES {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    let proxy = ClientProxy {
                        addr,
                        handler,
                        adapters,
                        stream: Mutex::new(stream),
                        cached_commands: Mutex::new(None),
                    };
                    proxy.prime_command_cache().await;
                    return Ok(proxy);
                }
                Err(err) => {
                    debug!(addr = %addr, attempt, error = %err, "connect attempt failed, retrying");
                    last_err = Some(err);
                    sleep(RETRY_BACKOFF).await;
                }
            }
        }
        Err(SwitchboardError::ClientConnectionFailed(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "connection refused".to_string()),
        ))
    }

    async fn prime_command_cache(&self) {
        match timeout(LIST_COMMANDS_BOUND, self.question("list_commands", Vec::new(), BTreeMap::new())).await {
            Ok(Ok(response)) => {
                if let Some(commands) = response.response.as_array() {
                    let commands = commands.iter().filter_map(|v| v.as_str().map(String::from)).collect();
                    *self.cached_commands.lock().await = Some(commands);
                }
            }
            Ok(Err(err)) => warn!(addr = %self.addr, error = %err, "failed to prime command cache"),
            Err(_) => warn!(addr = %self.addr, "timed out priming command cache"),
        }
    }

    pub async fn cached_commands(&self) -> Option<Vec<String>> {
        self.cached_commands.lock().await.clone()
    }

    /// Build a Question (with `Connection: keep-alive`), send it, block on
    /// the reply. A non-empty `tb` is re-raised as the mapped error kind.
    pub async fn question(&self, name: &str, args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Result<Response> {
        let mut question = Question::new(name).with_args(args).with_kwargs(kwargs).with_keep_alive(true);
        let txid = Uuid::new_v4();

        let mut stream = self.stream.lock().await;
        self.handler.send_one(&mut *stream, txid, &self.adapters, &mut question).await?;

        let received = self
            .handler
            .receive_one(&mut *stream, txid, &self.adapters)
            .await?
            .ok_or_else(|| SwitchboardError::ClientConnectionFailed("server closed connection".to_string()))?;

        response_from_wire(received)
    }

    /// As `question`, but fails with a timeout error if no reply arrives
    /// within `duration`.
    pub async fn timed_question(
        &self,
        name: &str,
        duration: Duration,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Response> {
        timeout(duration, self.question(name, args, kwargs))
            .await
            .map_err(|_| SwitchboardError::Timeout)?
    }

    pub async fn disconnect(&self) -> Result<()> {
        let local_addr = {
            let stream = self.stream.lock().await;
            stream.local_addr().map(|a| a.to_string()).unwrap_or_default()
        };
        let _ = self
            .question("disconnect_client", vec![Value::String(local_addr)], BTreeMap::new())
            .await;
        Ok(())
    }
}

fn response_from_wire((header, payload): (HeaderMap, Value)) -> Result<Response> {
    let mut response: Response =
        serde_json::from_value(payload).map_err(|e| SwitchboardError::UnmarshalError(e.to_string()))?;
    response.header_data = header;

    if let Some(traceback) = response.traceback_text() {
        if !traceback.is_empty() {
            let kind = response.traceback_type.as_deref().unwrap_or("unhandled_exception");
            return Err(SwitchboardError::from_kind_key(kind, traceback));
        }
    }
    Ok(response)
}
