//! Per-connection session state and the server-side client table.
//!
//! Grounded on `original_source/core/server/base.py`'s client table keyed
//! by peer address, and teacher `ipc/mod.rs`'s reader-task-per-connection
//! shape (here a tokio task instead of `std::thread::spawn`, since every
//! operation here is already async).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapter::AdapterList;
use crate::handler::{Handler, CONNECTION_LIFETIME};
use crate::package::{HeaderValue, HEADER_CONNECTION, KEEP_ALIVE};

use super::queue::{QueueItem, QueueSender};

/// Tracks live sessions by peer address so `disconnect_client`/`shutdown`
/// can reach in and close a connection the session loop itself doesn't
/// poll for externally-requested shutdown.
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<String, AbortHandle>,
}

impl SessionTable {
    pub fn new() -> Self {
        SessionTable::default()
    }

    pub fn register(&self, peer: String, handle: AbortHandle) {
        self.sessions.insert(peer, handle);
    }

    pub fn remove(&self, peer: &str) {
        self.sessions.remove(peer);
    }

    pub fn disconnect(&self, peer: &str) -> bool {
        if let Some((_, handle)) = self.sessions.remove(peer) {
            handle.abort();
            true
        } else {
            false
        }
    }

    pub fn disconnect_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().abort();
        }
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Drives one accepted connection: read a framed packet, hand it to the
/// queue, repeat only while the peer has declared keep-alive. A
/// non-keep-alive packet closes the session right after it's enqueued; the
/// idle window only bounds waiting for the next packet on a connection that
/// asked to stay open.
pub async fn run_session(
    stream: TcpStream,
    peer: String,
    handler: Arc<Handler>,
    adapters: AdapterList,
    queue: QueueSender,
) {
    let (mut read_half, write_half) = stream.into_split();
    let write_half = Arc::new(Mutex::new(write_half));

    loop {
        let txid = Uuid::new_v4();
        let received = timeout(CONNECTION_LIFETIME, handler.receive_one(&mut read_half, txid, &adapters)).await;

        let (header, payload) = match received {
            Err(_) => {
                debug!(peer, "session idle timeout, closing");
                break;
            }
            Ok(Err(err)) => {
                warn!(peer, error = %err, "framing error, closing session");
                break;
            }
            Ok(Ok(None)) => {
                debug!(peer, "peer closed connection");
                break;
            }
            Ok(Ok(Some(pair))) => pair,
        };

        let keep_alive = header.get(HEADER_CONNECTION).and_then(HeaderValue::as_str) == Some(KEEP_ALIVE);

        adapters.fire_server_pre_add_to_queue(txid);
        let item = QueueItem {
            handler: handler.clone(),
            write_half: write_half.clone(),
            txid,
            header,
            payload,
            peer: peer.clone(),
        };
        if queue.send(item).is_err() {
            warn!(peer, "queue worker gone, closing session");
            break;
        }

        if !keep_alive {
            debug!(peer, "non-keep-alive packet processed, closing session");
            break;
        }
    }
}
