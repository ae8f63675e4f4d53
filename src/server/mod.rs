//! Listener-per-handler, client-session tasks, the shared queue, the
//! dispatcher (spec §4.3). Grounded on `original_source/core/server/base.py`
//! and teacher `ipc/mod.rs`'s `start_server`/accept-loop shape.

pub mod queue;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::adapter::{Adapter, AdapterList};
use crate::command::Command;
use crate::handler::Handler;
use crate::interface::{standard, Interface};
use crate::registry::CommandRegistry;

pub use session::SessionTable;

/// One `(address, handler)` binding the server accepts connections on.
/// Multiple bindings let one server speak several wire dialects on
/// different ports (spec §1).
pub struct PortBinding {
    pub addr: SocketAddr,
    pub handler: Arc<Handler>,
}

pub struct ServerBuilder {
    registry: CommandRegistry,
    adapters: AdapterList,
    bindings: Vec<PortBinding>,
    threaded_digest: bool,
    with_standard_interface: bool,
}

impl ServerBuilder {
    pub fn new() -> Self {
        ServerBuilder {
            registry: CommandRegistry::new(),
            adapters: AdapterList::new(),
            bindings: Vec::new(),
            threaded_digest: false,
            with_standard_interface: true,
        }
    }

    pub fn bind(mut self, addr: SocketAddr, handler: Arc<Handler>) -> Self {
        self.bindings.push(PortBinding { addr, handler });
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn command(self, command: Command) -> Self {
        self.registry
            .register(command)
            .expect("command registration failed at bring-up");
        self
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        for adapter in interface.adapters {
            self.adapters.push(adapter);
        }
        for command in interface.commands {
            self = self.command(command);
        }
        self
    }

    pub fn threaded_digest(mut self, enabled: bool) -> Self {
        self.threaded_digest = enabled;
        self
    }

    pub fn without_standard_interface(mut self) -> Self {
        self.with_standard_interface = false;
        self
    }

    pub fn build(self) -> Server {
        let registry = Arc::new(self.registry);
        let sessions = Arc::new(SessionTable::new());

        if self.with_standard_interface {
            let standard_interface = standard::build(registry.clone(), sessions.clone());
            for command in standard_interface.commands {
                registry
                    .register(command)
                    .expect("standard interface command keys never collide with user commands at bring-up");
            }
        }

        Server {
            registry,
            adapters: self.adapters,
            sessions,
            bindings: self.bindings,
            threaded_digest: self.threaded_digest,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        ServerBuilder::new()
    }
}

pub struct Server {
    registry: Arc<CommandRegistry>,
    adapters: AdapterList,
    sessions: Arc<SessionTable>,
    bindings: Vec<PortBinding>,
    threaded_digest: bool,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn sessions(&self) -> Arc<SessionTable> {
        self.sessions.clone()
    }

    /// Runs forever: one accept loop per binding, one queue worker. Returns
    /// only if every accept loop exits (which, barring a bind failure,
    /// means the process is shutting down).
    pub async fn run(self) -> std::io::Result<()> {
        let (queue_tx, queue_rx) = queue::channel();

        let worker = tokio::spawn(queue::run_worker(
            queue_rx,
            self.registry.clone(),
            self.adapters.clone(),
            self.threaded_digest,
        ));

        let mut accept_tasks = Vec::new();
        for binding in self.bindings {
            let listener = TcpListener::bind(binding.addr).await?;
            info!(addr = %binding.addr, "listening");
            let handler = binding.handler.clone();
            let adapters = self.adapters.clone();
            let sessions = self.sessions.clone();
            let queue_tx = queue_tx.clone();

            accept_tasks.push(tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, addr)) => {
                            let peer = addr.to_string();
                            let handler = handler.clone();
                            let adapters = adapters.clone();
                            let queue_tx = queue_tx.clone();
                            let sessions_for_task = sessions.clone();
                            let peer_for_task = peer.clone();

                            let join_handle = tokio::spawn(async move {
                                session::run_session(stream, peer_for_task.clone(), handler, adapters, queue_tx).await;
                                sessions_for_task.remove(&peer_for_task);
                            });
                            sessions.register(peer, join_handle.abort_handle());
                        }
                        Err(err) => {
                            error!(error = %err, "accept failed");
                        }
                    }
                }
            }));
        }

        drop(queue_tx);
        for task in accept_tasks {
            let _ = task.await;
        }
        worker.abort();
        Ok(())
    }
}
