//! Pluggable RPC server/client framework: wire handlers, marshallers, an
//! adapter pipeline, and an ordered per-connection command queue.

pub mod adapter;
pub mod client;
pub mod command;
pub mod context;
pub mod error;
pub mod handler;
pub mod interface;
pub mod marshaller;
pub mod package;
pub mod registry;
pub mod server;

pub use client::ClientProxy;
pub use error::{Result, SwitchboardError};
pub use server::{Server, ServerBuilder};
