//! Per-invocation context injected into commands that ask for it.
//!
//! Replaces the original `_header_data` kwarg-injection adapter with a
//! type-level opt-in (Design Note #9): a command declared `takes_header_data`
//! receives this as its first argument instead of reading a magic kwarg.

use uuid::Uuid;

use crate::package::HeaderMap;

#[derive(Debug, Clone)]
pub struct CommandContext {
    pub header: HeaderMap,
    pub txid: Uuid,
}

impl CommandContext {
    pub fn new(txid: Uuid, header: HeaderMap) -> Self {
        CommandContext { header, txid }
    }
}
