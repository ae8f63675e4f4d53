//! Bundles of related commands (and optionally adapters) registered as a
//! unit. Grounded on `original_source/core/interface/base.py` and
//! `core/interface/server/standard.py` for the built-in bundle.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::adapter::Adapter;
use crate::command::Command;

/// A named bundle of commands, optionally carrying its own adapters that
/// should be registered alongside it.
pub struct Interface {
    pub name: String,
    pub commands: Vec<Command>,
    pub adapters: Vec<Arc<dyn Adapter>>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Interface {
            name: name.into(),
            commands: Vec::new(),
            adapters: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }
}

/// The built-in command bundle every server carries unless explicitly
/// suppressed (spec §6 "Built-in commands"), implemented over the same
/// `CommandRegistry`/session-table types the server already owns. The
/// closures here capture `Arc` handles to those shared structures so the
/// commands can be built once the server assembles its registry/session
/// table, hence the `build` free function rather than a fixed struct.
pub mod standard {
    use super::*;
    use crate::context::CommandContext;
    use crate::registry::CommandRegistry;
    use crate::server::session::SessionTable;

    type CtxAlias = CommandContext;

    /// Build the `StandardInterface` bundle. `registry`/`sessions` are the
    /// server's own shared registry and session table — these commands read
    /// them at call time, they don't own a private copy.
    pub fn build(registry: Arc<CommandRegistry>, sessions: Arc<SessionTable>) -> Interface {
        let list_commands = {
            let registry = registry.clone();
            Command::builder(
                "list_commands",
                Arc::new(move |_ctx: CtxAlias, _args, _kwargs| {
                    let registry = registry.clone();
                    Box::pin(async move { Ok(json!(registry.list_keys())) })
                }),
            )
            .build()
        };

        let command_exists = {
            let registry = registry.clone();
            Command::builder(
                "command_exists",
                Arc::new(move |_ctx: CtxAlias, args, _kwargs| {
                    let registry = registry.clone();
                    Box::pin(async move {
                        let name = args.first().and_then(Value::as_str).unwrap_or_default();
                        Ok(json!(registry.contains(name)))
                    })
                }),
            )
            .build()
        };

        let command_info = {
            let registry = registry.clone();
            Command::builder(
                "command_info",
                Arc::new(move |_ctx: CtxAlias, args, _kwargs| {
                    let registry = registry.clone();
                    Box::pin(async move {
                        let name = args.first().and_then(Value::as_str).unwrap_or_default();
                        match registry.get(name) {
                            Some(command) => Ok(json!({
                                "key": command.key,
                                "aliases": command.aliases,
                                "former_aliases": command.former_aliases,
                                "private": command.private,
                                "returns_status_code": command.returns_status_code,
                                "takes_header_data": command.takes_header_data,
                            })),
                            None => Ok(Value::Null),
                        }
                    })
                }),
            )
            .build()
        };

        let command_help = {
            let registry = registry.clone();
            Command::builder(
                "command_help",
                Arc::new(move |_ctx: CtxAlias, args, _kwargs| {
                    let registry = registry.clone();
                    Box::pin(async move {
                        let name = args.first().and_then(Value::as_str).unwrap_or_default();
                        Ok(match registry.get(name) {
                            Some(command) => json!(format!("{} (aliases: {})", command.key, command.aliases.join(", "))),
                            None => Value::Null,
                        })
                    })
                }),
            )
            .build()
        };

        let disconnect_client = {
            let sessions = sessions.clone();
            Command::builder(
                "disconnect_client",
                Arc::new(move |_ctx: CtxAlias, args, _kwargs| {
                    let sessions = sessions.clone();
                    Box::pin(async move {
                        let address = args.first().and_then(Value::as_str).unwrap_or_default();
                        Ok(json!(sessions.disconnect(address)))
                    })
                }),
            )
            .private()
            .build()
        };

        let shutdown = {
            let sessions = sessions.clone();
            Command::builder(
                "shutdown",
                Arc::new(move |_ctx: CtxAlias, _args, _kwargs| {
                    let sessions = sessions.clone();
                    Box::pin(async move {
                        sessions.disconnect_all();
                        Ok(Value::Bool(true))
                    })
                }),
            )
            .private()
            .build()
        };

        let implemented_interfaces = Command::builder(
            "implemented_interfaces",
            Arc::new(move |_ctx: CtxAlias, _args, _kwargs| Box::pin(async move { Ok(json!(["standard"])) })),
        )
        .build();

        let implements_interface = Command::builder(
            "implements_interface",
            Arc::new(move |_ctx: CtxAlias, args, _kwargs| {
                Box::pin(async move {
                    let name = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(Value::Bool(name == "standard"))
                })
            }),
        )
        .build();

        Interface::new("standard")
            .with_command(list_commands)
            .with_command(command_exists)
            .with_command(command_info)
            .with_command(command_help)
            .with_command(disconnect_client)
            .with_command(shutdown)
            .with_command(implemented_interfaces)
            .with_command(implements_interface)
    }
}
