//! Named-entry lookup with alias/former-alias resolution.
//!
//! Grounded on `original_source/core/command/handler.py`'s alias table and
//! teacher `runtime/registry.rs`'s `DashMap`-backed `ModuleRegistry` (same
//! shape: register once at bring-up, read concurrently forever after).

use std::sync::Arc;

use dashmap::DashMap;

use crate::command::Command;
use crate::error::{Result, SwitchboardError};

/// What alias lookup resolved to: a live current alias, or a deprecated
/// former alias (which the dispatcher must turn into a 201 + warning).
pub enum Resolved {
    Current(Arc<Command>),
    Former(Arc<Command>),
}

impl Resolved {
    pub fn command(&self) -> &Arc<Command> {
        match self {
            Resolved::Current(c) | Resolved::Former(c) => c,
        }
    }

    pub fn is_former(&self) -> bool {
        matches!(self, Resolved::Former(_))
    }
}

/// Commands are registered at bring-up and read-only thereafter (spec §3
/// "Lifecycle"); `DashMap` gives lock-free concurrent reads from every
/// session task without requiring an outer `RwLock` around the whole table.
#[derive(Default)]
pub struct CommandRegistry {
    by_key: DashMap<String, Arc<Command>>,
    current_aliases: DashMap<String, String>,
    former_aliases: DashMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry::default()
    }

    /// Register a command. Fails if its primary key is illegal, if any of
    /// its current aliases collide with an existing current alias, or if
    /// any of its former aliases collides with another command's former
    /// alias (spec §8 invariant 6).
    pub fn register(&self, command: Command) -> Result<()> {
        if !crate::command::is_legal_key(&command.key) {
            return Err(SwitchboardError::BadCommandArgs(format!(
                "illegal command key: {}",
                command.key
            )));
        }

        for alias in &command.aliases {
            if self.current_aliases.contains_key(alias) {
                return Err(SwitchboardError::BadCommandArgs(format!(
                    "alias '{alias}' already registered"
                )));
            }
        }
        for alias in &command.former_aliases {
            if self.former_aliases.contains_key(alias) {
                return Err(SwitchboardError::BadCommandArgs(format!(
                    "former alias '{alias}' collides with another command's former alias"
                )));
            }
        }

        let key = command.key.clone();
        let aliases = command.aliases.clone();
        let former_aliases = command.former_aliases.clone();
        self.by_key.insert(key.clone(), Arc::new(command));

        for alias in aliases {
            self.current_aliases.insert(alias, key.clone());
        }
        for alias in former_aliases {
            self.former_aliases.insert(alias, key.clone());
        }
        Ok(())
    }

    /// Resolve an alias. Current aliases are checked first, then former
    /// aliases (spec §4.4 "Lookup order").
    pub fn resolve(&self, alias: &str) -> Result<Resolved> {
        if let Some(key) = self.current_aliases.get(alias) {
            let command = self
                .by_key
                .get(key.as_str())
                .expect("current_aliases only ever points at a registered key")
                .clone();
            return Ok(Resolved::Current(command));
        }
        if let Some(key) = self.former_aliases.get(alias) {
            let command = self
                .by_key
                .get(key.as_str())
                .expect("former_aliases only ever points at a registered key")
                .clone();
            return Ok(Resolved::Former(command));
        }
        Err(SwitchboardError::UnrecognizedAlias(alias.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Command>> {
        self.by_key.get(key).map(|entry| entry.clone())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.current_aliases.contains_key(alias) || self.former_aliases.contains_key(alias)
    }

    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.by_key.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandContext;
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn noop_command(key: &str) -> Command {
        Command::builder(
            key,
            Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(Value::Null) })),
        )
        .build()
    }

    #[test]
    fn resolves_current_alias() {
        let registry = CommandRegistry::new();
        registry.register(noop_command("echo")).unwrap();
        assert!(matches!(registry.resolve("echo").unwrap(), Resolved::Current(_)));
    }

    #[test]
    fn resolves_former_alias_as_former() {
        let registry = CommandRegistry::new();
        let command = Command::builder(
            "current",
            Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(Value::Null) })),
        )
        .former_alias("old")
        .build();
        registry.register(command).unwrap();

        let resolved = registry.resolve("old").unwrap();
        assert!(resolved.is_former());
        assert_eq!(resolved.command().key, "current");
    }

    #[test]
    fn unrecognized_alias_is_an_error() {
        let registry = CommandRegistry::new();
        assert!(registry.resolve("nope").is_err());
    }

    #[test]
    fn illegal_key_is_rejected_at_registration() {
        let registry = CommandRegistry::new();
        assert!(registry.register(noop_command("Has-Dash")).is_err());
    }

    #[test]
    fn colliding_former_aliases_are_rejected_at_registration() {
        let registry = CommandRegistry::new();
        let first = Command::builder(
            "first",
            Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(Value::Null) })),
        )
        .former_alias("legacy")
        .build();
        let second = Command::builder(
            "second",
            Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(Value::Null) })),
        )
        .former_alias("legacy")
        .build();

        registry.register(first).unwrap();
        assert!(registry.register(second).is_err());
    }

    #[tokio::test]
    async fn invoke_through_registry_resolution() {
        let registry = CommandRegistry::new();
        registry.register(noop_command("echo")).unwrap();
        let resolved = registry.resolve("echo").unwrap();
        let ctx = CommandContext::new(uuid::Uuid::new_v4(), Default::default());
        let (value, _) = resolved
            .command()
            .invoke(ctx, Vec::new(), BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }
}
