//! Named, registered callable entries with metadata.
//!
//! Grounded on `original_source/core/command/command.py`. The original
//! assembles commands by introspecting bound methods; here registration is
//! explicit (Design Note #9): a [`CommandBuilder`] wraps a boxed async
//! closure with its aliases, visibility, and processor chains.

pub mod processors;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::context::CommandContext;
use crate::error::{Result, SwitchboardError};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The underlying implementation a Command wraps. Receives the processed
/// positional/keyword arguments plus the invocation context.
pub type CommandCallable =
    Arc<dyn Fn(CommandContext, Vec<Value>, BTreeMap<String, Value>) -> BoxFuture<Result<Value>> + Send + Sync>;

/// `(command_key, args, kwargs) -> (args', kwargs')`, chained in declaration order.
pub type ArgProcessor =
    Arc<dyn Fn(&str, Vec<Value>, BTreeMap<String, Value>) -> Result<(Vec<Value>, BTreeMap<String, Value>)> + Send + Sync>;

/// `(command_key, value) -> value'`, chained in declaration order.
pub type ResultProcessor = Arc<dyn Fn(&str, Value) -> Result<Value> + Send + Sync>;

pub struct Command {
    pub key: String,
    pub aliases: Vec<String>,
    pub former_aliases: Vec<String>,
    pub private: bool,
    pub returns_status_code: bool,
    pub takes_header_data: bool,
    pub arg_processors: Vec<ArgProcessor>,
    pub result_processors: Vec<ResultProcessor>,
    callable: CommandCallable,
}

impl Command {
    pub fn builder(key: impl Into<String>, callable: CommandCallable) -> CommandBuilder {
        CommandBuilder::new(key, callable)
    }

    /// Run the arg-processor chain, invoke the callable, run the
    /// result-processor chain, and split a `returns_status_code` pair.
    /// Returns `(value, status_code_override)`.
    pub async fn invoke(
        &self,
        ctx: CommandContext,
        mut args: Vec<Value>,
        mut kwargs: BTreeMap<String, Value>,
    ) -> Result<(Value, Option<u32>)> {
        for processor in &self.arg_processors {
            let (next_args, next_kwargs) = processor(&self.key, args, kwargs)?;
            args = next_args;
            kwargs = next_kwargs;
        }

        let mut value = (self.callable)(ctx, args, kwargs).await?;

        for processor in &self.result_processors {
            value = processor(&self.key, value)?;
        }

        if self.returns_status_code {
            let pair = value.as_array().cloned().ok_or_else(|| {
                SwitchboardError::BadResponse(format!(
                    "command '{}' is returns_status_code but did not return a pair",
                    self.key
                ))
            })?;
            if pair.len() != 2 {
                return Err(SwitchboardError::BadResponse(format!(
                    "command '{}' returned a {}-element array, expected (value, code)",
                    self.key,
                    pair.len()
                )));
            }
            let code = pair[1].as_u64().ok_or_else(|| {
                SwitchboardError::BadResponse(format!("command '{}' status code is not an integer", self.key))
            })?;
            return Ok((pair[0].clone(), Some(code as u32)));
        }

        Ok((value, None))
    }

    pub fn all_current_aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

pub struct CommandBuilder {
    key: String,
    aliases: Vec<String>,
    former_aliases: Vec<String>,
    private: bool,
    returns_status_code: bool,
    takes_header_data: bool,
    arg_processors: Vec<ArgProcessor>,
    result_processors: Vec<ResultProcessor>,
    callable: CommandCallable,
}

impl CommandBuilder {
    pub fn new(key: impl Into<String>, callable: CommandCallable) -> Self {
        let key = key.into();
        CommandBuilder {
            aliases: vec![key.clone()],
            key,
            former_aliases: Vec::new(),
            private: false,
            returns_status_code: false,
            takes_header_data: false,
            arg_processors: Vec::new(),
            result_processors: Vec::new(),
            callable,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn former_alias(mut self, alias: impl Into<String>) -> Self {
        self.former_aliases.push(alias.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn returns_status_code(mut self) -> Self {
        self.returns_status_code = true;
        self
    }

    pub fn takes_header_data(mut self) -> Self {
        self.takes_header_data = true;
        self
    }

    pub fn arg_processor(mut self, processor: ArgProcessor) -> Self {
        self.arg_processors.push(processor);
        self
    }

    pub fn result_processor(mut self, processor: ResultProcessor) -> Self {
        self.result_processors.push(processor);
        self
    }

    pub fn build(self) -> Command {
        Command {
            key: self.key,
            aliases: self.aliases,
            former_aliases: self.former_aliases,
            private: self.private,
            returns_status_code: self.returns_status_code,
            takes_header_data: self.takes_header_data,
            arg_processors: self.arg_processors,
            result_processors: self.result_processors,
            callable: self.callable,
        }
    }
}

/// Non-empty, every character a lowercase ASCII letter or underscore.
pub fn is_legal_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_command() -> Command {
        Command::builder(
            "echo",
            Arc::new(|_ctx, args, _kwargs| Box::pin(async move { Ok(args.into_iter().next().unwrap_or(Value::Null)) })),
        )
        .build()
    }

    #[tokio::test]
    async fn invoke_runs_callable() {
        let command = echo_command();
        let ctx = CommandContext::new(uuid::Uuid::new_v4(), Default::default());
        let (value, code) = command
            .invoke(ctx, vec![Value::String("hi".to_string())], BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        assert_eq!(code, None);
    }

    #[tokio::test]
    async fn returns_status_code_splits_pair() {
        let command = Command::builder(
            "op",
            Arc::new(|_ctx, _args, _kwargs| {
                Box::pin(async move { Ok(serde_json::json!(["done", 418])) })
            }),
        )
        .returns_status_code()
        .build();

        let ctx = CommandContext::new(uuid::Uuid::new_v4(), Default::default());
        let (value, code) = command.invoke(ctx, Vec::new(), BTreeMap::new()).await.unwrap();
        assert_eq!(value, Value::String("done".to_string()));
        assert_eq!(code, Some(418));
    }

    #[test]
    fn legal_key_rules() {
        assert!(is_legal_key("list_commands"));
        assert!(!is_legal_key(""));
        assert!(!is_legal_key("Has-Dash"));
        assert!(!is_legal_key("hasUpper"));
    }
}
