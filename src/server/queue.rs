//! The single ordered work queue and its dispatcher (spec §4.3).
//!
//! One `mpsc` channel replaces the source's racy `busy` flag plus
//! busy-wait poll loop (Design Note #9 "busy-wait poll loops"): a single
//! task owns the receiving end and dequeues in strict FIFO order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};
use uuid::Uuid;

use crate::adapter::stock::{MARKER_FORMER_ALIAS_TARGET, MARKER_RETURNS_STATUS_CODE, MARKER_TAKES_HEADER_DATA};
use crate::adapter::AdapterList;
use crate::context::CommandContext;
use crate::error::SwitchboardError;
use crate::handler::Handler;
use crate::package::{HeaderMap, Package, Question, Response};
use crate::registry::CommandRegistry;

/// One dequeued unit of work: everything the dispatcher needs to digest a
/// Question and respond on the connection it arrived on.
pub struct QueueItem {
    pub handler: Arc<Handler>,
    pub write_half: Arc<Mutex<OwnedWriteHalf>>,
    pub txid: Uuid,
    pub header: HeaderMap,
    pub payload: Value,
    pub peer: String,
}

pub type QueueSender = mpsc::UnboundedSender<QueueItem>;
pub type QueueReceiver = mpsc::UnboundedReceiver<QueueItem>;

pub fn channel() -> (QueueSender, QueueReceiver) {
    mpsc::unbounded_channel()
}

/// Runs the single worker loop. Under `threaded_digest`, each item's
/// digest runs on its own spawned task and the worker moves on immediately,
/// giving up the in-order guarantee per spec §5. Otherwise the worker
/// awaits each digest before dequeuing the next item.
pub async fn run_worker(
    mut receiver: QueueReceiver,
    registry: Arc<CommandRegistry>,
    adapters: AdapterList,
    threaded_digest: bool,
) {
    while let Some(item) = receiver.recv().await {
        adapters.fire_server_post_remove_from_queue(item.txid);

        if threaded_digest {
            let registry = registry.clone();
            let adapters = adapters.clone();
            tokio::spawn(async move {
                digest(item, registry, adapters).await;
            });
        } else {
            digest(item, registry.clone(), adapters.clone()).await;
        }
    }
}

async fn digest(item: QueueItem, registry: Arc<CommandRegistry>, adapters: AdapterList) {
    let QueueItem {
        handler,
        write_half,
        txid,
        mut header,
        payload,
        peer,
    } = item;

    let mut response = match serde_json::from_value::<Question>(payload) {
        Ok(mut question) => {
            question.promote_embedded_fields();
            match question.validate() {
                Ok(()) => digest_question(txid, &registry, &adapters, &mut header, question).await,
                Err(err) => Response::from_error(&err),
            }
        }
        Err(err) => Response::from_error(&SwitchboardError::BadQuestion(err.to_string())),
    };

    response.header_data = header;
    let keep_alive = response
        .header_data
        .get(crate::package::HEADER_CONNECTION)
        .and_then(crate::package::HeaderValue::as_str)
        == Some(crate::package::KEEP_ALIVE);
    response = response.with_keep_alive(keep_alive);

    let mut stream = write_half.lock().await;
    if let Err(err) = handler.send_one(&mut *stream, txid, &adapters, &mut response).await {
        warn!(peer, error = %err, "failed to write response to client");
    }
}

/// Resolves the alias, stamps the marker kwargs the stock adapters read
/// (spec §4.6), fires `server_pre_digest` with the resolved facts already
/// visible, then invokes. Resolution happens before `server_pre_digest`
/// rather than after as spec §4.3's numbered steps literally order it —
/// `HeaderAsKwarg`/`StatusCode` need to know `takes_header_data`/
/// `returns_status_code` at that hook, which requires the command to
/// already be resolved (see DESIGN.md).
async fn digest_question(
    txid: Uuid,
    registry: &CommandRegistry,
    adapters: &AdapterList,
    header: &mut HeaderMap,
    mut question: Question,
) -> Response {
    let resolved = match registry.resolve(&question.command) {
        Ok(resolved) => resolved,
        Err(err) => {
            adapters.fire_server_pre_digest(txid, header, &mut question);
            let mut response = Response::from_error(&err);
            adapters.fire_server_post_digest(txid, &question, &mut response);
            return response;
        }
    };

    let command = resolved.command().clone();
    let former_alias_target = resolved.is_former().then(|| command.key.clone());

    if let Some(target) = &former_alias_target {
        question
            .kwargs
            .insert(MARKER_FORMER_ALIAS_TARGET.to_string(), Value::String(target.clone()));
    }
    if command.takes_header_data {
        question
            .kwargs
            .insert(MARKER_TAKES_HEADER_DATA.to_string(), Value::Bool(true));
    }
    if command.returns_status_code {
        question
            .kwargs
            .insert(MARKER_RETURNS_STATUS_CODE.to_string(), Value::Bool(true));
    }

    adapters.fire_server_pre_digest(txid, header, &mut question);

    if command.private {
        let mut response = Response::from_error(&SwitchboardError::CommandIsPrivate(command.key.clone()));
        adapters.fire_server_post_digest(txid, &question, &mut response);
        return response;
    }

    let ctx = CommandContext::new(txid, header.clone());
    let mut kwargs: BTreeMap<String, Value> = question.kwargs.clone();
    kwargs.remove(MARKER_FORMER_ALIAS_TARGET);
    kwargs.remove(MARKER_TAKES_HEADER_DATA);
    kwargs.remove(MARKER_RETURNS_STATUS_CODE);

    let mut response = match command.invoke(ctx, question.args.clone(), kwargs).await {
        Ok((value, status_override)) => {
            let mut response = Response::ok(value);
            if let Some(code) = status_override {
                response.code = code;
            }
            response
        }
        Err(err) => {
            error!(command = %command.key, error = %err, "command invocation failed");
            Response::from_error(&err)
        }
    };

    adapters.fire_server_post_digest(txid, &question, &mut response);
    response
}
