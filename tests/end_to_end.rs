//! End-to-end scenarios over a real loopback TCP connection (spec §8).
//! Each test binds its own listener on a fixed port and is `#[ignore]`d by
//! default, following the teacher's convention for tests that need a bound
//! socket outside of the default `cargo test` run.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use switchboard::adapter::{AdapterList, DeprecationWarnings, GnuTerryPratchett};
use switchboard::client::ClientProxy;
use switchboard::command::Command;
use switchboard::handler::{Handler, JsonHeaderCodec};
use switchboard::marshaller::JsonMarshaller;
use switchboard::package::{HeaderValue, Package, Question};
use switchboard::Server;

fn json_handler() -> Arc<Handler> {
    Arc::new(Handler::new(Arc::new(JsonHeaderCodec), Arc::new(JsonMarshaller)))
}

async fn spawn_server(addr: SocketAddr, builder: switchboard::ServerBuilder) {
    let server = builder.bind(addr, json_handler()).build();
    tokio::spawn(server.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
#[ignore]
async fn echo_scenario() {
    let addr: SocketAddr = "127.0.0.1:17001".parse().unwrap();
    let echo = Command::builder(
        "echo",
        Arc::new(|_ctx, args, _kwargs| Box::pin(async move { Ok(args.into_iter().next().unwrap_or(Value::Null)) })),
    )
    .build();
    spawn_server(addr, Server::builder().command(echo)).await;

    let proxy = ClientProxy::connect(addr, json_handler(), AdapterList::new()).await.unwrap();
    let response = proxy
        .question("echo", vec![Value::String("hi".to_string())], BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(response.response, Value::String("hi".to_string()));
    assert_eq!(response.code, 200);
    assert!(response.traceback.is_none());
}

#[tokio::test]
#[ignore]
async fn deprecation_scenario() {
    let addr: SocketAddr = "127.0.0.1:17002".parse().unwrap();
    let current = Command::builder(
        "current",
        Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(Value::String("current-result".to_string())) })),
    )
    .former_alias("old")
    .build();
    spawn_server(
        addr,
        Server::builder().command(current).adapter(Arc::new(DeprecationWarnings)),
    )
    .await;

    let proxy = ClientProxy::connect(addr, json_handler(), AdapterList::new()).await.unwrap();
    let response = proxy.question("old", Vec::new(), BTreeMap::new()).await.unwrap();

    assert_eq!(response.code, 201);
    assert!(response.warnings.iter().any(|w| w.contains("current")));
    assert_eq!(response.response, Value::String("current-result".to_string()));
}

#[tokio::test]
#[ignore]
async fn private_command_scenario() {
    let addr: SocketAddr = "127.0.0.1:17003".parse().unwrap();
    let secret = Command::builder(
        "secret",
        Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(Value::String("hidden".to_string())) })),
    )
    .private()
    .build();
    spawn_server(addr, Server::builder().command(secret)).await;

    let proxy = ClientProxy::connect(addr, json_handler(), AdapterList::new()).await.unwrap();
    let result = proxy.question("secret", Vec::new(), BTreeMap::new()).await;

    let err = result.expect_err("private command called remotely must fail");
    assert_eq!(err.code().0, 405);
}

#[tokio::test]
#[ignore]
async fn status_code_return_scenario() {
    let addr: SocketAddr = "127.0.0.1:17004".parse().unwrap();
    let op = Command::builder(
        "op",
        Arc::new(|_ctx, _args, _kwargs| Box::pin(async move { Ok(json!(["done", 418])) })),
    )
    .returns_status_code()
    .build();
    spawn_server(addr, Server::builder().command(op)).await;

    let proxy = ClientProxy::connect(addr, json_handler(), AdapterList::new()).await.unwrap();
    let response = proxy.question("op", Vec::new(), BTreeMap::new()).await.unwrap();

    assert_eq!(response.response, Value::String("done".to_string()));
    assert_eq!(response.code, 418);
}

#[tokio::test]
#[ignore]
async fn header_adapter_scenario() {
    let addr: SocketAddr = "127.0.0.1:17005".parse().unwrap();
    let echo = Command::builder(
        "echo",
        Arc::new(|_ctx, args, _kwargs| Box::pin(async move { Ok(args.into_iter().next().unwrap_or(Value::Null)) })),
    )
    .build();
    spawn_server(
        addr,
        Server::builder().command(echo).adapter(Arc::new(GnuTerryPratchett)),
    )
    .await;

    let proxy = ClientProxy::connect(addr, json_handler(), AdapterList::new()).await.unwrap();
    let response = proxy.question("echo", vec![json!("hi")], BTreeMap::new()).await.unwrap();

    assert_eq!(
        response.header_data.get("X-Clacks-Overhead").and_then(HeaderValue::as_str),
        Some("GNU Terry Pratchett")
    );
}

/// Drives raw framing instead of `ClientProxy`, since the proxy is
/// synchronous per call (spec §4.7) and this scenario needs to pipeline
/// three questions ahead of their responses to exercise server-side
/// ordering.
#[tokio::test]
#[ignore]
async fn ordering_scenario() {
    use tokio::net::TcpStream;

    let addr: SocketAddr = "127.0.0.1:17006".parse().unwrap();
    let seq = Command::builder(
        "seq",
        Arc::new(|_ctx, args, _kwargs| {
            Box::pin(async move {
                let n = args.first().and_then(Value::as_i64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(((4 - n) * 100) as u64)).await;
                Ok(json!(n))
            })
        }),
    )
    .build();
    spawn_server(addr, Server::builder().command(seq)).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut read_half, mut write_half) = stream.into_split();
    let handler = json_handler();
    let adapters = AdapterList::new();

    for n in [1, 2, 3] {
        let mut question = Question::new("seq").with_args(vec![json!(n)]).with_keep_alive(true);
        handler
            .send_one(&mut write_half, uuid::Uuid::new_v4(), &adapters, &mut question)
            .await
            .unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        let (_, payload) = handler
            .receive_one(&mut read_half, uuid::Uuid::new_v4(), &adapters)
            .await
            .unwrap()
            .unwrap();
        let response: switchboard::package::Response = serde_json::from_value(payload).unwrap();
        received.push(response.response);
    }

    assert_eq!(received, vec![json!(1), json!(2), json!(3)]);
}
