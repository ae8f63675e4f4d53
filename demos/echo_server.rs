//! Reference echo server: one port, JSON handler + JSON marshaller, the GNU
//! Terry Pratchett adapter, and a single `echo(x) -> x` command.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use switchboard::adapter::GnuTerryPratchett;
use switchboard::command::Command;
use switchboard::handler::{Handler, JsonHeaderCodec};
use switchboard::marshaller::JsonMarshaller;
use switchboard::Server;

fn parse_addr() -> SocketAddr {
    let mut port: u16 = 7890;
    for arg in std::env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--port=") {
            if let Ok(parsed) = value.parse() {
                port = parsed;
            }
        }
    }
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = parse_addr();
    let handler = Arc::new(Handler::new(Arc::new(JsonHeaderCodec), Arc::new(JsonMarshaller)));

    let echo = Command::builder(
        "echo",
        Arc::new(|_ctx, args, _kwargs| Box::pin(async move { Ok(args.into_iter().next().unwrap_or(Value::Null)) })),
    )
    .build();

    let server = Server::builder()
        .bind(addr, handler)
        .adapter(Arc::new(GnuTerryPratchett))
        .command(echo)
        .build();

    server.run().await
}
