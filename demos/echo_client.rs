//! Reference echo client: connects to `echo_server`, calls `echo`, prints
//! the response.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use switchboard::adapter::AdapterList;
use switchboard::client::ClientProxy;
use switchboard::handler::{Handler, JsonHeaderCodec};
use switchboard::marshaller::JsonMarshaller;

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
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = parse_addr();
    let handler = Arc::new(Handler::new(Arc::new(JsonHeaderCodec), Arc::new(JsonMarshaller)));
    let proxy = ClientProxy::connect(addr, handler, AdapterList::new()).await?;

    let response = proxy
        .question("echo", vec![Value::String("hi".to_string())], BTreeMap::new())
        .await?;
    println!("{}", response.response);

    proxy.disconnect().await?;
    Ok(())
}
