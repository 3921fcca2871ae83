use anyhow::Result;
use soxide::{DirectConnector, SocksServer};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let listener = TcpListener::bind("0.0.0.0:1080").await?;
    let server = Arc::new(SocksServer::new(Arc::new(DirectConnector)));

    server.listen(listener).await?;

    Ok(())
}
