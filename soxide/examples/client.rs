use anyhow::Result;
use soxide::SocksClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::main]
async fn main() -> Result<()> {
    let client = SocksClient::new("socks5://127.0.0.1:1080")?;

    let mut stream = client.connect("example.com", 80).await?;
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: example.com\r\n\r\n")
        .await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    println!("{}", response);

    Ok(())
}
