use crate::errors::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Any full-duplex byte stream the toolkit can relay over.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for S {}

pub type BoxedStream = Box<dyn ByteStream>;

/// The single integration point with outbound connection establishment.
/// `dst` is a `host:port` string, optionally carrying a `?source=` query
/// parameter for downstream accounting.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        dst: &str,
    ) -> Result<BoxedStream>;
}

/// Plain TCP, ignoring any `?source=` annotation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectConnector;

#[async_trait]
impl Connector for DirectConnector {
    async fn connect(
        &self,
        dst: &str,
    ) -> Result<BoxedStream> {
        let dst = dst.split('?').next().unwrap_or(dst);
        let stream = TcpStream::connect(dst).await?;

        Ok(Box::new(stream))
    }
}

/// Name resolution as consumed by the client when resolving locally.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        host: &str,
    ) -> Result<IpAddr>;
}

/// The system resolver, through tokio's `lookup_host`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(
        &self,
        host: &str,
    ) -> Result<IpAddr> {
        crate::util::resolve_addr(format!("{}:0", host))
            .await
            .map(|addr| addr.ip())
    }
}
