use crate::addresses::Address;
use crate::client::ProtocolVersion;
use crate::constants::*;
use crate::errors::{map_connect_error, Error, Result};
use crate::interface::{BoxedStream, Connector};
use crate::socks4::{self, Socks4Handler, Socks4Reply};
use crate::socks5::{self, Authenticator, Socks5Handler, Socks5Reply};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

// Bytes a client may pipeline after its request while the outbound connect
// is still pending. Anything beyond this is a misbehaving peer.
const MAX_EARLY_BYTES: usize = 8192;

/// Accepts inbound SOCKS4, SOCKS4a and SOCKS5 sessions and drives each one
/// end to end: parse, authenticate, connect out through the injected
/// connector, reply, relay. The credential map is immutable after
/// construction and shared across all connections.
#[derive(Clone)]
pub struct SocksServer {
    connector: Arc<dyn Connector>,
    auth: Authenticator,
    secure: bool,
}

impl SocksServer {
    /// An open relay: no authentication is ever requested.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        SocksServer {
            connector,
            auth: Authenticator::open(),
            secure: false,
        }
    }

    /// A server requiring SOCKS5 username/password authentication against
    /// a static map. An empty map behaves exactly like [`SocksServer::new`].
    pub fn with_auth(
        connector: Arc<dyn Connector>,
        credentials: HashMap<String, String>,
    ) -> Self {
        SocksServer {
            connector,
            auth: Authenticator::with_credentials(credentials),
            secure: false,
        }
    }

    /// Mark the inbound transport as TLS-secured; this only affects the
    /// scheme in `?source=` annotations (sockss/socks4s instead of
    /// socks/socks4).
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Accept loop: one spawned task per inbound connection.
    pub async fn listen(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (incoming, peer) = listener.accept().await?;

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(error) = server.handle_connection(incoming, Some(peer)).await {
                    debug!("Session from {} ended: {}", peer, error);
                }
            });
        }
    }

    /// Drive a single inbound session. The first byte selects the protocol
    /// family; an unrecognizable version byte tears the connection down
    /// without any reply, since neither protocol defines one for that case.
    pub async fn handle_connection<S>(
        &self,
        mut stream: S,
        peer: Option<SocketAddr>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let version = stream.read_u8().await?;

        let (version, target) = match version {
            SOCKS_VER_4 => {
                let target = Socks4Handler::new().read_request(&mut stream).await?;
                (ProtocolVersion::Socks4, target)
            }
            SOCKS_VER_5 => {
                let handler = Socks5Handler::new(self.auth.clone());
                let target = handler.read_request(&mut stream).await?;
                (ProtocolVersion::Socks5, target)
            }
            version => {
                return Err(Error::protocol(format!(
                    "Unsupported SOCKS version: {}.",
                    version
                )));
            }
        };

        info!("SOCKS{} CONNECT {}", version, target);

        self.connect_target(stream, version, target, peer).await
    }

    /// Establish the outbound connection for a parsed request, write the
    /// version-appropriate reply and relay bytes until either side closes.
    /// While the connect is pending the inbound stream is only observed
    /// for close; if the peer goes away the pending connect is canceled,
    /// and a stream it may have produced anyway is released.
    pub async fn connect_target<S>(
        &self,
        mut stream: S,
        version: ProtocolVersion,
        target: Address,
        peer: Option<SocketAddr>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let dst = self.connect_string(&target, version, peer);

        let (mut outbound, early) = match self.connect_with_cancellation(&mut stream, &dst).await {
            Ok(connected) => connected,
            Err(Error::Canceled) => {
                // The peer is gone; there is nobody left to answer.
                return Err(Error::Canceled);
            }
            Err(error) => {
                let code = map_connect_error(&error);
                warn!("CONNECT {} failed with {:?}: {}", dst, code, error);

                match version {
                    ProtocolVersion::Socks5 => {
                        socks5::write_reply(&mut stream, code, None).await?
                    }
                    _ => socks4::write_reply(&mut stream, Socks4Reply::Rejected, None).await?,
                }

                return Err(Error::connect(code, error));
            }
        };

        match version {
            ProtocolVersion::Socks5 => {
                socks5::write_reply(&mut stream, Socks5Reply::Success, None).await?
            }
            _ => socks4::write_reply(&mut stream, Socks4Reply::Granted, None).await?,
        }

        // Bytes the client pipelined before the tunnel existed go first.
        if !early.is_empty() {
            outbound.write_all(&early).await?;
            outbound.flush().await?;
        }

        // Either side closing takes the other down with it.
        let _ = tokio::io::copy_bidirectional(&mut stream, &mut outbound).await;

        Ok(())
    }

    /// The connect string handed to the external connector: `host:port`,
    /// plus a percent-encoded `?source=` annotation recording the inbound
    /// peer and the protocol/transport combination, when the peer is known.
    fn connect_string(
        &self,
        target: &Address,
        version: ProtocolVersion,
        peer: Option<SocketAddr>,
    ) -> String {
        let dst = target.to_string();

        match peer {
            Some(peer) => {
                let scheme = match (version, self.secure) {
                    (ProtocolVersion::Socks5, false) => "socks",
                    (ProtocolVersion::Socks5, true) => "sockss",
                    (_, false) => "socks4",
                    (_, true) => "socks4s",
                };

                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("source", &format!("{}://{}", scheme, peer))
                    .finish();

                format!("{}?{}", dst, query)
            }
            None => dst,
        }
    }

    /// Race the outbound connect against the inbound connection closing.
    /// Dropping the connect future on the close path aborts whichever step
    /// is in flight and releases a stream that resolved in the meantime.
    async fn connect_with_cancellation<S>(
        &self,
        stream: &mut S,
        dst: &str,
    ) -> Result<(BoxedStream, Vec<u8>)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let connect = self.connector.connect(dst);
        tokio::pin!(connect);

        let mut early = Vec::new();
        let mut buffer = [0u8; 1024];

        loop {
            tokio::select! {
                connected = &mut connect => {
                    return connected.map(|outbound| (outbound, early));
                }
                read = stream.read(&mut buffer) => {
                    match read {
                        Ok(0) | Err(_) => return Err(Error::Canceled),
                        Ok(n) => {
                            early.extend_from_slice(&buffer[..n]);
                            if early.len() > MAX_EARLY_BYTES {
                                return Err(Error::protocol(
                                    "Client sent too much data before the tunnel existed.",
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Turn an inbound connection away without reading its request, e.g.
    /// when a connection limit is reached.
    pub async fn refuse_connection<S>(
        &self,
        stream: &mut S,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        socks5::write_reply(stream, Socks5Reply::ConnectionRefused, None).await
    }
}
