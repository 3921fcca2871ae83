use crate::addresses::{self, Address};
use crate::constants::*;
use crate::errors::{Error, Result};
use crate::socks5::{self, Authenticator, Socks5Command, Socks5Reply};
use itertools::Itertools;
use num_traits::FromPrimitive;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Server side of SOCKS5 request parsing: method selection, optional
/// username/password sub-negotiation, and the CONNECT request itself. The
/// version byte of the greeting has already been consumed by the
/// dispatching server.
#[derive(Clone, Debug, Default)]
pub struct Socks5Handler {
    auth: Authenticator,
}

impl Socks5Handler {
    pub fn new(auth: Authenticator) -> Self {
        Socks5Handler { auth }
    }

    /// Drive the inbound handshake up to a validated CONNECT target.
    /// Protocol-level rejections (no acceptable method, unsupported
    /// command, undecodable address) are answered on the wire where the
    /// protocol allows before the error is returned.
    pub async fn read_request<S>(
        &self,
        stream: &mut S,
    ) -> Result<Address>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Get all authentication methods the client proposes.
        let nmethods = stream.read_u8().await?;

        let mut methods = vec![0; nmethods as usize];
        stream.read_exact(&mut methods).await?;

        let method = self.auth.select_method(&methods);
        debug!(
            "Client offered methods [{}], selected {}",
            methods.iter().map(|m| format!("{:#04x}", m)).join(", "),
            method
        );

        stream.write_all(&[SOCKS_VER_5, method]).await?;
        stream.flush().await?;

        if method == SOCKS_AUTH_NO_ACCEPTABLE_METHODS {
            return Err(Error::protocol("No acceptable authentication method."));
        }

        // Enter method-specific sub-negotiation.
        if method == SOCKS_AUTH_USERNAME_PASSWORD {
            self.auth.subnegotiate(stream).await?;
        }

        let mut request = [0; 3];
        stream.read_exact(&mut request).await?;

        let socks_version = request[0];
        if socks_version != SOCKS_VER_5 {
            return Err(Error::protocol(format!(
                "Client uses a different SOCKS version: {}.",
                socks_version
            )));
        }

        match Socks5Command::from_u8(request[1]) {
            Some(Socks5Command::Connect) => {}
            command => {
                // BIND and UDP ASSOCIATE are rejected, never emulated.
                warn!("Unsupported SOCKS5 command: {:?}", command);
                socks5::write_reply(stream, Socks5Reply::CommandNotSupported, None).await?;

                return Err(Error::protocol(format!(
                    "Unsupported SOCKS5 command: {}.",
                    request[1]
                )));
            }
        }

        match addresses::read_address(stream).await {
            Ok(destination) => Ok(destination),
            Err(error) => {
                socks5::write_reply(stream, Socks5Reply::GeneralFailure, None).await?;

                Err(error)
            }
        }
    }
}
