use crate::addresses::Address;
use crate::constants::*;
use crate::credentials::Credentials;
use crate::errors::{Error, Result};
use crate::socks5::{self, Socks5Command, Socks5Request};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Client side of the SOCKS5 handshake. The transport to the proxy is
/// opened by the caller; this type only speaks the protocol, which keeps
/// every step usable over any stream.
#[derive(Clone, Debug, Default)]
pub struct Socks5Client {
    credentials: Option<Credentials>,
}

impl Socks5Client {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Socks5Client { credentials }
    }

    /// The method-selection frame: no-auth is always offered, and
    /// username/password is added when credentials are configured.
    pub fn build_method_selection(&self) -> Vec<u8> {
        let mut request = vec![SOCKS_VER_5, 0x01, SOCKS_AUTH_NOT_REQUIRED];
        if self.credentials.is_some() {
            request[1] = 0x02;
            request.push(SOCKS_AUTH_USERNAME_PASSWORD);
        }

        request
    }

    /// Negotiate a tunnel to `destination` over `stream`, which must be a
    /// fresh connection to the proxy. Yields the proxy's bound address.
    ///
    /// [rfc1928] https://tools.ietf.org/html/rfc1928
    pub async fn handshake<S>(
        &self,
        stream: &mut S,
        destination: Address,
    ) -> Result<Address>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Enter authentication negotiation.
        let auth_method = self.negotiate_auth_method(stream).await?;
        if auth_method == SOCKS_AUTH_USERNAME_PASSWORD {
            // negotiate_auth_method only selects 0x02 with credentials set.
            if let Some(credentials) = self.credentials.clone() {
                self.authenticate(stream, &credentials).await?;
            }
        }

        // Send SOCKS request information.
        let request = Socks5Request::new(Socks5Command::Connect, destination);
        stream.write_all(&request.into_socks_bytes()).await?;
        stream.flush().await?;

        // Read operation reply.
        let binding = socks5::read_reply(stream).await?;

        Ok(binding)
    }

    /// [rfc1928] https://tools.ietf.org/html/rfc1928
    async fn negotiate_auth_method<S>(
        &self,
        stream: &mut S,
    ) -> Result<u8>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream.write_all(&self.build_method_selection()).await?;
        stream.flush().await?;

        let mut reply = [0; 2];
        stream.read_exact(&mut reply).await?;

        let socks_version = reply[0];
        if socks_version != SOCKS_VER_5 {
            return Err(Error::protocol(format!(
                "Proxy uses a different SOCKS version: {}.",
                socks_version
            )));
        }

        let auth_method = reply[1];
        match auth_method {
            SOCKS_AUTH_NOT_REQUIRED => Ok(auth_method),
            SOCKS_AUTH_USERNAME_PASSWORD => {
                if self.credentials.is_none() {
                    Err(Error::protocol(
                        "Proxy demands authentication, but no credentials are provided.",
                    ))
                } else {
                    Ok(auth_method)
                }
            }
            SOCKS_AUTH_NO_ACCEPTABLE_METHODS => {
                Err(Error::protocol("Proxy did not accept authentication method."))
            }
            method => Err(Error::protocol(format!(
                "Proxy proposed unsupported authentication method: {}.",
                method
            ))),
        }
    }

    /// [rfc1929] https://tools.ietf.org/html/rfc1929
    async fn authenticate<S>(
        &self,
        stream: &mut S,
        credentials: &Credentials,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut request = vec![SOCKS_AUTH_VER];
        request.extend(credentials.as_socks_bytes());

        stream.write_all(&request).await?;
        stream.flush().await?;

        let mut reply = [0; 2];
        stream.read_exact(&mut reply).await?;

        let auth_version = reply[0];
        if auth_version != SOCKS_AUTH_VER {
            return Err(Error::protocol(format!(
                "Proxy uses a different authentication method version: {}.",
                auth_version
            )));
        }

        // A non-zero status closes the connection.
        let status = reply[1];
        if status != SOCKS_AUTH_SUCCESS {
            return Err(Error::protocol(
                "Authentication with the provided credentials failed.",
            ));
        }

        Ok(())
    }
}
