use crate::constants::*;
use crate::errors::{Error, Result};
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Server-side authentication policy: a static name-to-password map, shared
/// read-only across all accepted connections. An empty map means no-auth
/// mode and no sub-negotiation is ever performed.
#[derive(Clone, Debug, Default)]
pub struct Authenticator {
    credentials: HashMap<String, String>,
}

impl Authenticator {
    /// Open relay: every client is accepted without credentials.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: HashMap<String, String>) -> Self {
        Authenticator { credentials }
    }

    pub fn requires_auth(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// Pick the authentication method for a client's advertisement. With
    /// credentials configured only username/password is acceptable.
    pub fn select_method(&self, offered: &[u8]) -> u8 {
        if self.requires_auth() {
            if offered.contains(&SOCKS_AUTH_USERNAME_PASSWORD) {
                SOCKS_AUTH_USERNAME_PASSWORD
            } else {
                SOCKS_AUTH_NO_ACCEPTABLE_METHODS
            }
        } else if offered.contains(&SOCKS_AUTH_NOT_REQUIRED) {
            SOCKS_AUTH_NOT_REQUIRED
        } else {
            SOCKS_AUTH_NO_ACCEPTABLE_METHODS
        }
    }

    /// Exact match of both fields against the map. A mismatch is terminal,
    /// never retried.
    pub fn verify(
        &self,
        username: &[u8],
        password: &[u8],
    ) -> bool {
        let username = match std::str::from_utf8(username) {
            Ok(username) => username,
            Err(_) => return false,
        };

        match self.credentials.get(username) {
            Some(expected) => expected.as_bytes() == password,
            None => false,
        }
    }

    /// Run the RFC1929 username/password sub-negotiation on the stream:
    /// read the client's frame, verify it, write the status byte.
    pub async fn subnegotiate<S>(
        &self,
        stream: &mut S,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut header = [0; 2];
        stream.read_exact(&mut header).await?;

        let auth_version = header[0];
        if auth_version != SOCKS_AUTH_VER {
            return Err(Error::protocol(format!(
                "Client uses a different authentication method version: {}.",
                auth_version
            )));
        }

        let mut username = vec![0; header[1] as usize];
        stream.read_exact(&mut username).await?;

        let mut plen = [0; 1];
        stream.read_exact(&mut plen).await?;

        let mut password = vec![0; plen[0] as usize];
        stream.read_exact(&mut password).await?;

        let status = if self.verify(&username, &password) {
            SOCKS_AUTH_SUCCESS
        } else {
            SOCKS_AUTH_FAILED
        };

        stream.write_all(&[SOCKS_AUTH_VER, status]).await?;
        stream.flush().await?;

        if status != SOCKS_AUTH_SUCCESS {
            return Err(Error::protocol(
                "Username/password authentication failed.",
            ));
        }

        debug!("Authenticated client as {:?}", String::from_utf8_lossy(&username));

        Ok(())
    }
}
