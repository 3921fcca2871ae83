use crate::addresses::Address;
use crate::constants::*;
use crate::errors::{Error, Result};
use crate::socks5::Socks5Reply;
use bytes::{BufMut, BytesMut};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Client side of the SOCKS4/4a handshake. IPv4 targets produce a plain
/// SOCKS4 request; domain names produce the 4a form with the sentinel
/// address and a trailing hostname, deferring resolution to the proxy.
#[derive(Clone, Debug, Default)]
pub struct Socks4Client {
    user_id: Vec<u8>,
}

impl Socks4Client {
    pub fn new<S: Into<Vec<u8>>>(user_id: S) -> Self {
        Socks4Client {
            user_id: user_id.into(),
        }
    }

    /// Build the request frame for `destination`. SOCKS4 has no way to
    /// express an IPv6 target.
    pub fn build_connect_request(
        &self,
        destination: &Address,
    ) -> Result<Vec<u8>> {
        let mut request = BytesMut::with_capacity(8 + self.user_id.len() + 1);

        request.put_u8(SOCKS_VER_4);
        request.put_u8(SOCKS_CMD_CONNECT);

        match destination {
            Address::Ip(SocketAddr::V4(dst_addr)) => {
                request.put_u16(dst_addr.port());
                request.put_slice(&dst_addr.ip().octets());
                request.put_slice(&self.user_id);
                request.put_u8(0x00);
            }
            Address::Ip(SocketAddr::V6(_)) => {
                return Err(Error::argument(
                    "SOCKS4 does not support IPv6 destinations.",
                ));
            }
            Address::Domainname { host, port } => {
                // SOCKS4a: sentinel address, hostname after the user-id.
                request.put_u16(*port);
                request.put_slice(&[0x00, 0x00, 0x00, 0x01]);
                request.put_slice(&self.user_id);
                request.put_u8(0x00);
                request.put_slice(host.as_bytes());
                request.put_u8(0x00);
            }
        }

        Ok(request.to_vec())
    }

    /// Negotiate a tunnel to `destination` over `stream`. The 8-byte reply
    /// grants with 0x5A; every other code is a rejection without finer
    /// granularity.
    pub async fn handshake<S>(
        &self,
        stream: &mut S,
        destination: Address,
    ) -> Result<Address>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = self.build_connect_request(&destination)?;
        stream.write_all(&request).await?;
        stream.flush().await?;

        let mut reply = [0; 8];
        stream.read_exact(&mut reply).await?;

        if reply[1] != SOCKS4_REP_GRANTED {
            return Err(Error::rejected(Socks5Reply::GeneralFailure));
        }

        let port = u16::from_be_bytes([reply[2], reply[3]]);
        let host = IpAddr::from([reply[4], reply[5], reply[6], reply[7]]);

        Ok(Address::Ip(SocketAddr::new(host, port)))
    }
}
