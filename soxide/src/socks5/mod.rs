use crate::addresses::{self, Address};
use crate::constants::*;
use crate::errors::{Error, Result};
use bytes::{BufMut, BytesMut};
use num_traits::FromPrimitive;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

mod auth;
mod s5_client;
mod s5_handler;

pub use auth::Authenticator;
pub use s5_client::Socks5Client;
pub use s5_handler::Socks5Handler;

#[repr(u8)]
#[derive(Clone, Copy, Debug, FromPrimitive, PartialEq)]
pub enum Socks5Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, FromPrimitive, PartialEq)]
pub enum Socks5Reply {
    Success = 0x00,
    GeneralFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

/// A parsed CONNECT request, or the raw bytes for one.
#[derive(Clone, Debug)]
pub struct Socks5Request {
    pub command: Socks5Command,
    pub destination: Address,
}

impl Socks5Request {
    pub fn new(
        command: Socks5Command,
        destination: Address,
    ) -> Self {
        Socks5Request {
            command,
            destination,
        }
    }

    pub fn into_socks_bytes(self) -> Vec<u8> {
        let mut data = BytesMut::with_capacity(4 + 1 + 255 + 2);

        data.put_u8(SOCKS_VER_5);
        data.put_u8(self.command as u8);
        data.put_u8(SOCKS_RSV);
        data.put_slice(&self.destination.as_socks_bytes());

        data.to_vec()
    }
}

/// Write an operation reply. The bound address defaults to all zeroes,
/// which the protocol permits when the real binding is unknown.
pub async fn write_reply<S>(
    stream: &mut S,
    reply: Socks5Reply,
    bound: Option<SocketAddr>,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let bound =
        bound.unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 0));

    let mut data = BytesMut::with_capacity(3 + 1 + 16 + 2);
    data.put_u8(SOCKS_VER_5);
    data.put_u8(reply as u8);
    data.put_u8(SOCKS_RSV);
    data.put_slice(&Address::from(bound).as_socks_bytes());

    stream.write_all(&data).await?;
    stream.flush().await?;

    Ok(())
}

/// Read an operation reply, yielding the bound address on success and the
/// mapped reply code otherwise.
pub async fn read_reply<S>(stream: &mut S) -> Result<Address>
where
    S: AsyncRead + Unpin,
{
    let mut operation_reply = [0; 3];
    stream.read_exact(&mut operation_reply).await?;

    let socks_version = operation_reply[0];
    if socks_version != SOCKS_VER_5 {
        return Err(Error::protocol(format!(
            "Proxy uses a different SOCKS version: {}.",
            socks_version
        )));
    }

    let reply_code = operation_reply[1];
    if reply_code != SOCKS_REP_SUCCEEDED {
        let code = Socks5Reply::from_u8(reply_code).unwrap_or(Socks5Reply::GeneralFailure);
        return Err(Error::rejected(code));
    }

    let binding = addresses::read_address(stream).await?;

    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reply_from_u8() {
        assert_eq!(Socks5Reply::from_u8(0x00), Some(Socks5Reply::Success));
        assert_eq!(Socks5Reply::from_u8(0x07), Some(Socks5Reply::CommandNotSupported));
        assert_eq!(Socks5Reply::from_u8(0x42), None);
    }

    #[test]
    fn test_request_into_socks_bytes() {
        let request = Socks5Request::new(Socks5Command::Connect, Address::new("127.0.0.1", 80));
        let bytes = request.into_socks_bytes();

        assert_eq!(bytes, vec![0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]);
    }

    #[tokio::test]
    async fn test_write_reply_defaults_to_zero_address() {
        let mut buffer = Vec::new();
        write_reply(&mut buffer, Socks5Reply::CommandNotSupported, None)
            .await
            .unwrap();

        assert_eq!(
            buffer,
            vec![0x05, 0x07, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[tokio::test]
    async fn test_write_reply_echoes_bound_address() {
        let mut buffer = Vec::new();
        let bound = "10.0.0.1:9090".parse().unwrap();
        write_reply(&mut buffer, Socks5Reply::Success, Some(bound))
            .await
            .unwrap();

        assert_eq!(buffer, vec![0x05, 0x00, 0x00, 0x01, 10, 0, 0, 1, 0x23, 0x82]);
    }

    #[tokio::test]
    async fn test_read_reply_success() {
        let reply = vec![0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x04, 0x38];
        let mut cursor = Cursor::new(reply);

        let bound = read_reply(&mut cursor).await.unwrap();
        assert_eq!(bound, Address::new("127.0.0.1", 1080));
    }

    #[tokio::test]
    async fn test_read_reply_rejection_carries_code() {
        let reply = vec![0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        let mut cursor = Cursor::new(reply);

        match read_reply(&mut cursor).await {
            Err(Error::Connect { code, .. }) => assert_eq!(code, Socks5Reply::ConnectionRefused),
            other => panic!("Expected a CONNECT rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_reply_rejects_version_mismatch() {
        let reply = vec![0x04, 0x00, 0x00];
        let mut cursor = Cursor::new(reply);

        assert!(matches!(
            read_reply(&mut cursor).await,
            Err(Error::Protocol(_))
        ));
    }
}
