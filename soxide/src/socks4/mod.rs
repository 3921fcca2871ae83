use crate::errors::Result;
use bytes::{BufMut, BytesMut};
use std::net::SocketAddrV4;
use tokio::io::{AsyncWrite, AsyncWriteExt};

mod s4_client;
mod s4_handler;

pub use s4_client::Socks4Client;
pub use s4_handler::Socks4Handler;

#[repr(u8)]
#[derive(Clone, Copy, Debug, FromPrimitive, PartialEq)]
pub enum Socks4Command {
    Connect = 0x01,
    Bind = 0x02,
}

/// SOCKS4 replies collapse to granted/rejected; there is no finer
/// granularity in the protocol.
#[repr(u8)]
#[derive(Clone, Copy, Debug, FromPrimitive, PartialEq)]
pub enum Socks4Reply {
    Granted = 0x5A,
    Rejected = 0x5B,
}

/// The IP field of a SOCKS4a request announcing that a hostname follows
/// the user-id: 0.0.0.x with a non-zero last octet.
pub fn is_socks4a_sentinel(addr: [u8; 4]) -> bool {
    addr[0] == 0 && addr[1] == 0 && addr[2] == 0 && addr[3] != 0
}

/// Write an 8-byte SOCKS4 reply. The reply version byte is zero, and the
/// bound address defaults to all zeroes when unknown.
pub async fn write_reply<S>(
    stream: &mut S,
    reply: Socks4Reply,
    bound: Option<SocketAddrV4>,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut data = BytesMut::with_capacity(8);

    data.put_u8(0x00);
    data.put_u8(reply as u8);

    match bound {
        Some(bound) => {
            data.put_u16(bound.port());
            data.put_slice(&bound.ip().octets());
        }
        None => data.put_slice(&[0x00; 6]),
    }

    stream.write_all(&data).await?;
    stream.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_detection() {
        assert!(is_socks4a_sentinel([0, 0, 0, 1]));
        assert!(is_socks4a_sentinel([0, 0, 0, 255]));
        assert!(!is_socks4a_sentinel([0, 0, 0, 0]));
        assert!(!is_socks4a_sentinel([127, 0, 0, 1]));
        assert!(!is_socks4a_sentinel([0, 0, 1, 1]));
    }

    #[tokio::test]
    async fn test_write_reply_granted() {
        let mut buffer = Vec::new();
        let bound = "10.0.0.1:1080".parse().unwrap();
        write_reply(&mut buffer, Socks4Reply::Granted, Some(bound))
            .await
            .unwrap();

        assert_eq!(buffer, vec![0x00, 0x5A, 0x04, 0x38, 10, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_write_reply_rejected_zero_address() {
        let mut buffer = Vec::new();
        write_reply(&mut buffer, Socks4Reply::Rejected, None)
            .await
            .unwrap();

        assert_eq!(buffer, vec![0x00, 0x5B, 0, 0, 0, 0, 0, 0]);
    }
}
