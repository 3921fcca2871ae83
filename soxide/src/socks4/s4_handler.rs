use crate::addresses::{is_safe_domain, Address};
use crate::errors::{Error, Result};
use crate::socks4::{is_socks4a_sentinel, Socks4Command};
use num_traits::FromPrimitive;
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

// User-ids and hostnames are NUL-terminated on the wire; anything longer
// than this is treated as malformed rather than buffered indefinitely.
const MAX_STRING_LEN: usize = 255;

/// Server side of SOCKS4/4a request parsing. The version byte has already
/// been consumed by the dispatching server. SOCKS4 has no structured error
/// replies for malformed input, so every parse failure simply tears the
/// connection down.
#[derive(Clone, Copy, Debug, Default)]
pub struct Socks4Handler;

impl Socks4Handler {
    pub fn new() -> Self {
        Socks4Handler
    }

    /// Parse the remainder of a SOCKS4/4a request into the target address.
    pub async fn read_request<S>(
        &self,
        stream: &mut S,
    ) -> Result<Address>
    where
        S: AsyncRead + Unpin,
    {
        let mut header = [0; 7];
        stream.read_exact(&mut header).await?;

        match Socks4Command::from_u8(header[0]) {
            Some(Socks4Command::Connect) => {}
            _ => {
                return Err(Error::protocol(format!(
                    "Unsupported SOCKS4 command: {}.",
                    header[0]
                )));
            }
        }

        let port = u16::from_be_bytes([header[1], header[2]]);
        let addr = [header[3], header[4], header[5], header[6]];

        // The user-id is read and discarded; SOCKS4 ident lookups are not
        // performed.
        let user_id = read_nul_terminated(stream).await?;
        debug!("SOCKS4 request with user-id {:?}", String::from_utf8_lossy(&user_id));

        if is_socks4a_sentinel(addr) {
            // SOCKS4a: the real target is a hostname after the user-id.
            let host = read_nul_terminated(stream).await?;
            let host = String::from_utf8(host)
                .map_err(|_| Error::protocol("Hostname is not valid UTF-8."))?;

            if !is_safe_domain(&host) {
                return Err(Error::protocol(format!(
                    "Hostname contains invalid characters: {:?}.",
                    host
                )));
            }

            Ok(Address::new(host, port))
        } else {
            Ok(Address::Ip(SocketAddr::new(IpAddr::from(addr), port)))
        }
    }
}

async fn read_nul_terminated<S>(stream: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();

    loop {
        let byte = stream.read_u8().await?;
        if byte == 0x00 {
            return Ok(bytes);
        }

        bytes.push(byte);
        if bytes.len() > MAX_STRING_LEN {
            return Err(Error::protocol("Unterminated string in SOCKS4 request."));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn parse(bytes: &[u8]) -> Result<Address> {
        // The dispatching server consumes the version byte first.
        assert_eq!(bytes[0], 0x04);

        let mut cursor = Cursor::new(bytes[1..].to_vec());
        Socks4Handler::new().read_request(&mut cursor).await
    }

    #[tokio::test]
    async fn test_read_request_ipv4() {
        let target = parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01\x00").await.unwrap();

        assert_eq!(target, Address::new("127.0.0.1", 80));
    }

    #[tokio::test]
    async fn test_read_request_4a_hostname() {
        let target = parse(b"\x04\x01\x00\x50\x00\x00\x00\x01\x00example.com\x00")
            .await
            .unwrap();

        assert_eq!(target, Address::new("example.com", 80));
    }

    #[tokio::test]
    async fn test_read_request_discards_user_id() {
        let target = parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01nobody\x00").await.unwrap();

        assert_eq!(target, Address::new("127.0.0.1", 80));
    }

    #[tokio::test]
    async fn test_read_request_rejects_bind() {
        let result = parse(b"\x04\x02\x00\x50\x7f\x00\x00\x01\x00").await;

        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_read_request_rejects_invalid_hostname() {
        let result = parse(b"\x04\x01\x00\x50\x00\x00\x00\x01\x00tls://example.com:80?\x00").await;

        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_read_request_rejects_truncated_input() {
        let result = parse(b"\x04\x01\x00\x50").await;

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_read_request_rejects_unterminated_user_id() {
        let mut bytes = b"\x04\x01\x00\x50\x7f\x00\x00\x01".to_vec();
        bytes.extend(vec![b'a'; 300]);

        let result = parse(&bytes).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
