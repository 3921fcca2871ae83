use crate::errors::{Error, Result};
use std::net::SocketAddr;
use tokio::net;

/// Resolve a `host:port` string to a socket address, preferring a direct
/// parse over a DNS lookup.
pub async fn resolve_addr<S: Into<String>>(addr: S) -> Result<SocketAddr> {
    let addr: String = addr.into();

    // First, try to parse the address as a socket address.
    if let Ok(addr) = addr.parse() {
        return Ok(addr);
    }

    // Otherwise, the address is probably a domain name.
    let addresses: Vec<SocketAddr> = net::lookup_host(&addr).await?.collect();
    match addresses[..] {
        [first, ..] => Ok(first),
        [] => Err(Error::argument(format!(
            "Domain name didn't resolve to an IP address: {}.",
            addr
        ))),
    }
}
