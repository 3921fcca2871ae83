#[macro_use]
extern crate log;
#[macro_use]
extern crate num_derive;

mod client;
mod common;
mod server;

pub mod socks4;
pub mod socks5;

pub use common::{addresses, constants, credentials, errors, interface, util};

pub use client::{ProtocolVersion, ProxyConnector, SecureProxyConnector, SocksClient};
pub use common::addresses::{Address, ProxyAddress};
pub use common::credentials::Credentials;
pub use common::errors::{Error, Result};
pub use common::interface::{BoxedStream, Connector, DirectConnector, DnsResolver, Resolver};
pub use common::util::resolve_addr;
pub use server::SocksServer;
pub use socks4::{Socks4Client, Socks4Handler};
pub use socks5::{Authenticator, Socks5Client, Socks5Handler};
