use crate::socks5::Socks5Reply;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The failure classes surfaced by this crate. Configuration problems are
/// reported synchronously; everything else travels through the rejection
/// path of an in-flight future.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input supplied by the caller, e.g. a malformed proxy URI or
    /// an oversized credential field.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A configuration call that conflicts with the session's current
    /// settings, e.g. credentials combined with SOCKS4.
    #[error("conflicting configuration: {0}")]
    StateConflict(String),

    /// Malformed or unsupported bytes received from a peer.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The outbound connection attempt failed. Carries the mapped SOCKS5
    /// reply code alongside the underlying cause, if any.
    #[error("CONNECT rejected: {code:?}")]
    Connect {
        code: Socks5Reply,
        #[source]
        source: Option<Box<Error>>,
    },

    /// The configured time limit elapsed before the exchange completed.
    /// Distinct from a rejection by the proxy.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was aborted before it settled.
    #[error("operation canceled")]
    Canceled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn argument<S: Into<String>>(message: S) -> Self {
        Error::Argument(message.into())
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Error::StateConflict(message.into())
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Error::Protocol(message.into())
    }

    pub fn connect(code: Socks5Reply, source: Error) -> Self {
        Error::Connect {
            code,
            source: Some(Box::new(source)),
        }
    }

    pub fn rejected(code: Socks5Reply) -> Self {
        Error::Connect { code, source: None }
    }
}

/// Classify a failed outbound connect into a SOCKS5 reply code.
///
/// Matches the platform error code first, then falls back to matching the
/// "Connection refused" message for platforms that report refusal without
/// an errno, then timeouts, then the catch-all.
pub fn map_connect_error(error: &Error) -> Socks5Reply {
    if let Error::Io(e) = error {
        if let Some(code) = e.raw_os_error() {
            match code {
                libc::EACCES => return Socks5Reply::ConnectionNotAllowed,
                libc::ENETUNREACH => return Socks5Reply::NetworkUnreachable,
                libc::EHOSTUNREACH => return Socks5Reply::HostUnreachable,
                libc::ECONNREFUSED => return Socks5Reply::ConnectionRefused,
                libc::ETIMEDOUT => return Socks5Reply::TtlExpired,
                _ => {}
            }
        }

        match e.kind() {
            io::ErrorKind::PermissionDenied => return Socks5Reply::ConnectionNotAllowed,
            io::ErrorKind::ConnectionRefused => return Socks5Reply::ConnectionRefused,
            io::ErrorKind::TimedOut => return Socks5Reply::TtlExpired,
            _ => {}
        }
    }

    if error.to_string().contains("Connection refused") {
        return Socks5Reply::ConnectionRefused;
    }

    if let Error::Timeout(_) = error {
        return Socks5Reply::TtlExpired;
    }

    Socks5Reply::GeneralFailure
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err(code: i32) -> Error {
        Error::Io(io::Error::from_raw_os_error(code))
    }

    #[test]
    fn test_map_permission_denied() {
        assert_eq!(
            map_connect_error(&io_err(libc::EACCES)),
            Socks5Reply::ConnectionNotAllowed
        );
    }

    #[test]
    fn test_map_network_unreachable() {
        assert_eq!(
            map_connect_error(&io_err(libc::ENETUNREACH)),
            Socks5Reply::NetworkUnreachable
        );
    }

    #[test]
    fn test_map_host_unreachable() {
        assert_eq!(
            map_connect_error(&io_err(libc::EHOSTUNREACH)),
            Socks5Reply::HostUnreachable
        );
    }

    #[test]
    fn test_map_connection_refused_by_code() {
        assert_eq!(
            map_connect_error(&io_err(libc::ECONNREFUSED)),
            Socks5Reply::ConnectionRefused
        );
    }

    #[test]
    fn test_map_connection_refused_by_message() {
        let error = Error::Io(io::Error::new(io::ErrorKind::Other, "Connection refused"));
        assert_eq!(map_connect_error(&error), Socks5Reply::ConnectionRefused);
    }

    #[test]
    fn test_map_timeout_by_code() {
        assert_eq!(
            map_connect_error(&io_err(libc::ETIMEDOUT)),
            Socks5Reply::TtlExpired
        );
    }

    #[test]
    fn test_map_timeout_by_type() {
        let error = Error::Timeout(Duration::from_secs(1));
        assert_eq!(map_connect_error(&error), Socks5Reply::TtlExpired);
    }

    #[test]
    fn test_map_unclassified() {
        let error = Error::protocol("something else entirely");
        assert_eq!(map_connect_error(&error), Socks5Reply::GeneralFailure);
    }
}
