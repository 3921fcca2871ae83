use crate::errors::{Error, Result};

/// A username/password pair for SOCKS5 sub-negotiation. Both fields travel
/// in single length-prefixed bytes on the wire, so each is capped at 255
/// bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Credentials {
    pub username: Vec<u8>,
    pub password: Vec<u8>,
}

impl Credentials {
    pub fn new<S: Into<Vec<u8>>>(
        username: S,
        password: S,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.len() > 255 {
            return Err(Error::argument("Username can be no longer than 255 bytes."));
        }
        if password.len() > 255 {
            return Err(Error::argument("Password can be no longer than 255 bytes."));
        }

        Ok(Credentials { username, password })
    }

    /// The RFC1929 sub-negotiation payload, without the leading version byte.
    pub fn as_socks_bytes(&self) -> Vec<u8> {
        // Append username.
        let mut bytes = vec![self.username.len() as u8];
        bytes.extend(self.username.clone());

        // Append password.
        bytes.push(self.password.len() as u8);
        bytes.extend(self.password.clone());

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_valid_fields() {
        let credentials = Credentials::new("username", "password").unwrap();

        assert_eq!(credentials.username, b"username");
        assert_eq!(credentials.password, b"password");
    }

    #[test]
    fn test_new_rejects_long_username() {
        let username = "a".repeat(256);
        let result = Credentials::new(username.as_str(), "test");

        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn test_new_rejects_long_password() {
        let password = "b".repeat(256);
        let result = Credentials::new("test", password.as_str());

        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn test_new_accepts_255_byte_fields() {
        let field = "c".repeat(255);
        assert!(Credentials::new(field.as_str(), field.as_str()).is_ok());
    }

    #[test]
    fn test_as_socks_bytes_layout() {
        let credentials = Credentials::new("user", "pass").unwrap();
        let bytes = credentials.as_socks_bytes();

        assert_eq!(bytes[0], 4);
        assert_eq!(&bytes[1..5], b"user");
        assert_eq!(bytes[5], 4);
        assert_eq!(&bytes[6..10], b"pass");
    }
}
