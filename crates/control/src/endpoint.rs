//! The remote side of a control connection.

use std::net::SocketAddr;

/// Everything [`crate::ControlConnection::ensure_connected`] needs to dial
/// and authenticate a session, independent of any particular attempt's
/// state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    /// The address to dial.
    pub addr: SocketAddr,
    /// `USER` argument.
    pub user: String,
    /// `PASS` argument. Never logged in the clear; see
    /// [`wire::command::format`]'s redaction of `PASS`.
    pub password: String,
    /// Whether to negotiate `AUTH TLS` on connect (encrypted control
    /// channel per spec.md §6's `encrypt_control` option).
    pub encrypt_control: bool,
}

impl Endpoint {
    /// Builds an endpoint for plaintext control, the common case for a
    /// first connection attempt before capability negotiation decides
    /// whether TLS is available.
    #[must_use]
    pub fn new(addr: SocketAddr, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self { addr, user: user.into(), password: password.into(), encrypt_control: false }
    }

    /// Returns a copy with `encrypt_control` set.
    #[must_use]
    pub const fn with_encrypt_control(mut self, encrypt: bool) -> Self {
        self.encrypt_control = encrypt;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_plaintext_control() {
        let endpoint = Endpoint::new("127.0.0.1:21".parse().unwrap(), "anonymous", "guest");
        assert!(!endpoint.encrypt_control);
    }

    #[test]
    fn with_encrypt_control_toggles_the_flag() {
        let endpoint = Endpoint::new("127.0.0.1:21".parse().unwrap(), "anonymous", "guest").with_encrypt_control(true);
        assert!(endpoint.encrypt_control);
    }
}
