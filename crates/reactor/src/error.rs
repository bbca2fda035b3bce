//! Errors the reactor can report through an [`crate::Event::Connected`],
//! [`crate::Event::Closed`], or a direct `Result` from a handle method.

/// Errors the socket layer can report.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    /// `connect` failed before a socket could be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// The address that was dialled.
        addr: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// `listen` failed to bind the requested address.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// The address that was requested.
        addr: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A TLS handshake failed, either on the initial connection or while
    /// attempting session reuse from a parent socket.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    /// A data connection's `AUTH TLS` negotiation could not reuse the
    /// parent control connection's session. Per spec.md §4.2 the control
    /// connection must be torn down and reconnected before the next
    /// attempt; this variant carries that instruction up to `control`.
    #[error("server rejected TLS session reuse; control connection must reconnect")]
    ReuseSslSessionFailed,

    /// A registered socket was written to or read from after it was
    /// already closed.
    #[error("operation on socket {0:?} after close")]
    AlreadyClosed(crate::id::SocketId),

    /// No socket is registered under the given id.
    #[error("no socket registered with id {0:?}")]
    UnknownSocket(crate::id::SocketId),

    /// A send or receive failed at the I/O level after the socket was
    /// established.
    #[error("I/O error on socket {id:?}: {source}")]
    Io {
        /// The socket the failure occurred on.
        id: crate::id::SocketId,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
