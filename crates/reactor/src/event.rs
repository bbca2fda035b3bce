//! Events delivered per registered socket.

use crate::id::{SocketId, TimerId};

/// An event the reactor posts for a registered socket. Delivered in
/// arrival order for a single socket; no ordering is implied across
/// sockets (spec.md §4.2).
#[derive(Debug)]
pub enum Event {
    /// `connect` completed, successfully or not.
    Connected {
        /// Whether the connection attempt succeeded.
        ok: bool,
        /// The failure, if `ok` is `false`.
        err: Option<String>,
    },

    /// A `listen`ing socket accepted a new peer; `child` is the id the new
    /// connection was registered under and is now a live socket itself.
    Accepted {
        /// The newly registered child socket.
        child: SocketId,
    },

    /// New bytes are available in this socket's inbox.
    BytesRead {
        /// The bytes read from the wire (post TLS/MODE-Z filtering).
        data: Vec<u8>,
    },

    /// The send queue has drained below its low watermark; more data can
    /// be queued without unbounded buffering.
    Writable,

    /// The socket was closed, gracefully or otherwise. No further events
    /// follow for this id.
    Closed {
        /// Set when the close was caused by an I/O error rather than a
        /// graceful shutdown.
        err: Option<String>,
    },

    /// A `set_timer` deadline elapsed without an intervening
    /// `cancel_timer`.
    Timer(TimerId),

    /// A MODE-Z decoder could not inflate a chunk of the byte stream.
    DecompressionError(String),

    /// A MODE-Z decoder reached the end of the compressed stream. Per
    /// spec.md §9 a missing terminator is not itself an error; callers
    /// compare bytes-decompressed against the expected file size.
    CompressedStreamEnd,
}
