#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `reactor` is the FTP engine's L2 component: the socket layer every
//! control and data connection is built on, per spec.md §4.2. It owns one
//! reader thread per registered socket, a stackable [`Transport`] filter
//! chain (plain TCP, then optionally TLS, then optionally MODE-Z), and a
//! timer registry for idle/keep-alive/no-data-transfer deadlines.
//!
//! # Design
//!
//! The reactor is thread-backed, not an event-loop multiplexer: `connect`
//! and `listen` each spawn a background thread, and every registered
//! socket gets its own reader thread blocking (with a short poll timeout)
//! on reads, posting [`Event`]s to a per-socket `crossbeam_channel`. This
//! keeps the socket layer's concurrency model identical to the rest of
//! the engine's "one thread per unit of concurrent work, events carried
//! over channels" shape, rather than introducing a second, differently
//! structured concurrency primitive solely for sockets.
//!
//! [`Reactor::upgrade_transport`] swaps a socket's transport in place
//! under its own lock, which is how `control` layers `AUTH TLS` onto an
//! already-registered connection without tearing down its reader thread.
//!
//! # Invariants
//!
//! - Events for one socket are delivered in arrival order; no ordering is
//!   implied across sockets.
//! - Once a socket posts [`Event::Closed`], no further events follow for
//!   that id.
//!
//! # Errors
//!
//! Fallible [`Reactor`] methods return [`ReactorError`]; failures that
//! occur asynchronously (a `connect` or a reader loop) are instead carried
//! as an [`Event`] on the socket's own channel.
//!
//! # Examples
//!
//! ```no_run
//! use reactor::Reactor;
//! use std::time::Duration;
//!
//! let reactor = Reactor::new();
//! let (_id, events) = reactor.connect("127.0.0.1:2121".parse().unwrap());
//! let _ = events.recv_timeout(Duration::from_secs(5));
//! ```
//!
//! # See also
//!
//! - `control` and `dataconn` for the layers built directly on this one.
//! - `modez` for the compression this crate's [`transport::ModeZTransport`]
//!   wraps.

mod error;
mod event;
mod id;
mod reactor;
mod timer;
mod transport;

pub use error::ReactorError;
pub use event::Event;
pub use id::{SocketId, SocketIdAllocator, TimerId};
pub use reactor::Reactor;
pub use transport::{default_tls_client_config, ModeZTransport, TcpTransport, Transport, TlsTransport};
