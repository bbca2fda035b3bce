#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `dataconn` is the FTP engine's L5 component: the transient sockets a
//! worker opens for exactly one `RETR`/`STOR`/`APPE`/`LIST` and then
//! tears down, per spec.md §4.5. [`download::DownloadConnection`] runs
//! the pipeline `socket -> decrypt? -> decompress(MODE-Z)? ->
//! ascii-normalize? -> flush-buffer -> disk`; [`upload::UploadConnection`]
//! runs the mirror image, `disk -> read-buffer -> ascii-normalize? ->
//! compress(MODE-Z)? -> encrypt? -> socket`. Both are driven one
//! [`reactor::Event`]/[`diskpool::JobCompletion`] at a time by their
//! owning worker; neither spawns a thread of its own.
//!
//! # Design
//!
//! A download never blocks its caller on a disk write: flush chunks are
//! handed to [`diskpool::DiskPool`] and the pipeline keeps reading off the
//! socket into a second buffer while the first is in flight, matching
//! spec.md §4.3's "at most one outstanding write per data connection"
//! invariant rather than stalling the socket read loop on disk latency.
//! The same double-buffer shape backs the upload side's read-ahead.
//! TLS and MODE-Z are not reimplemented here: both pipelines consume
//! already-filtered bytes from a [`reactor::Transport`] stack the control
//! connection built (or compress/decompress explicitly with
//! [`modez::zlib`] when the reactor's socket itself is plaintext and this
//! layer owns the framing, e.g. while probing whether a server's `MODE Z`
//! claim actually holds).
//!
//! # Invariants
//!
//! - [`download::DownloadConnection::service`] submits at most one
//!   [`diskpool::Job::Write`] at a time and will not submit the next
//!   flush until the previous one completes.
//! - A chunk containing a `NUL` byte, or a lone `CR` not followed by
//!   `LF`, flips [`download::DownloadConnection::is_ascii_tr_for_bin_file_problem`]
//!   permanently for the remainder of the transfer (spec.md §8: "ASCII-for-binary
//!   triggers on a single NUL").
//! - Neither pipeline treats a missing MODE-Z stream terminator as an
//!   error when the bytes decompressed so far equal the expected file
//!   size (spec.md §9).
//!
//! # Errors
//!
//! Fallible operations return [`error::DataConnError`], which wraps the
//! lower layers' [`diskpool::DiskError`] and [`reactor::ReactorError`]
//! alongside the data-connection-specific timeout and protocol-mismatch
//! variants.
//!
//! # Examples
//!
//! ```no_run
//! use dataconn::download::DownloadConnection;
//! use dataconn::ServiceOutcome;
//! use diskpool::{DiskPool, WriteConflictPolicy};
//! use reactor::Reactor;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wire::TransferMode;
//!
//! let reactor = Arc::new(Reactor::new());
//! let disk = Arc::new(DiskPool::new(2));
//! let (socket, events) = reactor.connect("127.0.0.1:2121".parse().unwrap());
//!
//! let mut download = DownloadConnection::new(
//!     Arc::clone(&reactor),
//!     socket,
//!     events,
//!     Arc::clone(&disk),
//!     PathBuf::from("/tmp/out.bin"),
//!     WriteConflictPolicy::Overwrite,
//!     TransferMode::Binary,
//!     None,
//!     None,
//! );
//!
//! loop {
//!     match download.service(Duration::from_millis(200)) {
//!         Ok(ServiceOutcome::Done) => break,
//!         Ok(_) => continue,
//!         Err(_) => break,
//!     }
//! }
//! ```
//!
//! # See also
//!
//! - `control` for the `PASV`/`PORT` negotiation that hands this layer its
//!   socket.
//! - `scheduler` for the worker loop that owns a [`download::DownloadConnection`]
//!   or [`upload::UploadConnection`] for the lifetime of one queue item.

pub mod ascii;
pub mod download;
pub mod error;
pub mod flush;
pub mod upload;

pub use ascii::is_ascii_tr_for_bin_file_problem;
pub use error::DataConnError;
pub use flush::{FLUSH_BUFFER_SIZE, FLUSH_TIMEOUT, NO_DATA_TRANSFER_TIMEOUT, STALL_CHECK_INTERVAL};

/// What happened during one [`download::DownloadConnection::service`] or
/// [`upload::UploadConnection::service`] call.
///
/// A pipeline makes progress one event at a time; callers loop on this
/// until [`ServiceOutcome::Done`] or an [`error::DataConnError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceOutcome {
    /// Nothing happened before the call's timeout elapsed; the worker
    /// should check its own cancellation flags and call again.
    Idle,
    /// Bytes moved between the socket and the flush/read buffer, or a
    /// disk job completed.
    Progress,
    /// The transfer finished: the socket closed after the expected byte
    /// count was seen (or, for MODE-Z, the decompressor yielded
    /// end-of-stream) and any outstanding disk job has completed.
    Done,
    /// A chunk looked like binary data on an ASCII-mode transfer (a `NUL`
    /// byte, or a lone `CR`). The caller decides whether to surface this
    /// as a problem against the owning queue item; the pipeline itself
    /// keeps running.
    AsciiBinaryMismatch,
    /// No bytes moved for [`NO_DATA_TRANSFER_TIMEOUT`]; the caller should
    /// treat this as a transient failure and tear the connection down.
    NoDataTransferTimeout,
}
