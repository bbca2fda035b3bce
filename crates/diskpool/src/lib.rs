#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `diskpool` is the FTP engine's L3 component: a fixed pool of threads
//! that serializes blocking filesystem calls off the protocol and data
//! connection threads, per spec.md §4.3. Callers (mainly `dataconn` and
//! `scheduler`) register once, then submit [`job::Job`]s tagged with a
//! message id and receive [`pool::JobCompletion`]s back on their own
//! channel — the "completion port" the spec describes.
//!
//! # Design
//!
//! A single bounded `crossbeam-channel` queue feeds every worker thread;
//! completions are routed back through a `dashmap`-backed registry keyed
//! by [`pool::RequesterId`], mirroring how `reactor` dispatches socket
//! events per [`reactor`](../reactor/index.html)-style registration rather
//! than a single shared reply channel every caller has to filter.
//!
//! # Invariants
//!
//! - A data connection in direct-flush mode submits at most one
//!   [`job::Job::Write`] at a time per handle and waits for its completion
//!   before submitting the next, so the pool never needs to reorder writes
//!   to the same file (spec.md §4.3).
//! - [`job::Job::CloseFile`] flushes and releases the handle; any job
//!   submitted against a closed or unknown handle completes as
//!   [`error::DiskError::UnknownHandle`].
//!
//! # Errors
//!
//! Every failure mode is a variant of [`error::DiskError`], delivered
//! through [`pool::JobCompletion::error`] rather than thrown across the
//! job queue boundary.
//!
//! # Examples
//!
//! ```
//! use diskpool::{DiskPool, Job, WriteConflictPolicy};
//! use std::time::Duration;
//!
//! # fn main() -> std::io::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let target = dir.path().join("out.bin");
//!
//! let pool = DiskPool::new(2);
//! let (requester, completions) = pool.register();
//! pool.submit(requester, 1, Job::OpenForWrite {
//!     path: target.clone(),
//!     policy: WriteConflictPolicy::Overwrite,
//!     mode: wire::TransferMode::Binary,
//! });
//! let opened = completions.recv_timeout(Duration::from_secs(2)).unwrap();
//! assert_eq!(opened.state, diskpool::CompletionState::Ok);
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - `dataconn` for the download/upload pipelines that submit file jobs.
//! - `scheduler` for `ListDir`/`CreateDir` usage in directory expansion.

mod error;
mod handle;
mod job;
mod pool;

pub use error::DiskError;
pub use handle::{FileHandleAllocator, FileHandleId};
pub use job::{CompletionState, DirEntry, EntryKind, FileAttrs, Job, ProducedData, WriteConflictPolicy};
pub use pool::{default_worker_count, DiskPool, JobCompletion, RequesterId};
