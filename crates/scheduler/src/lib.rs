#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `scheduler` is the FTP engine's L7 component: the [`worker::Worker`]
//! outer/inner state machine spec.md §4.7 describes, the per-operation
//! [`cache::UploadListingCache`] its upload workers share, the path
//! mirroring arithmetic in [`targets`], the bounded autorename search in
//! [`autorename`], and the [`policy::ConflictPolicies`] closed set every
//! leaf handler consults when a transfer collides with something already
//! on the target side.
//!
//! # Design
//!
//! A [`worker::Worker`] is a single thread: it owns one
//! [`control::ControlConnection`], claims items one at a time from a
//! shared [`queue::Queue`] with [`queue::Queue::claim_next_waiting`], and
//! dispatches on [`queue::ItemKind`] to the matching leaf or
//! explore-parent handler. Several workers may be assigned to the same
//! operation; they share one [`queue::Queue`], one
//! [`cache::UploadListingCache`], and one [`diskpool::DiskPool`], so the
//! cache's single-flight claim/publish protocol and the queue's
//! atomic-claim contract are what keep them from doing duplicate work.
//!
//! # Invariants
//!
//! - A worker only ever holds one claimed item at a time; it fully
//!   resolves that item (via [`queue::Queue::update_state`],
//!   [`queue::Queue::retry_item`], or [`queue::Queue::set_problem`] plus a
//!   state transition) before claiming another.
//! - [`cache::UploadListingCache::lookup_or_claim`] hands the fetch role
//!   to exactly one caller per key; every other caller either sees the
//!   published listing or parks until it is.
//! - [`autorename::next_candidate`] always terminates: it is bounded by
//!   [`autorename::NUMBERED_SUFFIX_LIMIT`] plus
//!   [`autorename::FALLBACK_SUFFIX_LIMIT`], never an open-ended loop.
//!
//! # Errors
//!
//! [`error::SchedulerError`] wraps the lower layers' error types
//! ([`control::ControlError`], [`diskpool::DiskError`],
//! [`queue::QueueError`], [`dataconn::DataConnError`],
//! [`reactor::ReactorError`]) plus a catch-all `Protocol` variant for
//! scheduler-level contract violations (a malformed listing line, a data
//! channel plan with neither a passive address nor an active listener).
//! Most of these are translated by [`worker::Worker`] into a queue
//! problem rather than propagated, since a single item's failure should
//! not take the whole worker down.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use control::Endpoint;
//! use diskpool::DiskPool;
//! use logging::{LogUidAllocator, NullSink};
//! use queue::Queue;
//! use reactor::Reactor;
//! use scheduler::cache::UploadListingCache;
//! use scheduler::policy::ConflictPolicies;
//! use scheduler::worker::{OperationKind, Worker, WorkerConfig, WorkerId, ProgressCounters};
//!
//! let reactor = Arc::new(Reactor::new());
//! let disk = Arc::new(DiskPool::new(diskpool::default_worker_count()));
//! let queue = Arc::new(Queue::new());
//! let cache = Arc::new(UploadListingCache::new());
//! let progress = Arc::new(ProgressCounters::default());
//! let allocator = LogUidAllocator::default();
//!
//! let config = WorkerConfig {
//!     endpoint: Endpoint::new("127.0.0.1:21".parse().unwrap(), "anonymous", "guest"),
//!     kind: OperationKind::CopyDownload,
//!     local_root: std::env::temp_dir(),
//!     remote_root: "/incoming".to_string(),
//!     policies: ConflictPolicies::default(),
//!     attrs: None,
//!     include_mask: scheduler::mask::MaskSet::match_all(),
//!     ascii_mask: scheduler::mask::MaskSet::match_all(),
//!     transfer_mode_default: scheduler::mask::TransferModeDefault::default(),
//! };
//! let cancel = control::CancelToken::new();
//! let mut worker = Worker::new(WorkerId(0), config, reactor, disk, queue, cache, progress, cancel, allocator.next(), Arc::new(NullSink));
//! let _handle = worker.control_handle();
//! ```
//!
//! # See also
//!
//! - `queue` for the item table and its child-counter invariant.
//! - `control` and `dataconn` for the connections a worker drives.
//! - `engine` for the public facade that owns a pool of workers per
//!   operation.

pub mod autorename;
pub mod cache;
pub mod error;
pub mod listing;
pub mod mask;
pub mod policy;
pub mod targets;
pub mod worker;

pub use error::SchedulerError;
