#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `ratectl` holds the small pieces of timing and throughput bookkeeping the
//! FTP data connection needs but that do not belong to the wire codec or the
//! socket layer themselves:
//!
//! - [`estimator::PacketSizeEstimator`] probes upload throughput and adapts
//!   the per-write chunk size, mirroring the feedback loop a plugin-style FTP
//!   client uses to avoid oversized writes stalling on a slow peer.
//! - [`speed_meter::SpeedMeter`] turns a stream of `record` calls into the
//!   transferred-bytes and current-rate pair the data connection state and
//!   the progress UI both read.
//! - [`pacing`] provides a deterministic, test-friendly sleep primitive for
//!   the retry backoff used when reconnecting a control connection.
//!
//! # Design
//!
//! None of these types touch sockets or threads directly; they are pure,
//! `Instant`-driven state machines so the data connection and control
//! connection can unit test their pacing decisions without real time
//! passing. The `test-support` feature swaps the blocking sleep in
//! [`pacing::paced_sleep`] for a recorded one so callers elsewhere in the
//! workspace can assert on backoff schedules.
//!
//! # Invariants
//!
//! - [`estimator::PacketSizeEstimator`] never recommends a chunk smaller than
//!   [`estimator::MIN_PACKET_SIZE`] or larger than the last detected
//!   too-big size.
//! - The first write observed by a freshly constructed estimator is
//!   discounted from the throughput measurement, since it is dominated by
//!   the kernel send buffer rather than wire speed.
//!
//! # Errors
//!
//! These types do not perform I/O and therefore do not return `Result`.
//!
//! # Examples
//!
//! ```
//! use ratectl::estimator::PacketSizeEstimator;
//! use std::time::{Duration, Instant};
//!
//! let mut estimator = PacketSizeEstimator::new(32 * 1024);
//! let start = Instant::now();
//! estimator.record_write(estimator.recommended_size(), start);
//! assert_eq!(estimator.recommended_size(), 32 * 1024);
//! ```
//!
//! # See also
//!
//! - `dataconn` for the upload/download pipelines that own these estimators.
//! - `modez` for the compression layer they sit alongside.

pub mod estimator;
pub mod pacing;
pub mod speed_meter;

pub use estimator::PacketSizeEstimator;
pub use speed_meter::SpeedMeter;
