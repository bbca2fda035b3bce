//! The scheduler's own error type, wrapping every lower layer it drives.

use control::ControlError;
use diskpool::DiskError;
use queue::QueueError;

/// Failures a [`crate::worker::Worker`] can encounter that are not
/// themselves a per-item problem (those go through
/// [`queue::ProblemId`]/`ItemState::Failed` instead). This covers
/// failures in the scheduler's own bookkeeping: a poisoned listing cache,
/// a queue invariant violation, or a control/disk error a worker could
/// not translate into an item-level problem.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The control connection reported an error outside of an item's own
    /// retry/fail handling (e.g. during `ensure_connected` before any item
    /// was claimed).
    #[error("control connection: {0}")]
    Control(#[from] ControlError),

    /// The disk pool reported an error the worker could not map to a
    /// [`queue::ProblemId`].
    #[error("disk pool: {0}")]
    Disk(#[from] DiskError),

    /// A [`queue::Queue`] call failed against the scheduler's own
    /// bookkeeping (e.g. a stale `Uid` after a concurrent replace).
    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    /// A data connection reported a non-recoverable error.
    #[error("data connection: {0}")]
    DataConn(#[from] dataconn::DataConnError),

    /// The reactor reported an error opening or using a data channel
    /// socket.
    #[error("reactor: {0}")]
    Reactor(#[from] reactor::ReactorError),

    /// The server's reply text could not be parsed into the structure a
    /// listing or path operation expected.
    #[error("protocol: {0}")]
    Protocol(String),
}
