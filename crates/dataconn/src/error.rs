//! Errors a data connection pipeline can report.

use diskpool::DiskError;
use reactor::ReactorError;

/// Errors [`crate::download::DownloadConnection`] and
/// [`crate::upload::UploadConnection`] can report. Lower-layer failures
/// are wrapped rather than flattened, so a caller can still match on the
/// originating [`DiskError`]/[`ReactorError`] variant when it needs to.
#[derive(Debug, thiserror::Error)]
pub enum DataConnError {
    /// A disk job failed; see the wrapped [`DiskError`] for the problem.
    #[error("disk I/O failed: {0}")]
    Disk(#[from] DiskError),

    /// The socket layer reported a failure.
    #[error("data socket failed: {0}")]
    Reactor(#[from] ReactorError),

    /// No bytes moved for longer than [`crate::NO_DATA_TRANSFER_TIMEOUT`]
    /// (spec.md §5's `T_nd`).
    #[error("no data transferred for {0:?}")]
    NoDataTransferTimeout(std::time::Duration),

    /// A MODE-Z decoder could not inflate a chunk of the byte stream.
    #[error("MODE-Z decompression failed: {0}")]
    Decompression(String),

    /// The pipeline was asked to act (write, flush, close) after it had
    /// already been closed.
    #[error("operation on an already-closed data connection")]
    AlreadyClosed,
}
