//! Errors the disk worker pool can report through a [`crate::JobCompletion`].

use std::path::PathBuf;

/// A filesystem failure reported by a disk worker. Kept distinct from
/// [`std::io::Error`] so it can be cloned into a [`crate::JobCompletion`]
/// and matched on without downcasting.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    /// The target already exists and the conflict policy did not resolve
    /// the collision (spec.md §4.6 `TgtFileAlreadyExists`).
    #[error("{path:?} already exists")]
    AlreadyExists {
        /// The colliding path.
        path: PathBuf,
    },

    /// The target path's parent directory does not exist or is not a
    /// directory (spec.md §4.6 `InvalidPathToDir`).
    #[error("invalid path to directory: {path:?}")]
    InvalidPathToDir {
        /// The offending path.
        path: PathBuf,
    },

    /// The process does not have permission to perform the operation.
    #[error("permission denied: {path:?}")]
    PermissionDenied {
        /// The path the operation was attempted against.
        path: PathBuf,
    },

    /// The requested path does not exist.
    #[error("not found: {path:?}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The target filesystem has no room left for the write.
    #[error("target disk is full: {path:?}")]
    DiskFull {
        /// The path being written when the disk filled up.
        path: PathBuf,
    },

    /// A resume fingerprint (size/mtime check) did not match the
    /// in-progress local file, so `REST` would resume at the wrong offset
    /// (spec.md §4.6 `ResumeTestFailed`).
    #[error("resume fingerprint mismatch for {path:?}: local size {local_size}, expected {expected_size}")]
    ResumeMismatch {
        /// The local file being resumed.
        path: PathBuf,
        /// The size actually found on disk.
        local_size: u64,
        /// The size the caller expected based on the transfer state.
        expected_size: u64,
    },

    /// The worker pool could not allocate memory for the operation
    /// (spec.md §4.6/§7 `LowMem`).
    #[error("insufficient memory to complete disk operation")]
    LowMem,

    /// An operation was attempted against a handle the pool does not
    /// recognise, e.g. a `CloseFile`/`ReadForUpload` after the handle was
    /// already closed.
    #[error("unknown file handle {0:?}")]
    UnknownHandle(crate::handle::FileHandleId),

    /// Any other I/O failure not covered by a more specific variant above.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// The path the operation was attempted against.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl DiskError {
    /// Classifies a raw [`std::io::Error`] against `path` into the closed
    /// [`DiskError`] set, matching on [`std::io::ErrorKind`] where
    /// possible and falling back to [`DiskError::Io`].
    #[must_use]
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path: path.to_path_buf() },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path.to_path_buf() },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path: path.to_path_buf() },
            std::io::ErrorKind::StorageFull => Self::DiskFull { path: path.to_path_buf() },
            _ => Self::Io { path: path.to_path_buf(), source },
        }
    }
}
