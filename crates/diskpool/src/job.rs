//! Job and result types the disk worker pool executes.

use std::path::PathBuf;
use std::time::SystemTime;

use wire::TransferMode;

use crate::handle::FileHandleId;

/// How a conflicting target path should be resolved by [`Job::OpenForWrite`],
/// drawn from spec.md §6's `file_already_exists` enumeration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum WriteConflictPolicy {
    /// Truncate and overwrite the existing target.
    Overwrite,
    /// Resume an interrupted download, appending after the existing bytes.
    Resume,
    /// Resume if possible, else overwrite.
    ResumeOrOverwrite,
    /// Pick an alternate, non-colliding name.
    Autorename,
    /// Leave the target untouched and report the item skipped.
    Skip,
    /// Surface the collision to the user rather than deciding locally.
    Ask,
}

/// File metadata a [`Job::SetAttrs`] or a newly created file carries,
/// mirroring the subset of attributes the FTP `chattr`/`MDTM` family can
/// express.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileAttrs {
    /// Unix-style permission bits, when the target platform supports them.
    pub unix_mode: Option<u32>,
    /// Last-modified timestamp, typically sourced from an `MDTM` reply.
    pub modified: Option<SystemTime>,
}

/// The kind of filesystem entry a [`Job::ListDir`] result describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Dir,
    /// A symbolic link.
    Link,
}

/// One entry returned by [`Job::ListDir`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirEntry {
    /// The entry's name, relative to the listed directory.
    pub name: String,
    /// Whether the entry is a file, directory, or link.
    pub kind: EntryKind,
    /// The entry's size in bytes, when known (not meaningful for directories).
    pub size: Option<u64>,
}

/// A unit of filesystem work submitted to the [`crate::DiskPool`].
///
/// Matches the closed job set from spec.md §4.3. [`Job::Write`] is not
/// separately named there but is implied by that section's invariant that
/// "a data connection in direct-flush mode has at most one outstanding
/// disk write" — the flush-buffer handoff described there has to travel as
/// a job like any other piece of worker-pool work.
#[derive(Clone, Debug)]
pub enum Job {
    /// Lists the entries of a local directory.
    ListDir {
        /// The directory to list.
        path: PathBuf,
    },
    /// Opens `path` for writing under `policy`, producing a
    /// [`FileHandleId`] on success.
    OpenForWrite {
        /// The target path.
        path: PathBuf,
        /// How to resolve a name collision.
        policy: WriteConflictPolicy,
        /// The transfer mode in effect, so the pool knows whether newline
        /// translation applies when bytes are later written through this
        /// handle.
        mode: TransferMode,
    },
    /// Opens `path` for appending at `offset`, for resuming an interrupted
    /// download.
    AppendForResume {
        /// The target path.
        path: PathBuf,
        /// The byte offset to resume from.
        offset: u64,
    },
    /// Writes one flush-buffer's worth of bytes through an already-open
    /// handle.
    Write {
        /// The handle to write through.
        handle: FileHandleId,
        /// The bytes to write.
        data: Vec<u8>,
    },
    /// Verifies that the local file at `path` is exactly `expected_size`
    /// bytes before a resume is trusted (spec.md `ResumeTestFailed`).
    TestResumeFingerprint {
        /// The local file to check.
        path: PathBuf,
        /// The size the in-progress transfer state expects.
        expected_size: u64,
    },
    /// Closes a handle opened by [`Job::OpenForWrite`]/[`Job::AppendForResume`].
    CloseFile {
        /// The handle to close.
        handle: FileHandleId,
    },
    /// Deletes a local file.
    Delete {
        /// The path to delete.
        path: PathBuf,
    },
    /// Applies metadata to a local file.
    SetAttrs {
        /// The target path.
        path: PathBuf,
        /// The attributes to apply.
        attrs: FileAttrs,
    },
    /// Creates a local directory (and any missing parents).
    CreateDir {
        /// The directory to create.
        path: PathBuf,
    },
    /// Reads up to `max_len` bytes from `path` starting at `offset`, for
    /// an upload pipeline's read-buffer stage.
    ReadForUpload {
        /// The source file.
        path: PathBuf,
        /// The byte offset to read from.
        offset: u64,
        /// The maximum number of bytes to read.
        max_len: usize,
    },
}

/// The outcome classification of a completed [`Job`], matching spec.md
/// §4.3's `{Ok, Skipped, Failed}` completion state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompletionState {
    /// The job ran to completion.
    Ok,
    /// A conflict policy chose to skip the job rather than fail it.
    Skipped,
    /// The job failed; see the completion's `error` field.
    Failed,
}

/// Data a successful job hands back to its caller.
#[derive(Clone, Debug)]
pub enum ProducedData {
    /// [`Job::ListDir`]'s entries.
    Listing(Vec<DirEntry>),
    /// [`Job::OpenForWrite`]/[`Job::AppendForResume`]'s handle.
    Handle(FileHandleId),
    /// [`Job::ReadForUpload`]'s bytes (may be shorter than requested at EOF).
    Bytes(Vec<u8>),
    /// [`Job::TestResumeFingerprint`]'s confirmed size.
    Size(u64),
}
