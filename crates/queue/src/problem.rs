//! The closed `ProblemId` enumeration attached to failed/user-input-needed
//! queue items.

use std::fmt;

/// A stable, enumerated reason a queue item stopped making progress,
/// matching the closed set from spec.md §4.6/§7.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ProblemId {
    /// No problem; the item is progressing normally.
    #[default]
    Ok,
    /// The disk worker pool could not allocate memory for the operation.
    LowMem,
    /// `CWD` into the target directory failed.
    UnableToCwd,
    /// `CWD` into the *only* remaining path component failed, leaving no
    /// fallback directory to retry from.
    UnableToCwdOnlyPath,
    /// `PWD` failed after an otherwise successful `CWD`/`MKD`.
    UnableToPwd,
    /// A symlink's target could not be resolved into a path.
    InvalidPathToLink,
    /// A directory path was invalid (parent missing, not a directory).
    InvalidPathToDir,
    /// Listing the upload target path failed (spec.md §4.7 step 1).
    UploadCannotListTgtPath,
    /// `MKD` on the upload target directory failed.
    UploadCannotCreateTgtDir,
    /// The upload target directory already exists and the policy did not
    /// resolve the collision silently.
    UploadTgtDirAlreadyExists,
    /// Autorename exhausted every candidate name while creating a
    /// directory (spec.md §4.7 step 4; never loops).
    UploadCrDirAutoRenFailed,
    /// A remote link could not be resolved to decide file-vs-directory
    /// treatment.
    UnableToResolveLnk,
    /// The source file is hidden and the hidden-file policy asked to stop.
    FileIsHidden,
    /// The source directory is hidden and the hidden-dir policy asked to stop.
    DirIsHidden,
    /// `SITE CHMOD`/attribute application failed or is unsupported.
    UnknownAttrs,
    /// An ASCII-mode download turned out to contain binary content.
    AsciiTrModeForBinFile,
    /// The download/upload target already exists.
    TgtFileAlreadyExists,
    /// Opening the target file for writing failed.
    CannotCreateTgtFile,
    /// The transfer failed after the target file was freshly created.
    TransferFailedOnCreatedFile,
    /// The transfer failed after a resumed (appended) target file.
    TransferFailedOnResumedFile,
    /// A MODE-Z stream could not be inflated.
    DecomprError,
    /// The data connection's no-data-transfer timeout elapsed.
    DataConTimeout,
    /// A resume's size fingerprint did not match the local file.
    ResumeTestFailed,
    /// `STOR`/`APPE` failed on the remote server.
    UploadUnableToStore,
    /// Verifying that an upload finished (size check) failed.
    UploadTestIfFinished,
    /// Autorename exhausted every candidate name while uploading a file.
    UploadFileAutorenFailed,
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ok() {
        assert_eq!(ProblemId::default(), ProblemId::Ok);
    }

    #[test]
    fn display_matches_variant_name() {
        assert_eq!(ProblemId::UploadCrDirAutoRenFailed.to_string(), "UploadCrDirAutoRenFailed");
    }
}
