//! Conflict-policy enumerations, spec.md §6's "Conflict policies (per
//! operation)" closed set. Consumed directly by [`crate::worker::Worker`]
//! when an item's transfer collides with something already on the target
//! side; re-exported by the `engine` facade as part of [`ConflictPolicies`]'s
//! appearance in `EngineConfig`.

use serde::{Deserialize, Serialize};

/// `file_already_exists`: how to resolve a collision when the target file
/// for a download or upload already exists.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FileExistsPolicy {
    /// Surface the collision to the user via `UserInputNeeded`.
    #[default]
    Ask,
    /// Truncate and overwrite.
    Overwrite,
    /// Resume an interrupted transfer.
    Resume,
    /// Resume if a partial file looks compatible, else overwrite.
    ResumeOrOverwrite,
    /// Pick an alternate, non-colliding name.
    Autorename,
    /// Leave the existing file untouched; item is `Skipped`.
    Skip,
}

/// `dir_already_exists`: how to resolve a collision when the target
/// directory already exists.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DirExistsPolicy {
    /// Surface the collision to the user.
    #[default]
    Ask,
    /// Use the existing directory as the destination (merge contents).
    Join,
    /// Pick an alternate, non-colliding name.
    Autorename,
    /// Skip the whole subtree.
    Skip,
}

/// `cannot_create_file`/`cannot_create_dir`: how to resolve a `5xx` on
/// `STOR`/`MKD` that is not itself a name collision (e.g. permission
/// denied reported as a generic failure).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CannotCreatePolicy {
    /// Surface to the user.
    #[default]
    Ask,
    /// Try another name.
    Autorename,
    /// Skip the item.
    Skip,
}

/// `retry_on_created_file`/`retry_on_resumed_file`: how to resolve a
/// transfer that failed partway after the target file was already
/// created or resumed (spec.md §4.6 `TransferFailedOnCreatedFile`/
/// `TransferFailedOnResumedFile`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RetryOnPartialPolicy {
    /// Surface to the user.
    #[default]
    Ask,
    /// Resume from where the partial file left off.
    Resume,
    /// Overwrite and restart.
    Overwrite,
    /// Skip the item.
    Skip,
}

/// `ascii_tr_mode_for_bin_file`: how to resolve an ASCII-mode transfer
/// that turns out to be carrying binary data (spec.md §4.6
/// `AsciiTrModeForBinFile`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AsciiForBinaryPolicy {
    /// Surface to the user.
    #[default]
    Ask,
    /// Delete the partial file and re-download in binary mode.
    RedownloadBinary,
    /// Cancel the item.
    Cancel,
    /// Ignore the mismatch and keep transferring as ASCII.
    Ignore,
}

/// `unknown_attrs`: how to resolve a remote `chattr` target whose current
/// attributes the engine could not parse (spec.md §4.6 `UnknownAttrs`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum UnknownAttrsPolicy {
    /// Surface to the user.
    #[default]
    Ask,
    /// Skip the item.
    Skip,
    /// Ignore and proceed without changing attributes.
    Ignore,
}

/// `hidden_file_del`/`hidden_dir_del`/`nonempty_dir_del`: how to resolve
/// a delete operation against a hidden entry or a non-empty directory.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DeleteGuardPolicy {
    /// Surface to the user.
    #[default]
    Ask,
    /// Proceed with the delete.
    Delete,
    /// Skip the item.
    Skip,
}

/// The full closed set of conflict policies an operation carries, spec.md
/// §6's per-operation configuration block.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConflictPolicies {
    /// `file_already_exists`.
    pub file_already_exists: FileExistsPolicy,
    /// `dir_already_exists`.
    pub dir_already_exists: DirExistsPolicy,
    /// `cannot_create_file`.
    pub cannot_create_file: CannotCreatePolicy,
    /// `cannot_create_dir`.
    pub cannot_create_dir: CannotCreatePolicy,
    /// `retry_on_created_file`.
    pub retry_on_created_file: RetryOnPartialPolicy,
    /// `retry_on_resumed_file`.
    pub retry_on_resumed_file: RetryOnPartialPolicy,
    /// `ascii_tr_mode_for_bin_file`.
    pub ascii_tr_mode_for_bin_file: AsciiForBinaryPolicy,
    /// `unknown_attrs`.
    pub unknown_attrs: UnknownAttrsPolicy,
    /// `hidden_file_del`.
    pub hidden_file_del: DeleteGuardPolicy,
    /// `hidden_dir_del`.
    pub hidden_dir_del: DeleteGuardPolicy,
    /// `nonempty_dir_del`.
    pub nonempty_dir_del: DeleteGuardPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_ask_everywhere_policy_offers_it() {
        let policies = ConflictPolicies::default();
        assert_eq!(policies.file_already_exists, FileExistsPolicy::Ask);
        assert_eq!(policies.dir_already_exists, DirExistsPolicy::Ask);
        assert_eq!(policies.hidden_file_del, DeleteGuardPolicy::Ask);
    }

    #[test]
    fn policies_round_trip_through_json() {
        let policies = ConflictPolicies { cannot_create_dir: CannotCreatePolicy::Autorename, ..ConflictPolicies::default() };
        let json = serde_json::to_string(&policies).unwrap();
        let parsed: ConflictPolicies = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.cannot_create_dir, CannotCreatePolicy::Autorename);
    }
}
