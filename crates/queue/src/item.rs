//! Queue item types: identity, kind, lifecycle state, and per-item
//! conflict-resolution overrides.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::problem::ProblemId;

/// A queue item's identity. Stable for the item's lifetime even across
/// [`crate::Queue::replace_item_with_list`], which reparents children but
/// never reuses a retired uid.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uid(u64);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Allocates monotonically increasing [`Uid`]s.
#[derive(Debug, Default)]
pub struct UidAllocator {
    next: AtomicU64,
}

impl UidAllocator {
    /// Returns the next unused [`Uid`].
    pub fn next(&self) -> Uid {
        Uid(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// The operation-specific payload kind of a queue item, matching spec.md
/// §3's type list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ItemKind {
    /// Deletes a single remote file.
    DeleteFile,
    /// Deletes a single remote symlink.
    DeleteLink,
    /// A parent item representing a directory whose contents still need
    /// to be explored before it (and its children) can be deleted.
    DeleteExploreDir,
    /// Deletes a remote directory, once all children are handled.
    DeleteDir,
    /// Downloads (copy) a single remote file or link target.
    CopyFileOrLink,
    /// Downloads (move, i.e. delete source after) a single remote file or link.
    MoveFileOrLink,
    /// Resolves a remote link before copying it.
    CopyResolveLink,
    /// Resolves a remote link before moving it.
    MoveResolveLink,
    /// A parent item representing a remote directory to explore for a copy.
    CopyExploreDir,
    /// A parent item representing a remote directory to explore for a move.
    MoveExploreDir,
    /// Uploads (copy) a single local file.
    UploadCopyFile,
    /// Uploads (move) a single local file.
    UploadMoveFile,
    /// A parent item representing a local directory to explore for an upload copy.
    UploadCopyExploreDir,
    /// A parent item representing a local directory to explore for an upload move.
    UploadMoveExploreDir,
    /// Deletes the local source directory after an upload move completes.
    UploadMoveDeleteDir,
    /// Changes attributes on a single remote file.
    ChAttrFile,
    /// Changes attributes on a single remote directory.
    ChAttrDir,
    /// A parent item representing a remote directory to explore for `chattr`.
    ChAttrExploreDir,
    /// Resolves a remote link before changing its attributes.
    ChAttrResolveLink,
}

impl ItemKind {
    /// Returns whether this kind is a parent item that expands into
    /// children rather than doing direct work itself.
    #[must_use]
    pub const fn is_explore_parent(self) -> bool {
        matches!(
            self,
            Self::DeleteExploreDir
                | Self::CopyExploreDir
                | Self::MoveExploreDir
                | Self::UploadCopyExploreDir
                | Self::UploadMoveExploreDir
        )
    }
}

/// The lifecycle position of a queue item, matching spec.md §3's
/// `ItemState` enumeration. Transitions only happen through
/// [`crate::Queue`] methods, which keep parent counters consistent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ItemState {
    /// Not yet picked up by any worker.
    Waiting,
    /// Exactly one worker owns this item right now.
    Processing,
    /// A conflict policy (or user resolution) chose to skip this item.
    Skipped,
    /// The item failed and will not be retried without user action.
    Failed,
    /// The item is parked awaiting a [`crate::Queue::update_force_action`]
    /// resolution from the user.
    UserInputNeeded,
    /// The item completed successfully.
    Done,
    /// The item was never attempted because an ancestor was
    /// skipped/failed; it inherits that ancestor's terminal state.
    ForcedToFail,
}

impl ItemState {
    /// Returns whether this state is terminal (no further transitions
    /// happen without an explicit retry).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Failed | Self::Done | Self::ForcedToFail)
    }
}

/// A per-item override of the operation's conflict policy, set as part of
/// resolving a [`ItemState::UserInputNeeded`] item (spec.md GLOSSARY
/// "force action").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ForceAction {
    /// Overwrite the colliding target.
    Overwrite,
    /// Resume an interrupted transfer.
    Resume,
    /// Pick an alternate, non-colliding name.
    Autorename,
    /// Skip this item.
    Skip,
    /// Treat an existing target directory as the destination (join).
    UseExistingDir,
    /// Ignore the condition and proceed as if nothing were wrong (e.g.
    /// unknown attributes, a hidden file).
    Ignore,
    /// Delete the conflicting target before proceeding.
    Delete,
    /// Re-download a file in binary mode after an ASCII-for-binary
    /// detection.
    RedownloadBinary,
    /// Cancel the item outright.
    Cancel,
    /// Retry the item from scratch.
    Retry,
}

/// The state of an upload target directory as tracked by the worker
/// consulting the upload listing cache (spec.md §4.7 step 1). Distinct
/// from the cache entry's own `status` field: this is the per-item view a
/// single worker records as it walks its own directory-creation
/// sub-state-machine.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum TgtDirState {
    /// Not yet consulted against the cache.
    #[default]
    Unknown,
    /// A listing of the target path is in flight, owned by some worker.
    Listing,
    /// The target path's listing is cached and name-collision resolution
    /// can proceed.
    Ready,
    /// The target path could not be listed at all.
    Inaccessible,
}

/// Per-parent child accounting, maintained by [`crate::Queue`] so the
/// invariant `NotDone + Done + Skipped + Failed = ChildCount` and
/// `UserInputNeeded <= NotDone` always holds (spec.md §3, §8).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChildCounters {
    /// Total number of children ever attached to this parent.
    pub child_count: u32,
    /// Children that finished successfully.
    pub done: u32,
    /// Children that were skipped.
    pub skipped: u32,
    /// Children that failed outright.
    pub failed: u32,
    /// Of the not-yet-terminal children, how many are parked in
    /// [`ItemState::UserInputNeeded`].
    pub user_input_needed: u32,
}

impl ChildCounters {
    /// Returns the number of children that are not yet in a terminal
    /// state (`Waiting`, `Processing`, or `UserInputNeeded`).
    #[must_use]
    pub const fn not_done(&self) -> u32 {
        self.child_count - self.done - self.skipped - self.failed
    }

    /// Checks the invariants this counter set must uphold. Used by
    /// [`crate::Queue`]'s debug-only consistency checks.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        let not_done = self.not_done();
        self.done + self.skipped + self.failed <= self.child_count && self.user_input_needed <= not_done
    }
}

/// One entry in the queue: a common header plus the per-kind payload and,
/// for parent items, child accounting.
#[derive(Clone, Debug)]
pub struct Item {
    uid: Uid,
    parent_uid: Option<Uid>,
    kind: ItemKind,
    state: ItemState,
    problem_id: ProblemId,
    problem_detail: Option<String>,
    force_action: Option<ForceAction>,
    source_path: String,
    source_name: String,
    target_name: Option<String>,
    upload_tgt_dir_state: TgtDirState,
    counters: ChildCounters,
}

impl Item {
    /// Constructs a new leaf or parent item in [`ItemState::Waiting`] with
    /// no children yet.
    #[must_use]
    pub fn new(uid: Uid, parent_uid: Option<Uid>, kind: ItemKind, source_path: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            uid,
            parent_uid,
            kind,
            state: ItemState::Waiting,
            problem_id: ProblemId::Ok,
            problem_detail: None,
            force_action: None,
            source_path: source_path.into(),
            source_name: source_name.into(),
            target_name: None,
            upload_tgt_dir_state: TgtDirState::default(),
            counters: ChildCounters::default(),
        }
    }

    /// The item's identity.
    #[must_use]
    pub const fn uid(&self) -> Uid {
        self.uid
    }

    /// The parent item's identity, if this item is a child of one.
    #[must_use]
    pub const fn parent_uid(&self) -> Option<Uid> {
        self.parent_uid
    }

    /// The item's operation-specific kind.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// The item's current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ItemState {
        self.state
    }

    /// The item's current problem id, [`ProblemId::Ok`] unless it has
    /// failed or needs user input.
    #[must_use]
    pub const fn problem_id(&self) -> ProblemId {
        self.problem_id
    }

    /// A free-form description accompanying [`Self::problem_id`], when one
    /// was supplied.
    #[must_use]
    pub fn problem_detail(&self) -> Option<&str> {
        self.problem_detail.as_deref()
    }

    /// The user's per-item override of the operation's conflict policy,
    /// if one has been set.
    #[must_use]
    pub const fn force_action(&self) -> Option<ForceAction> {
        self.force_action
    }

    /// The item's source path, on whichever side (local/remote) its kind
    /// implies.
    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// The item's source file/directory name (the final path component).
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The target name, if it has been set (e.g. after an autorename).
    #[must_use]
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    /// This item's child accounting, meaningful only when
    /// [`ItemKind::is_explore_parent`] is true for its kind.
    #[must_use]
    pub const fn counters(&self) -> ChildCounters {
        self.counters
    }

    /// This item's view of its upload target directory, meaningful only
    /// for the upload-directory-expansion kinds.
    #[must_use]
    pub const fn upload_tgt_dir_state(&self) -> TgtDirState {
        self.upload_tgt_dir_state
    }

    pub(crate) fn set_state(&mut self, state: ItemState) {
        self.state = state;
    }

    pub(crate) fn set_upload_tgt_dir_state(&mut self, state: TgtDirState) {
        self.upload_tgt_dir_state = state;
    }

    pub(crate) fn set_problem(&mut self, problem_id: ProblemId, detail: Option<String>) {
        self.problem_id = problem_id;
        self.problem_detail = detail;
    }

    pub(crate) fn set_force_action(&mut self, action: Option<ForceAction>) {
        self.force_action = action;
    }

    pub(crate) fn set_target_name(&mut self, name: String) {
        self.target_name = Some(name);
    }

    pub(crate) fn counters_mut(&mut self) -> &mut ChildCounters {
        &mut self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_allocator_never_repeats() {
        let allocator = UidAllocator::default();
        let a = allocator.next();
        let b = allocator.next();
        assert_ne!(a, b);
    }

    #[test]
    fn explore_parent_kinds_are_flagged() {
        assert!(ItemKind::UploadCopyExploreDir.is_explore_parent());
        assert!(!ItemKind::UploadCopyFile.is_explore_parent());
    }

    #[test]
    fn child_counters_not_done_derives_correctly() {
        let counters = ChildCounters { child_count: 10, done: 3, skipped: 1, failed: 1, user_input_needed: 2 };
        assert_eq!(counters.not_done(), 5);
        assert!(counters.is_consistent());
    }

    #[test]
    fn child_counters_catch_user_input_needed_exceeding_not_done() {
        let counters = ChildCounters { child_count: 4, done: 2, skipped: 0, failed: 0, user_input_needed: 5 };
        assert!(!counters.is_consistent());
    }

    #[test]
    fn upload_tgt_dir_state_defaults_to_unknown() {
        assert_eq!(TgtDirState::default(), TgtDirState::Unknown);
    }

    #[test]
    fn terminal_states_are_flagged() {
        assert!(ItemState::Done.is_terminal());
        assert!(ItemState::ForcedToFail.is_terminal());
        assert!(!ItemState::Waiting.is_terminal());
        assert!(!ItemState::UserInputNeeded.is_terminal());
    }
}
