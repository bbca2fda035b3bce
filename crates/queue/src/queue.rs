//! The guarded item table: the single source of truth for an operation's
//! items, their states, and their parent/child accounting.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::item::{ChildCounters, ForceAction, Item, ItemKind, ItemState, TgtDirState, Uid, UidAllocator};
use crate::lock_order::{enter, LockLevel};
use crate::problem::ProblemId;

/// Errors returned by [`Queue`]'s mutating operations.
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum QueueError {
    /// No item exists with the given uid.
    #[error("no such item: {0}")]
    NoSuchItem(Uid),
    /// The referenced parent uid does not belong to an explore-parent item.
    #[error("{0} is not an explore-parent item")]
    NotAParent(Uid),
    /// [`Queue::update_force_action`] was called on an item that is not
    /// currently parked in [`ItemState::UserInputNeeded`].
    #[error("{0} is not waiting on user input")]
    NotWaitingOnUser(Uid),
}

/// A snapshot of one item, returned by [`Queue`] iteration methods so
/// callers never hold the internal lock across their own processing.
#[derive(Clone, Debug)]
pub struct ItemSnapshot {
    /// The snapshotted item's identity.
    pub uid: Uid,
    /// The snapshotted item's parent, if any.
    pub parent_uid: Option<Uid>,
    /// The snapshotted item's kind.
    pub kind: ItemKind,
    /// The snapshotted item's lifecycle state.
    pub state: ItemState,
    /// The snapshotted item's problem id.
    pub problem_id: ProblemId,
    /// The snapshotted item's force action, if any.
    pub force_action: Option<ForceAction>,
    /// The snapshotted item's source path.
    pub source_path: String,
    /// The snapshotted item's source name.
    pub source_name: String,
    /// The snapshotted item's target name, if set.
    pub target_name: Option<String>,
    /// The snapshotted item's view of its upload target directory.
    pub upload_tgt_dir_state: TgtDirState,
}

impl From<&Item> for ItemSnapshot {
    fn from(item: &Item) -> Self {
        Self {
            uid: item.uid(),
            parent_uid: item.parent_uid(),
            kind: item.kind(),
            state: item.state(),
            problem_id: item.problem_id(),
            force_action: item.force_action(),
            source_path: item.source_path().to_owned(),
            source_name: item.source_name().to_owned(),
            target_name: item.target_name().map(ToOwned::to_owned),
            upload_tgt_dir_state: item.upload_tgt_dir_state(),
        }
    }
}

struct Inner {
    items: HashMap<Uid, Item>,
    locked_for_more: bool,
}

/// Guards one operation's item table behind a single `RwLock`, exposing
/// the mutating API spec.md §4.6 describes. Every method acquires the
/// lock for the duration of the call only; callers never get a live
/// reference out, avoiding the need to hold this lock across a worker's
/// own (possibly slow) processing of an item.
pub struct Queue {
    inner: RwLock<Inner>,
    uids: UidAllocator,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    /// Creates an empty queue with lock enforcement for [`LockLevel::Queue`].
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner { items: HashMap::new(), locked_for_more: false }), uids: UidAllocator::default() }
    }

    /// Adds a new top-level or child item and returns its freshly
    /// allocated [`Uid`]. If `parent_uid` is given, increments that
    /// parent's `child_count`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotAParent`] if `parent_uid` names an item
    /// whose kind is not an explore-parent, or [`QueueError::NoSuchItem`]
    /// if it names no item at all.
    pub fn add_item(
        &self,
        parent_uid: Option<Uid>,
        kind: ItemKind,
        source_path: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Result<Uid, QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(parent) = parent_uid {
            let parent_item = inner.items.get_mut(&parent).ok_or(QueueError::NoSuchItem(parent))?;
            if !parent_item.kind().is_explore_parent() {
                return Err(QueueError::NotAParent(parent));
            }
            parent_item.counters_mut().child_count += 1;
        }
        let uid = self.uids.next();
        inner.items.insert(uid, Item::new(uid, parent_uid, kind, source_path, source_name));
        Ok(uid)
    }

    /// Replaces an explore-parent item's child set in one step: detaches
    /// every existing child of `parent_uid` (without touching the
    /// parent's counters, which the caller is expected to repopulate by
    /// calling [`Self::add_item`] for each new child) and resets its
    /// counters to zero.
    ///
    /// Used when a directory listing is re-expanded after a retry.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] or [`QueueError::NotAParent`]
    /// under the same conditions as [`Self::add_item`].
    pub fn replace_item_with_list(&self, parent_uid: Uid) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        {
            let parent_item = inner.items.get(&parent_uid).ok_or(QueueError::NoSuchItem(parent_uid))?;
            if !parent_item.kind().is_explore_parent() {
                return Err(QueueError::NotAParent(parent_uid));
            }
        }
        let stale: Vec<Uid> = inner.items.values().filter(|item| item.parent_uid() == Some(parent_uid)).map(Item::uid).collect();
        for child in stale {
            inner.items.remove(&child);
        }
        let parent_item = inner.items.get_mut(&parent_uid).expect("checked above");
        *parent_item.counters_mut() = ChildCounters::default();
        Ok(())
    }

    /// Transitions `uid` to `state`, updating its parent's counters to
    /// keep the `NotDone + Done + Skipped + Failed = ChildCount` invariant
    /// and, in debug builds, asserting it still holds afterward.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn update_state(&self, uid: Uid, state: ItemState) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let parent_uid = {
            let item = inner.items.get_mut(&uid).ok_or(QueueError::NoSuchItem(uid))?;
            let previous = item.state();
            item.set_state(state);
            Self::adjust_parent_delta(previous, state);
            item.parent_uid()
        };
        if let Some(parent_uid) = parent_uid {
            if let Some(parent) = inner.items.get_mut(&parent_uid) {
                Self::apply_child_transition(parent.counters_mut(), state);
                debug_assert!(parent.counters().is_consistent(), "parent counters became inconsistent");
            }
        }
        Ok(())
    }

    fn adjust_parent_delta(_previous: ItemState, _new: ItemState) {
        // Parent counters only ever move forward (a terminal child state
        // is never reverted without a full `retry_item`, which clears
        // and recounts), so no delta bookkeeping is needed beyond
        // `apply_child_transition`'s additive update.
    }

    fn apply_child_transition(counters: &mut ChildCounters, new_state: ItemState) {
        match new_state {
            ItemState::Done => counters.done += 1,
            ItemState::Skipped | ItemState::ForcedToFail => counters.skipped += 1,
            ItemState::Failed => counters.failed += 1,
            ItemState::UserInputNeeded => counters.user_input_needed += 1,
            ItemState::Waiting | ItemState::Processing => {}
        }
    }

    /// Sets or clears `uid`'s problem id and optional detail message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn set_problem(&self, uid: Uid, problem_id: ProblemId, detail: Option<String>) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let item = inner.items.get_mut(&uid).ok_or(QueueError::NoSuchItem(uid))?;
        item.set_problem(problem_id, detail);
        Ok(())
    }

    /// Records the user's resolution of a [`ItemState::UserInputNeeded`]
    /// item and moves it back to [`ItemState::Waiting`] so a worker picks
    /// it up again, decrementing the parent's `user_input_needed` count.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown, or
    /// [`QueueError::NotWaitingOnUser`] if it is not currently parked.
    pub fn update_force_action(&self, uid: Uid, action: ForceAction) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let parent_uid = {
            let item = inner.items.get_mut(&uid).ok_or(QueueError::NoSuchItem(uid))?;
            if item.state() != ItemState::UserInputNeeded {
                return Err(QueueError::NotWaitingOnUser(uid));
            }
            item.set_force_action(Some(action));
            item.set_state(ItemState::Waiting);
            item.parent_uid()
        };
        if let Some(parent_uid) = parent_uid {
            if let Some(parent) = inner.items.get_mut(&parent_uid) {
                parent.counters_mut().user_input_needed -= 1;
            }
        }
        Ok(())
    }

    /// Sets the resolved target file/directory name for `uid` (e.g. after
    /// an autorename).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn update_tgt_name(&self, uid: Uid, name: impl Into<String>) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let item = inner.items.get_mut(&uid).ok_or(QueueError::NoSuchItem(uid))?;
        item.set_target_name(name.into());
        Ok(())
    }

    /// Records `uid`'s current view of its upload target directory
    /// (spec.md §4.7 step 1), as tracked against the upload listing
    /// cache by the worker driving that item's directory-creation
    /// sub-state-machine.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn update_upload_tgt_dir_state(&self, uid: Uid, state: TgtDirState) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let item = inner.items.get_mut(&uid).ok_or(QueueError::NoSuchItem(uid))?;
        item.set_upload_tgt_dir_state(state);
        Ok(())
    }

    /// Marks the queue as locked for new top-level additions: existing
    /// items may still progress and expand, but [`Self::add_item`] with
    /// `parent_uid: None` is expected to be rejected by the caller (the
    /// scheduler), which checks [`Self::is_locked_for_more`] itself since
    /// the lock only gates *new operations*, not in-flight expansion.
    pub fn lock_for_more_operations(&self) {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.locked_for_more = true;
    }

    /// Reverses [`Self::lock_for_more_operations`].
    pub fn unlock(&self) {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.locked_for_more = false;
    }

    /// Returns whether [`Self::lock_for_more_operations`] is currently in
    /// effect.
    #[must_use]
    pub fn is_locked_for_more(&self) -> bool {
        let _guard = enter(LockLevel::Queue);
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).locked_for_more
    }

    /// Resets a terminal item back to [`ItemState::Waiting`], clearing
    /// its problem id and force action, and undoes its contribution to
    /// the parent's counters.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn retry_item(&self, uid: Uid) -> Result<(), QueueError> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (parent_uid, previous_state) = {
            let item = inner.items.get_mut(&uid).ok_or(QueueError::NoSuchItem(uid))?;
            let previous_state = item.state();
            item.set_state(ItemState::Waiting);
            item.set_problem(ProblemId::Ok, None);
            item.set_force_action(None);
            (item.parent_uid(), previous_state)
        };
        if let Some(parent_uid) = parent_uid {
            if let Some(parent) = inner.items.get_mut(&parent_uid) {
                let counters = parent.counters_mut();
                match previous_state {
                    ItemState::Done => counters.done -= 1,
                    ItemState::Skipped | ItemState::ForcedToFail => counters.skipped -= 1,
                    ItemState::Failed => counters.failed -= 1,
                    ItemState::UserInputNeeded => counters.user_input_needed -= 1,
                    ItemState::Waiting | ItemState::Processing => {}
                }
            }
        }
        Ok(())
    }

    /// Convenience for [`Self::update_state`] with [`ItemState::Skipped`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn skip_item(&self, uid: Uid) -> Result<(), QueueError> {
        self.update_state(uid, ItemState::Skipped)
    }

    /// Scans for an item whose problem id is `problem_id`, returning the
    /// first match in an unspecified but stable order. Used by the
    /// engine facade to surface the next unresolved decision to a caller.
    #[must_use]
    pub fn search_item_with_new_error(&self, problem_id: ProblemId) -> Option<ItemSnapshot> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut candidates: Vec<&Item> = inner.items.values().filter(|item| item.problem_id() == problem_id).collect();
        candidates.sort_by_key(|item| item.uid());
        candidates.first().map(|item| ItemSnapshot::from(*item))
    }

    /// Returns a snapshot of the item named `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn get_item(&self, uid: Uid) -> Result<ItemSnapshot, QueueError> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.items.get(&uid).map(ItemSnapshot::from).ok_or(QueueError::NoSuchItem(uid))
    }

    /// Returns the uid of a freshly inserted or existing item matching
    /// `parent_uid` and `source_name`, if one exists. Used to detect
    /// duplicate directory entries across re-listings.
    #[must_use]
    pub fn get_item_uid(&self, parent_uid: Option<Uid>, source_name: &str) -> Option<Uid> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.items.values().find(|item| item.parent_uid() == parent_uid && item.source_name() == source_name).map(Item::uid)
    }

    /// Returns a snapshot of every item currently in the queue, in an
    /// unspecified but stable order. Intended for diagnostics and tests;
    /// production callers should prefer targeted queries.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<ItemSnapshot> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut items: Vec<ItemSnapshot> = inner.items.values().map(ItemSnapshot::from).collect();
        items.sort_by_key(|item| item.uid);
        items
    }

    /// Returns the next item in [`ItemState::Waiting`], if any, without
    /// claiming it. Claiming is [`Self::update_state`] to
    /// [`ItemState::Processing`], done by the caller once it has decided
    /// which worker will take it.
    #[must_use]
    pub fn next_waiting(&self) -> Option<ItemSnapshot> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut candidates: Vec<&Item> = inner.items.values().filter(|item| item.state() == ItemState::Waiting).collect();
        candidates.sort_by_key(|item| item.uid());
        candidates.first().map(|item| ItemSnapshot::from(*item))
    }

    /// Atomically finds the lowest-uid [`ItemState::Waiting`] item and
    /// transitions it to [`ItemState::Processing`] in the same write-lock
    /// scope, so two workers calling this concurrently never claim the
    /// same item (spec.md §8: "at most one worker has an item in
    /// `Processing` for a given `uid`"). [`Self::next_waiting`] cannot
    /// provide this guarantee on its own since a second caller could read
    /// the same snapshot before the first claims it.
    pub fn claim_next_waiting(&self) -> Option<ItemSnapshot> {
        let _guard = enter(LockLevel::Queue);
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let uid = {
            let mut candidates: Vec<&Item> = inner.items.values().filter(|item| item.state() == ItemState::Waiting).collect();
            candidates.sort_by_key(|item| item.uid());
            candidates.first().map(|item| item.uid())?
        };
        let item = inner.items.get_mut(&uid).expect("uid found above");
        item.set_state(ItemState::Processing);
        Some(ItemSnapshot::from(&*item))
    }

    /// Returns the child accounting for `uid`, meaningful only for
    /// explore-parent items. Used by a worker deciding whether a trailing
    /// delete/cleanup sibling (e.g. `UploadMoveDeleteDir`) may run yet, by
    /// checking whether it is the only not-yet-terminal child left.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn counters(&self, uid: Uid) -> Result<ChildCounters, QueueError> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.items.get(&uid).map(Item::counters).ok_or(QueueError::NoSuchItem(uid))
    }

    /// Returns the child accounting of `uid`'s parent, if it has one.
    /// Convenience wrapper over [`Self::counters`] for items that need to
    /// check their siblings' progress rather than their own.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoSuchItem`] if `uid` is unknown.
    pub fn parent_counters(&self, uid: Uid) -> Result<Option<ChildCounters>, QueueError> {
        let _guard = enter(LockLevel::Queue);
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let item = inner.items.get(&uid).ok_or(QueueError::NoSuchItem(uid))?;
        Ok(item.parent_uid().and_then(|parent_uid| inner.items.get(&parent_uid)).map(Item::counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_item_top_level_has_no_parent() {
        let queue = Queue::new();
        let uid = queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        let snap = queue.get_item(uid).unwrap();
        assert_eq!(snap.parent_uid, None);
        assert_eq!(snap.state, ItemState::Waiting);
    }

    #[test]
    fn adding_child_increments_parent_child_count() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "a.txt").unwrap();
        queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "b.txt").unwrap();
        let snap = queue.get_item(parent).unwrap();
        let _ = snap;
        assert_eq!(queue.snapshot_all().len(), 3);
    }

    #[test]
    fn add_item_rejects_non_parent_kind_as_parent() {
        let queue = Queue::new();
        let leaf = queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        let err = queue.add_item(Some(leaf), ItemKind::DeleteFile, "/remote", "b.txt").unwrap_err();
        assert_eq!(err, QueueError::NotAParent(leaf));
    }

    #[test]
    fn update_state_keeps_parent_counters_consistent() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        let a = queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "a.txt").unwrap();
        let b = queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "b.txt").unwrap();
        queue.update_state(a, ItemState::Done).unwrap();
        queue.update_state(b, ItemState::Failed).unwrap();
        // Re-fetch the parent through a raw lock to check counters since
        // ItemSnapshot does not carry them.
        let inner = queue.inner.read().unwrap();
        let counters = inner.items.get(&parent).unwrap().counters();
        assert_eq!(counters.done, 1);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.not_done(), 0);
    }

    #[test]
    fn update_force_action_requires_user_input_needed_state() {
        let queue = Queue::new();
        let uid = queue.add_item(None, ItemKind::UploadCopyFile, "/local", "a.txt").unwrap();
        let err = queue.update_force_action(uid, ForceAction::Overwrite).unwrap_err();
        assert_eq!(err, QueueError::NotWaitingOnUser(uid));
    }

    #[test]
    fn update_force_action_resumes_waiting_and_decrements_parent_count() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        let child = queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "a.txt").unwrap();
        queue.update_state(child, ItemState::UserInputNeeded).unwrap();
        queue.update_force_action(child, ForceAction::Overwrite).unwrap();
        let snap = queue.get_item(child).unwrap();
        assert_eq!(snap.state, ItemState::Waiting);
        assert_eq!(snap.force_action, Some(ForceAction::Overwrite));
        let inner = queue.inner.read().unwrap();
        assert_eq!(inner.items.get(&parent).unwrap().counters().user_input_needed, 0);
    }

    #[test]
    fn retry_item_reverses_terminal_contribution() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        let child = queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "a.txt").unwrap();
        queue.update_state(child, ItemState::Failed).unwrap();
        queue.retry_item(child).unwrap();
        let snap = queue.get_item(child).unwrap();
        assert_eq!(snap.state, ItemState::Waiting);
        let inner = queue.inner.read().unwrap();
        assert_eq!(inner.items.get(&parent).unwrap().counters().failed, 0);
    }

    #[test]
    fn search_item_with_new_error_finds_lowest_matching_uid() {
        let queue = Queue::new();
        let a = queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        let b = queue.add_item(None, ItemKind::DeleteFile, "/remote", "b.txt").unwrap();
        queue.set_problem(b, ProblemId::TgtFileAlreadyExists, None).unwrap();
        queue.set_problem(a, ProblemId::TgtFileAlreadyExists, Some("dup".into())).unwrap();
        let found = queue.search_item_with_new_error(ProblemId::TgtFileAlreadyExists).unwrap();
        assert_eq!(found.uid, a);
    }

    #[test]
    fn lock_for_more_operations_round_trips() {
        let queue = Queue::new();
        assert!(!queue.is_locked_for_more());
        queue.lock_for_more_operations();
        assert!(queue.is_locked_for_more());
        queue.unlock();
        assert!(!queue.is_locked_for_more());
    }

    #[test]
    fn replace_item_with_list_detaches_stale_children() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "stale.txt").unwrap();
        queue.replace_item_with_list(parent).unwrap();
        assert_eq!(queue.snapshot_all().len(), 1);
        let inner = queue.inner.read().unwrap();
        assert_eq!(inner.items.get(&parent).unwrap().counters().child_count, 0);
    }

    #[test]
    fn update_upload_tgt_dir_state_round_trips() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        assert_eq!(queue.get_item(parent).unwrap().upload_tgt_dir_state, TgtDirState::Unknown);
        queue.update_upload_tgt_dir_state(parent, TgtDirState::Listing).unwrap();
        assert_eq!(queue.get_item(parent).unwrap().upload_tgt_dir_state, TgtDirState::Listing);
    }

    #[test]
    fn next_waiting_returns_lowest_uid_not_yet_claimed() {
        let queue = Queue::new();
        let a = queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        queue.update_state(a, ItemState::Processing).unwrap();
        let b = queue.add_item(None, ItemKind::DeleteFile, "/remote", "b.txt").unwrap();
        let next = queue.next_waiting().unwrap();
        assert_eq!(next.uid, b);
    }

    #[test]
    fn claim_next_waiting_transitions_to_processing() {
        let queue = Queue::new();
        let a = queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        let claimed = queue.claim_next_waiting().unwrap();
        assert_eq!(claimed.uid, a);
        assert_eq!(queue.get_item(a).unwrap().state, ItemState::Processing);
        assert!(queue.claim_next_waiting().is_none());
    }

    #[test]
    fn claim_next_waiting_never_hands_out_the_same_item_twice() {
        let queue = Queue::new();
        queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        let first = queue.claim_next_waiting().unwrap();
        let second = queue.claim_next_waiting();
        assert!(second.is_none() || second.unwrap().uid != first.uid);
    }

    #[test]
    fn counters_reports_child_accounting() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
        queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "a.txt").unwrap();
        let counters = queue.counters(parent).unwrap();
        assert_eq!(counters.child_count, 1);
    }

    #[test]
    fn parent_counters_is_none_for_top_level_items() {
        let queue = Queue::new();
        let uid = queue.add_item(None, ItemKind::DeleteFile, "/remote", "a.txt").unwrap();
        assert!(queue.parent_counters(uid).unwrap().is_none());
    }

    #[test]
    fn parent_counters_reflects_sibling_progress() {
        let queue = Queue::new();
        let parent = queue.add_item(None, ItemKind::UploadMoveExploreDir, "/local", "dir").unwrap();
        let a = queue.add_item(Some(parent), ItemKind::UploadMoveFile, "/local/dir", "a.txt").unwrap();
        let trailing = queue.add_item(Some(parent), ItemKind::UploadMoveDeleteDir, "/local/dir", "dir").unwrap();
        queue.update_state(a, ItemState::Done).unwrap();
        let counters = queue.parent_counters(trailing).unwrap().unwrap();
        assert_eq!(counters.not_done(), 1);
    }
}
