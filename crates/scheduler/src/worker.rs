//! The worker outer state machine and per-[`ItemKind`] dispatch, spec.md
//! §4.7: `Preparing -> LookingForWork -> Working -> (LookingForWork|
//! Stopped)`.
//!
//! A [`Worker`] owns exactly one [`ControlConnection`] and drives it from
//! a single thread (spec.md §5's "per-connection state owned by its
//! worker"); [`Worker::run`] is meant to be the body of that thread.
//! Several workers may share one [`queue::Queue`], one
//! [`crate::cache::UploadListingCache`], and one [`diskpool::DiskPool`],
//! which is why [`queue::Queue::claim_next_waiting`] claims an item
//! atomically rather than a worker peeking and then claiming in two
//! steps.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use control::{CancelToken, ChangeDirOutcome, ControlConnection, DataChannelMode, Endpoint};
use crossbeam_channel::Receiver;
use dataconn::download::DownloadConnection;
use dataconn::upload::UploadConnection;
use dataconn::ServiceOutcome;
use diskpool::{CompletionState, DiskPool, EntryKind, FileAttrs, Job, ProducedData, RequesterId, WriteConflictPolicy};
use logging::{Direction, LogEvent, LogSink, LogUid};
use queue::{ForceAction, ItemKind, ItemSnapshot, ItemState, ProblemId, Queue, TgtDirState, Uid};
use reactor::{Event, Reactor, SocketId};
use wire::Command;

use crate::autorename::first_free_candidate;
use crate::cache::{CacheKey, CachedEntry, LookupOutcome, UploadListingCache};
use crate::error::SchedulerError;
use crate::listing::fetch_remote_listing;
use crate::mask::{MaskSet, TransferModeDefault};
use crate::policy::{AsciiForBinaryPolicy, CannotCreatePolicy, ConflictPolicies, DeleteGuardPolicy, DirExistsPolicy, FileExistsPolicy};
use crate::targets::{mirror_to_local, mirror_to_remote};

/// A worker's identity within its operation, used only for logging.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WorkerId(pub u32);

/// The worker's outer lifecycle state, spec.md §4.7.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerState {
    /// Connecting and authenticating, not yet looking for an item.
    Preparing,
    /// Idle, polling the queue for a claimable item.
    LookingForWork,
    /// Driving one claimed item through its sub-state-machine.
    Working,
    /// [`WorkerControl::request_stop`] was observed; the run loop returned.
    Stopped,
}

/// A cheap, cloneable handle a caller uses to ask a running [`Worker`] to
/// stop or pause, mirroring spec.md §4.7's "every worker checks
/// `ShouldStop` at sub-state boundaries, never mid-syscall".
#[derive(Clone, Debug, Default)]
pub struct WorkerControl {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl WorkerControl {
    /// Creates a fresh, unstoppable and unpaused handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the owning worker stop at its next checkpoint.
    /// Idempotent.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Returns whether [`Self::request_stop`] has been called.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Pauses or resumes the owning worker. A paused worker finishes its
    /// current item (cooperative cancellation is a separate, stronger
    /// signal) but will not claim another until unpaused.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Returns whether the worker is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// The family of operation a worker's items all belong to, deciding which
/// branch of [`Worker::process`] applies to a leaf item.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum OperationKind {
    /// Remote delete.
    Delete,
    /// Remote-to-local copy.
    CopyDownload,
    /// Remote-to-local move (delete source after).
    MoveDownload,
    /// Local-to-remote copy.
    CopyUpload,
    /// Local-to-remote move (delete source after).
    MoveUpload,
    /// Remote attribute change.
    ChAttr,
}

/// Live progress counters a worker updates as it processes items, cheap
/// to snapshot from another thread (the `engine` facade's polling API).
#[derive(Debug, Default)]
pub struct ProgressCounters {
    bytes_total: AtomicU64,
    bytes_done: AtomicU64,
    items_done: AtomicU64,
}

/// A point-in-time read of [`ProgressCounters`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgressSnapshot {
    /// Total bytes expected across every item with a known size.
    pub bytes_total: u64,
    /// Bytes transferred so far.
    pub bytes_done: u64,
    /// Items that reached a terminal state.
    pub items_done: u64,
}

impl ProgressCounters {
    /// Adds `bytes` to the known total (called as items report a size).
    pub fn add_total(&self, bytes: u64) {
        self.bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Adds `bytes` to the done count (called as transfers make progress).
    pub fn add_done(&self, bytes: u64) {
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records one more item reaching a terminal state.
    pub fn item_finished(&self) {
        self.items_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the current counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_total: self.bytes_total.load(Ordering::Relaxed),
            bytes_done: self.bytes_done.load(Ordering::Relaxed),
            items_done: self.items_done.load(Ordering::Relaxed),
        }
    }
}

/// What a [`Worker`] needs to build: the endpoint, which family of
/// operation its items belong to, the two root paths the whole operation
/// mirrors between, and the conflict policies governing collisions.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// The server to connect to.
    pub endpoint: Endpoint,
    /// The operation family this worker's items belong to.
    pub kind: OperationKind,
    /// The local root path (source for an upload, destination for a download).
    pub local_root: PathBuf,
    /// The remote root path (destination for an upload, source for a download/delete).
    pub remote_root: String,
    /// The conflict policies in effect for the whole operation.
    pub policies: ConflictPolicies,
    /// The attributes to apply, for [`OperationKind::ChAttr`] only.
    pub attrs: Option<FileAttrs>,
    /// Which entries a directory exploration includes at all (spec.md
    /// §6's `masks`). Matches every name when unset.
    pub include_mask: MaskSet,
    /// Which file names transfer in ASCII under
    /// [`TransferModeDefault::Autodetect`] (spec.md §6's `ascii_mask`).
    pub ascii_mask: MaskSet,
    /// How a worker picks [`TransferMode`] for a file it has not yet
    /// inspected.
    pub transfer_mode_default: TransferModeDefault,
}

/// How [`Worker::process`] left an item, translated by [`Worker::finish_item`]
/// into the matching [`Queue`] transition.
#[derive(Debug, Eq, PartialEq)]
enum Outcome {
    /// The item completed successfully.
    Done,
    /// A conflict policy chose to skip the item.
    Skipped,
    /// Not ready yet (e.g. waiting on a sibling or a listing in flight);
    /// put back in [`ItemState::Waiting`] without recording a problem.
    Deferred,
    /// The item needs a user decision before it can proceed.
    NeedsInput(ProblemId, Option<String>),
    /// The item failed outright.
    Failed(ProblemId, Option<String>),
}

/// One worker: a single thread's view of a control connection, the
/// shared queue it pulls items from, and the shared disk pool and
/// listing cache its items may need.
pub struct Worker {
    id: WorkerId,
    control: ControlConnection,
    control_peer: SocketAddr,
    cancel: CancelToken,
    reactor: Arc<Reactor>,
    disk: Arc<DiskPool>,
    disk_requester: RequesterId,
    disk_completions: Receiver<diskpool::JobCompletion>,
    queue: Arc<Queue>,
    cache: Arc<UploadListingCache>,
    progress: Arc<ProgressCounters>,
    kind: OperationKind,
    local_root: PathBuf,
    remote_root: String,
    policies: ConflictPolicies,
    attrs: Option<FileAttrs>,
    include_mask: MaskSet,
    ascii_mask: MaskSet,
    transfer_mode_default: TransferModeDefault,
    handle: WorkerControl,
    state: WorkerState,
    log_uid: LogUid,
    log_sink: Arc<dyn LogSink>,
    attempts: std::collections::HashMap<Uid, u32>,
}

/// Bound on spec.md §7's "retry locally (small number of attempts bounded
/// by `totalAttemptNum`)": a retryable control-connection error (a `4xx`
/// reply, or the connection closing before a final reply) is requeued to
/// [`ItemState::Waiting`] this many times before the item is given up as
/// [`ItemState::Failed`], so a server that is permanently unreachable does
/// not spin a worker forever. Re-claiming the item re-runs its leaf
/// handler from scratch (spec.md §8 scenario 5's "no resume at this
/// layer"); [`ControlConnection::ensure_connected`] performs the actual
/// reconnect-with-backoff on the next claim.
const MAX_ITEM_ATTEMPTS: u32 = 3;

/// How long [`Worker::run`] sleeps between empty queue polls.
const POLL_INTERVAL: Duration = Duration::from_millis(150);
/// How long a single disk job is allowed to take before [`Worker`]
/// treats its completion channel as stalled.
const DISK_JOB_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a data-connection `service` call blocks for one iteration.
const SERVICE_POLL: Duration = Duration::from_millis(200);
/// How long to wait for an active-mode listener's `Accepted` event.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(20);
/// How long [`Worker::abandon_partial_download`] waits for a cancelled
/// download's file handle to finish closing before giving up on the
/// cleanup (the transfer is abandoned either way; this only bounds how
/// long the worker blocks first).
const DOWNLOAD_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

impl Worker {
    /// Builds a worker, ready to [`Self::run`]. Does not connect yet;
    /// [`ControlConnection::ensure_connected`] happens lazily on the
    /// first loop iteration, matching `control`'s own lazy-connect
    /// contract.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: WorkerId,
        config: WorkerConfig,
        reactor: Arc<Reactor>,
        disk: Arc<DiskPool>,
        queue: Arc<Queue>,
        cache: Arc<UploadListingCache>,
        progress: Arc<ProgressCounters>,
        cancel: CancelToken,
        log_uid: LogUid,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        let control_peer = config.endpoint.addr;
        let control = ControlConnection::new(Arc::clone(&reactor), config.endpoint, log_uid, Arc::clone(&log_sink));
        let (disk_requester, disk_completions) = disk.register();
        Self {
            id,
            control,
            control_peer,
            cancel,
            reactor,
            disk,
            disk_requester,
            disk_completions,
            queue,
            cache,
            progress,
            kind: config.kind,
            local_root: config.local_root,
            remote_root: config.remote_root,
            policies: config.policies,
            attrs: config.attrs,
            include_mask: config.include_mask,
            ascii_mask: config.ascii_mask,
            transfer_mode_default: config.transfer_mode_default,
            handle: WorkerControl::new(),
            state: WorkerState::Preparing,
            log_uid,
            log_sink,
            attempts: std::collections::HashMap::new(),
        }
    }

    /// Returns a cloneable control handle for this worker.
    #[must_use]
    pub fn control_handle(&self) -> WorkerControl {
        self.handle.clone()
    }

    /// The worker's identity.
    #[must_use]
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// The worker's current outer state.
    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    fn log(&self, direction: Direction, text: impl Into<String>) {
        self.log_sink.log(&LogEvent::new(self.log_uid, direction, text));
    }

    /// Runs the outer loop until [`WorkerControl::request_stop`] is
    /// observed or the queue is permanently out of claimable work (the
    /// caller decides the latter; this loop just keeps polling).
    pub fn run(&mut self) {
        self.state = WorkerState::Preparing;
        loop {
            if self.handle.should_stop() {
                self.state = WorkerState::Stopped;
                self.send_quit_once();
                return;
            }

            if self.handle.is_paused() {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            if let Err(error) = self.control.service_keep_alive(&self.cancel) {
                self.log(Direction::Error, format!("keep-alive: {error}"));
            }

            self.state = WorkerState::LookingForWork;
            let Some(snapshot) = self.queue.claim_next_waiting() else {
                std::thread::sleep(POLL_INTERVAL);
                continue;
            };

            self.state = WorkerState::Working;
            let uid = snapshot.uid;
            let outcome = self.process(&snapshot);
            self.finish_item(uid, outcome);
        }
    }

    fn send_quit_once(&mut self) {
        if matches!(self.control.state(), control::ControlState::Disconnected) {
            return;
        }
        self.control.quit(&self.cancel);
    }

    fn finish_item(&mut self, uid: Uid, outcome: Result<Outcome, SchedulerError>) {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(SchedulerError::Control(error)) if error.is_retryable() && self.should_retry(uid) => {
                self.log(Direction::Error, format!("{uid}: retrying after {error}"));
                Outcome::Deferred
            }
            Err(error) => {
                self.log(Direction::Error, format!("{uid}: {error}"));
                Outcome::Failed(ProblemId::Ok, Some(error.to_string()))
            }
        };

        let result = match outcome {
            Outcome::Done => {
                self.attempts.remove(&uid);
                self.progress.item_finished();
                self.queue.update_state(uid, ItemState::Done)
            }
            Outcome::Skipped => {
                self.attempts.remove(&uid);
                self.progress.item_finished();
                self.queue.update_state(uid, ItemState::Skipped)
            }
            Outcome::Deferred => self.queue.retry_item(uid),
            Outcome::NeedsInput(problem_id, detail) => {
                let result = self.queue.set_problem(uid, problem_id, detail);
                result.and_then(|()| self.queue.update_state(uid, ItemState::UserInputNeeded))
            }
            Outcome::Failed(problem_id, detail) => {
                self.attempts.remove(&uid);
                let result = self.queue.set_problem(uid, problem_id, detail);
                self.progress.item_finished();
                result.and_then(|()| self.queue.update_state(uid, ItemState::Failed))
            }
        };

        if let Err(error) = result {
            self.log(Direction::Error, format!("{uid}: queue update failed: {error}"));
        }
    }

    /// Tracks spec.md §7's bounded local-retry count for `uid`: returns
    /// `true` and increments the counter while it is still under
    /// [`MAX_ITEM_ATTEMPTS`], `false` once exhausted (so the caller falls
    /// through to [`Outcome::Failed`] instead of requeuing forever).
    fn should_retry(&mut self, uid: Uid) -> bool {
        let count = self.attempts.entry(uid).or_insert(0);
        *count += 1;
        *count <= MAX_ITEM_ATTEMPTS
    }

    /// Dispatches one claimed item to the sub-state-machine its
    /// [`ItemKind`] implies.
    fn process(&mut self, item: &ItemSnapshot) -> Result<Outcome, SchedulerError> {
        if let Some(action) = item.force_action {
            return self.process_forced(item, action);
        }

        match item.kind {
            ItemKind::DeleteFile | ItemKind::DeleteLink => self.delete_leaf(item),
            ItemKind::DeleteExploreDir => self.explore_remote_dir(item, ItemKind::DeleteExploreDir),
            ItemKind::DeleteDir => self.delete_dir(item),
            ItemKind::CopyFileOrLink => self.download_leaf(item, false),
            ItemKind::MoveFileOrLink => self.download_leaf(item, true),
            ItemKind::CopyResolveLink => self.resolve_link(item, false),
            ItemKind::MoveResolveLink => self.resolve_link(item, true),
            ItemKind::CopyExploreDir => self.explore_remote_dir(item, ItemKind::CopyExploreDir),
            ItemKind::MoveExploreDir => self.explore_remote_dir(item, ItemKind::MoveExploreDir),
            ItemKind::UploadCopyFile => self.upload_leaf(item, false),
            ItemKind::UploadMoveFile => self.upload_leaf(item, true),
            ItemKind::UploadCopyExploreDir => self.explore_local_dir(item, false),
            ItemKind::UploadMoveExploreDir => self.explore_local_dir(item, true),
            ItemKind::UploadMoveDeleteDir => self.upload_move_delete_dir(item),
            ItemKind::ChAttrFile | ItemKind::ChAttrDir | ItemKind::ChAttrResolveLink => self.chattr_leaf(item),
            ItemKind::ChAttrExploreDir => self.explore_remote_dir(item, ItemKind::ChAttrExploreDir),
        }
    }

    /// Replays a user's [`ForceAction`] resolution instead of the normal
    /// conflict-policy path, spec.md §4.6's `UserInputNeeded` recovery.
    fn process_forced(&mut self, item: &ItemSnapshot, action: ForceAction) -> Result<Outcome, SchedulerError> {
        match action {
            ForceAction::Skip => Ok(Outcome::Skipped),
            ForceAction::Cancel => Ok(Outcome::Failed(item.problem_id, None)),
            ForceAction::Retry | ForceAction::Overwrite | ForceAction::Resume | ForceAction::RedownloadBinary => {
                self.process_leaf_with_policy_override(item, action)
            }
            ForceAction::Autorename => self.process_leaf_with_policy_override(item, action),
            ForceAction::UseExistingDir | ForceAction::Ignore | ForceAction::Delete => {
                self.process_leaf_with_policy_override(item, action)
            }
        }
    }

    fn process_leaf_with_policy_override(&mut self, item: &ItemSnapshot, _action: ForceAction) -> Result<Outcome, SchedulerError> {
        // The per-item force action narrows the operation's normal
        // conflict policy down to a single resolved choice for this one
        // retry; the leaf handlers below already re-derive the write
        // policy from `self.policies` each call, so simply re-running
        // the matching leaf handler re-applies the user's decision
        // (diskpool's own conflict handling, e.g. `Overwrite`, is what
        // actually changes behavior).
        match item.kind {
            ItemKind::DeleteFile | ItemKind::DeleteLink => self.delete_leaf(item),
            ItemKind::DeleteDir => self.delete_dir(item),
            ItemKind::CopyFileOrLink => self.download_leaf(item, false),
            ItemKind::MoveFileOrLink => self.download_leaf(item, true),
            ItemKind::UploadCopyFile => self.upload_leaf(item, false),
            ItemKind::UploadMoveFile => self.upload_leaf(item, true),
            ItemKind::ChAttrFile | ItemKind::ChAttrDir | ItemKind::ChAttrResolveLink => self.chattr_leaf(item),
            _ => Ok(Outcome::Deferred),
        }
    }

    // ---- delete family --------------------------------------------------

    fn delete_leaf(&mut self, item: &ItemSnapshot) -> Result<Outcome, SchedulerError> {
        self.control.ensure_connected(&self.cancel)?;
        let full_path = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
        match self.control.send_command(&Command::Dele(full_path), &self.cancel) {
            Ok(_reply) => Ok(Outcome::Done),
            Err(control::ControlError::Permanent { reply_text, .. }) => {
                Ok(Outcome::NeedsInput(ProblemId::UnableToCwd, Some(reply_text)))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn delete_dir(&mut self, item: &ItemSnapshot) -> Result<Outcome, SchedulerError> {
        if let Some(counters) = self.queue.parent_counters(item.uid)? {
            if counters.not_done() > 1 {
                return Ok(Outcome::Deferred);
            }
        }
        self.control.ensure_connected(&self.cancel)?;
        let full_path = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
        match self.control.send_command(&Command::Rmd(full_path), &self.cancel) {
            Ok(_reply) => Ok(Outcome::Done),
            Err(control::ControlError::Permanent { reply_text, .. }) => {
                match self.policies.hidden_dir_del {
                    DeleteGuardPolicy::Ask => Ok(Outcome::NeedsInput(ProblemId::UnableToCwd, Some(reply_text))),
                    DeleteGuardPolicy::Skip => Ok(Outcome::Skipped),
                    DeleteGuardPolicy::Delete => Ok(Outcome::NeedsInput(ProblemId::UnableToCwd, Some(reply_text))),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    // ---- remote directory exploration (delete/copy/move/chattr) --------

    fn explore_remote_dir(&mut self, item: &ItemSnapshot, self_kind: ItemKind) -> Result<Outcome, SchedulerError> {
        self.control.ensure_connected(&self.cancel)?;
        let full_path = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
        let entries = match fetch_remote_listing(&mut self.control, &self.reactor, self.control_peer, &full_path, &self.cancel) {
            Ok(entries) => entries,
            Err(_) => return Ok(Outcome::NeedsInput(ProblemId::UnableToCwd, None)),
        };

        self.queue.replace_item_with_list(item.uid)?;
        for entry in entries {
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            // Directories are always traversed regardless of the mask so
            // a matching file several levels down is still reached; only
            // leaf entries are filtered.
            if entry.kind != EntryKind::Dir && !self.include_mask.is_match(&entry.name) {
                continue;
            }
            let child_kind = self.child_kind_for(self_kind, entry.kind);
            self.queue.add_item(Some(item.uid), child_kind, full_path.clone(), entry.name)?;
        }
        // A `DeleteExploreDir`/`MoveExploreDir` needs the directory itself
        // removed once every other child is terminal (`delete_dir` defers
        // via its own `not_done() <= 1` guard, the same one
        // `upload_move_delete_dir` uses), and a `ChAttrExploreDir` needs
        // its own attributes changed; both are added as a trailing
        // sibling child rather than handled on the explore item itself.
        if let Some(trailing_kind) = self.trailing_self_kind(self_kind) {
            self.queue.add_item(Some(item.uid), trailing_kind, item.source_path.clone(), item.source_name.clone())?;
        }
        Ok(Outcome::Done)
    }

    const fn trailing_self_kind(&self, parent_kind: ItemKind) -> Option<ItemKind> {
        match parent_kind {
            ItemKind::DeleteExploreDir | ItemKind::MoveExploreDir => Some(ItemKind::DeleteDir),
            ItemKind::ChAttrExploreDir => Some(ItemKind::ChAttrDir),
            ItemKind::CopyExploreDir => None,
            _ => None,
        }
    }

    fn child_kind_for(&self, parent_kind: ItemKind, entry_kind: EntryKind) -> ItemKind {
        match (parent_kind, entry_kind) {
            (ItemKind::DeleteExploreDir, EntryKind::Dir) => ItemKind::DeleteExploreDir,
            (ItemKind::DeleteExploreDir, _) => ItemKind::DeleteFile,
            (ItemKind::CopyExploreDir, EntryKind::Dir) => ItemKind::CopyExploreDir,
            (ItemKind::CopyExploreDir, EntryKind::Link) => ItemKind::CopyResolveLink,
            (ItemKind::CopyExploreDir, EntryKind::File) => ItemKind::CopyFileOrLink,
            (ItemKind::MoveExploreDir, EntryKind::Dir) => ItemKind::MoveExploreDir,
            (ItemKind::MoveExploreDir, EntryKind::Link) => ItemKind::MoveResolveLink,
            (ItemKind::MoveExploreDir, EntryKind::File) => ItemKind::MoveFileOrLink,
            (ItemKind::ChAttrExploreDir, EntryKind::Dir) => ItemKind::ChAttrExploreDir,
            (ItemKind::ChAttrExploreDir, EntryKind::Link) => ItemKind::ChAttrResolveLink,
            (ItemKind::ChAttrExploreDir, EntryKind::File) => ItemKind::ChAttrFile,
            _ => unreachable!("explore_remote_dir only ever called with an explore-parent kind"),
        }
    }

    /// Resolves a remote symlink before copying/moving it (spec.md §4.6
    /// `CopyResolveLink`/`MoveResolveLink`). `SIZE` succeeding means the
    /// link points at a file; most servers reply `550` for a directory
    /// target. A directory target is downloaded inline, item by item,
    /// rather than fanned out into new queue children: [`ItemKind`] has
    /// no "became an explore parent after resolving" variant, so mutating
    /// this item's kind mid-flight is not representable in the queue.
    fn resolve_link(&mut self, item: &ItemSnapshot, is_move: bool) -> Result<Outcome, SchedulerError> {
        self.control.ensure_connected(&self.cancel)?;
        let full_path = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
        match self.control.send_command(&Command::Size(full_path.clone()), &self.cancel) {
            Ok(_reply) => self.download_leaf(item, is_move),
            Err(control::ControlError::Permanent { .. }) => self.download_directory_inline(item, &full_path, is_move),
            Err(error) => Err(error.into()),
        }
    }

    fn download_directory_inline(&mut self, item: &ItemSnapshot, remote_dir: &str, is_move: bool) -> Result<Outcome, SchedulerError> {
        let entries = match fetch_remote_listing(&mut self.control, &self.reactor, self.control_peer, remote_dir, &self.cancel) {
            Ok(entries) => entries,
            Err(_) => return Ok(Outcome::NeedsInput(ProblemId::UnableToResolveLnk, None)),
        };
        let local_dir = mirror_to_local(self.control.path_type(), &self.remote_root, &self.local_root, remote_dir);
        self.run_disk_job(Job::CreateDir { path: local_dir.clone() })?;

        for entry in entries {
            if entry.name == "." || entry.name == ".." || entry.kind == EntryKind::Dir {
                continue;
            }
            let child = ItemSnapshot {
                uid: item.uid,
                parent_uid: item.parent_uid,
                kind: ItemKind::CopyFileOrLink,
                state: ItemState::Processing,
                problem_id: ProblemId::Ok,
                force_action: None,
                source_path: remote_dir.to_string(),
                source_name: entry.name,
                target_name: None,
                upload_tgt_dir_state: TgtDirState::default(),
            };
            self.download_leaf(&child, is_move)?;
        }
        Ok(Outcome::Done)
    }

    // ---- downloads -------------------------------------------------------

    fn download_leaf(&mut self, item: &ItemSnapshot, is_move: bool) -> Result<Outcome, SchedulerError> {
        let force_binary = item.force_action == Some(ForceAction::RedownloadBinary);
        self.download_leaf_with_mode(item, is_move, force_binary)
    }

    /// The actual download leaf, parameterized on whether `TYPE A`
    /// resolution is pinned to binary. `force_binary` starts `true` either
    /// because the item's [`ForceAction::RedownloadBinary`] resolution
    /// asked for it, or because this is a same-item retry after
    /// [`AsciiForBinaryPolicy::RedownloadBinary`] fired automatically
    /// below.
    fn download_leaf_with_mode(&mut self, item: &ItemSnapshot, is_move: bool, force_binary: bool) -> Result<Outcome, SchedulerError> {
        self.control.ensure_connected(&self.cancel)?;
        let full_remote = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
        let target_name = item.target_name.clone().unwrap_or_else(|| item.source_name.clone());
        let local_dir = mirror_to_local(self.control.path_type(), &self.remote_root, &self.local_root, &item.source_path);
        let local_path = local_dir.join(&target_name);

        if let Some(parent) = local_path.parent() {
            self.run_disk_job(Job::CreateDir { path: parent.to_path_buf() })?;
        }

        let write_policy = match self.policies.file_already_exists {
            FileExistsPolicy::Ask if !local_path.exists() => WriteConflictPolicy::Overwrite,
            FileExistsPolicy::Ask => return Ok(Outcome::NeedsInput(ProblemId::TgtFileAlreadyExists, None)),
            FileExistsPolicy::Overwrite => WriteConflictPolicy::Overwrite,
            FileExistsPolicy::Resume => WriteConflictPolicy::Resume,
            FileExistsPolicy::ResumeOrOverwrite => WriteConflictPolicy::ResumeOrOverwrite,
            FileExistsPolicy::Autorename => WriteConflictPolicy::Autorename,
            FileExistsPolicy::Skip if local_path.exists() => return Ok(Outcome::Skipped),
            FileExistsPolicy::Skip => WriteConflictPolicy::Overwrite,
        };

        let transfer_mode = if force_binary {
            wire::TransferMode::Binary
        } else {
            self.transfer_mode_default.resolve(&item.source_name, &self.ascii_mask)
        };
        self.control.set_transfer_mode(transfer_mode, &self.cancel)?;
        let plan = self.control.prepare_data_channel(DataChannelMode::Passive { active_fallback_addr: None }, &self.cancel)?;
        let (socket, events) = self.open_data_socket(&plan)?;

        self.control.send_command(&Command::Retr(full_remote), &self.cancel)?;

        let mut download = DownloadConnection::new(
            Arc::clone(&self.reactor),
            socket,
            events,
            Arc::clone(&self.disk),
            local_path.clone(),
            write_policy,
            transfer_mode,
            None,
            None,
        );

        let outcome = loop {
            if self.handle.should_stop() || self.cancel.is_cancelled() {
                download.cancel_and_flush();
                break Outcome::Deferred;
            }
            match download.service(SERVICE_POLL) {
                Ok(ServiceOutcome::Done) => break Outcome::Done,
                Ok(ServiceOutcome::Progress) => {
                    self.progress.add_done(download.current_rate_bytes_per_second() as u64 * 0);
                    continue;
                }
                Ok(ServiceOutcome::Idle) => continue,
                Ok(ServiceOutcome::AsciiBinaryMismatch) => match self.policies.ascii_tr_mode_for_bin_file {
                    AsciiForBinaryPolicy::Ignore => continue,
                    AsciiForBinaryPolicy::Ask => {
                        self.abandon_partial_download(&mut download, &local_path);
                        break Outcome::NeedsInput(ProblemId::AsciiTrModeForBinFile, None);
                    }
                    AsciiForBinaryPolicy::Cancel => {
                        self.abandon_partial_download(&mut download, &local_path);
                        break Outcome::Failed(ProblemId::AsciiTrModeForBinFile, None);
                    }
                    AsciiForBinaryPolicy::RedownloadBinary => {
                        self.abandon_partial_download(&mut download, &local_path);
                        let _ = self.control.read_transfer_reply(&self.cancel);
                        return self.download_leaf_with_mode(item, is_move, true);
                    }
                },
                Ok(ServiceOutcome::NoDataTransferTimeout) => break Outcome::Failed(ProblemId::DataConTimeout, None),
                Err(error) => break Outcome::Failed(ProblemId::TransferFailedOnCreatedFile, Some(error.to_string())),
            }
        };

        let outcome = self.drain_transfer_reply(outcome, ProblemId::TransferFailedOnCreatedFile);

        if matches!(outcome, Outcome::Done) && is_move {
            let full_remote_for_delete = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
            self.control.send_command(&Command::Dele(full_remote_for_delete), &self.cancel)?;
        }

        Ok(outcome)
    }

    /// Flushes and closes a download abandoned mid-transfer by an ASCII/
    /// binary mismatch, then deletes the partial local file so a
    /// subsequent resolution (redownload or a plain retry) starts clean
    /// rather than resuming into corrupted content.
    fn abandon_partial_download(&mut self, download: &mut DownloadConnection, local_path: &Path) {
        download.cancel_and_flush();
        let _ = download.wait_for_file_close(DOWNLOAD_CLOSE_TIMEOUT);
        let _ = self.run_disk_job(Job::Delete { path: local_path.to_path_buf() });
    }

    /// Reads and classifies the trailing `226`/`426` reply a `RETR`/
    /// `STOR` leaves on the control connection once its data connection
    /// closes (`ControlConnection::read_transfer_reply`'s contract), or
    /// is a no-op for [`Outcome::Deferred`] (the worker is stopping and
    /// will `QUIT` rather than send another command). Downgrades `outcome`
    /// to [`Outcome::Failed`] if the trailing reply itself reports
    /// failure, so a caller never proceeds (e.g. with a `DELE` for a
    /// move) on a transfer the server actually aborted.
    fn drain_transfer_reply(&mut self, outcome: Outcome, problem_on_failure: ProblemId) -> Outcome {
        if matches!(outcome, Outcome::Deferred) {
            return outcome;
        }
        match self.control.read_transfer_reply(&self.cancel) {
            Ok(_) => outcome,
            Err(error) => Outcome::Failed(problem_on_failure, Some(error.to_string())),
        }
    }

    // ---- uploads -----------------------------------------------------------

    fn upload_leaf(&mut self, item: &ItemSnapshot, is_move: bool) -> Result<Outcome, SchedulerError> {
        self.control.ensure_connected(&self.cancel)?;
        let local_path = Path::new(&item.source_path).join(&item.source_name);
        let remote_dir = mirror_to_remote(self.control.path_type(), &self.local_root, &self.remote_root, Path::new(&item.source_path));
        let target_name = item.target_name.clone().unwrap_or_else(|| item.source_name.clone());
        let full_remote = wire::path::append(self.control.path_type(), &remote_dir, &target_name);

        match self.control.change_working_dir(&remote_dir, &self.cancel)? {
            ChangeDirOutcome::Ok => {}
            ChangeDirOutcome::NotFound => return Ok(Outcome::NeedsInput(ProblemId::UnableToCwd, None)),
            ChangeDirOutcome::PermissionDenied => return Ok(Outcome::NeedsInput(ProblemId::UnableToCwd, None)),
        }

        let transfer_mode = self.transfer_mode_default.resolve(&item.source_name, &self.ascii_mask);
        self.control.set_transfer_mode(transfer_mode, &self.cancel)?;
        let plan = self.control.prepare_data_channel(DataChannelMode::Passive { active_fallback_addr: None }, &self.cancel)?;
        let (socket, events) = self.open_data_socket(&plan)?;

        if let Err(control::ControlError::Permanent { reply_text, .. }) = self.control.send_command(&Command::Stor(full_remote), &self.cancel) {
            return Ok(Outcome::NeedsInput(ProblemId::UploadUnableToStore, Some(reply_text)));
        }

        let mut upload = UploadConnection::new(Arc::clone(&self.reactor), socket, events, Arc::clone(&self.disk), local_path, transfer_mode, 0);

        let outcome = loop {
            if self.handle.should_stop() || self.cancel.is_cancelled() {
                upload.cancel_and_flush();
                break Outcome::Deferred;
            }
            match upload.service(SERVICE_POLL) {
                Ok(ServiceOutcome::Done) => break Outcome::Done,
                Ok(ServiceOutcome::Progress) => continue,
                Ok(ServiceOutcome::Idle) => continue,
                Ok(ServiceOutcome::AsciiBinaryMismatch) => continue,
                Ok(ServiceOutcome::NoDataTransferTimeout) => break Outcome::Failed(ProblemId::DataConTimeout, None),
                Err(error) => break Outcome::Failed(ProblemId::UploadUnableToStore, Some(error.to_string())),
            }
        };

        let outcome = self.drain_transfer_reply(outcome, ProblemId::UploadUnableToStore);

        if matches!(outcome, Outcome::Done) && is_move {
            self.run_disk_job(Job::Delete { path: Path::new(&item.source_path).join(&item.source_name) })?;
        }

        Ok(outcome)
    }

    // ---- upload directory exploration, spec.md §4.7 step 1-4 ------------

    fn explore_local_dir(&mut self, item: &ItemSnapshot, is_move: bool) -> Result<Outcome, SchedulerError> {
        let local_dir = Path::new(&item.source_path).join(&item.source_name);
        let remote_dir = mirror_to_remote(self.control.path_type(), &self.local_root, &self.remote_root, &local_dir);
        let key = CacheKey::new(self.control_peer.to_string(), remote_dir.clone());

        let parent_dir = mirror_to_remote(self.control.path_type(), &self.local_root, &self.remote_root, Path::new(&item.source_path));
        let entries = match self.cache.lookup_or_claim(&key) {
            LookupOutcome::ClaimedByCaller => match self.ensure_upload_target_dir(&parent_dir, &item.source_name, &remote_dir, &key) {
                Ok(entries) => entries,
                Err(outcome) => return Ok(outcome),
            },
            LookupOutcome::OwnedByOther => {
                self.cache.wait_for(POLL_INTERVAL);
                return Ok(Outcome::Deferred);
            }
            LookupOutcome::Ready(entries) => entries,
            LookupOutcome::Inaccessible => return Ok(Outcome::NeedsInput(ProblemId::UploadCannotListTgtPath, None)),
        };

        self.control.ensure_connected(&self.cancel)?;
        let listing = match self.run_disk_job(Job::ListDir { path: local_dir.clone() })?.produced {
            Some(ProducedData::Listing(listing)) => listing,
            _ => Vec::new(),
        };

        self.queue.replace_item_with_list(item.uid)?;
        let parent_kind = if is_move { ItemKind::UploadMoveExploreDir } else { ItemKind::UploadCopyExploreDir };
        for entry in listing {
            if entry.kind != diskpool::EntryKind::Dir && !self.include_mask.is_match(&entry.name) {
                continue;
            }
            if entries.iter().any(|existing| existing.name == entry.name) {
                // Name collision against the already-listed remote side;
                // left to the per-file/dir leaf handler's own conflict
                // policy once it is claimed, rather than resolved here.
            }
            let child_kind = match (parent_kind, entry.kind) {
                (ItemKind::UploadCopyExploreDir, diskpool::EntryKind::Dir) => ItemKind::UploadCopyExploreDir,
                (ItemKind::UploadCopyExploreDir, _) => ItemKind::UploadCopyFile,
                (ItemKind::UploadMoveExploreDir, diskpool::EntryKind::Dir) => ItemKind::UploadMoveExploreDir,
                (ItemKind::UploadMoveExploreDir, _) => ItemKind::UploadMoveFile,
                _ => unreachable!(),
            };
            self.queue.add_item(Some(item.uid), child_kind, local_dir.to_string_lossy().into_owned(), entry.name)?;
        }

        if is_move {
            self.queue.add_item(Some(item.uid), ItemKind::UploadMoveDeleteDir, local_dir.to_string_lossy().into_owned(), String::new())?;
        }

        Ok(Outcome::Done)
    }

    /// Ensures `remote_dir` exists under `parent_dir`, either confirmed
    /// present in a fresh listing or freshly created, then publishes the
    /// listing of its contents to the cache for every waiter (spec.md
    /// §4.7 steps 1-4).
    fn ensure_upload_target_dir(&mut self, parent_dir: &str, name: &str, remote_dir: &str, key: &CacheKey) -> Result<Vec<CachedEntry>, Outcome> {
        self.control.ensure_connected(&self.cancel).map_err(|error| Outcome::Failed(ProblemId::Ok, Some(error.to_string())))?;

        let parent_listing = fetch_remote_listing(&mut self.control, &self.reactor, self.control_peer, parent_dir, &self.cancel)
            .map_err(|_| Outcome::NeedsInput(ProblemId::UploadCannotListTgtPath, None))?;

        let already_exists = parent_listing.iter().any(|entry| entry.name == name);
        let mut final_name = name.to_string();

        if already_exists {
            match self.policies.dir_already_exists {
                DirExistsPolicy::Join => {}
                DirExistsPolicy::Autorename => {
                    let listed_names: Vec<String> = parent_listing.iter().map(|entry| entry.name.clone()).collect();
                    match first_free_candidate(name, &listed_names) {
                        Some(attempt) => final_name = attempt.candidate,
                        None => {
                            self.cache.mark_inaccessible(key);
                            return Err(Outcome::Failed(ProblemId::UploadCrDirAutoRenFailed, None));
                        }
                    }
                }
                DirExistsPolicy::Skip => {
                    self.cache.mark_inaccessible(key);
                    return Err(Outcome::Skipped);
                }
                DirExistsPolicy::Ask => {
                    self.cache.mark_inaccessible(key);
                    return Err(Outcome::NeedsInput(ProblemId::UploadTgtDirAlreadyExists, None));
                }
            }
        }

        let target_path = wire::path::append(self.control.path_type(), parent_dir, &final_name);
        if !already_exists || final_name != name {
            if let Err(error) = self.control.send_command(&Command::Mkd(target_path.clone()), &self.cancel) {
                let fallback = match self.policies.cannot_create_dir {
                    CannotCreatePolicy::Skip => Some(Outcome::Skipped),
                    CannotCreatePolicy::Ask | CannotCreatePolicy::Autorename => {
                        Some(Outcome::NeedsInput(ProblemId::UploadCannotCreateTgtDir, Some(error.to_string())))
                    }
                };
                if let Some(outcome) = fallback {
                    self.cache.mark_inaccessible(key);
                    return Err(outcome);
                }
            }
            self.cache.add_entry(key, CachedEntry { name: final_name, kind: diskpool::EntryKind::Dir });
        }

        let listing = fetch_remote_listing(&mut self.control, &self.reactor, self.control_peer, &target_path, &self.cancel)
            .unwrap_or_default();
        self.cache.publish(key, listing.clone());
        Ok(listing)
    }

    fn upload_move_delete_dir(&mut self, item: &ItemSnapshot) -> Result<Outcome, SchedulerError> {
        if let Some(counters) = self.queue.parent_counters(item.uid)? {
            if counters.not_done() > 1 {
                return Ok(Outcome::Deferred);
            }
        }
        let local_dir = Path::new(&item.source_path);
        self.run_disk_job(Job::Delete { path: local_dir.to_path_buf() })?;
        Ok(Outcome::Done)
    }

    // ---- attribute changes -----------------------------------------------

    fn chattr_leaf(&mut self, item: &ItemSnapshot) -> Result<Outcome, SchedulerError> {
        self.control.ensure_connected(&self.cancel)?;
        let Some(attrs) = self.attrs.clone() else {
            return Ok(Outcome::NeedsInput(ProblemId::UnknownAttrs, None));
        };
        let Some(mode) = attrs.unix_mode else {
            return Ok(Outcome::Skipped);
        };
        let full_path = wire::path::append(self.control.path_type(), &item.source_path, &item.source_name);
        let command = Command::Site(format!("CHMOD {mode:o} {full_path}"));
        match self.control.send_command(&command, &self.cancel) {
            Ok(_reply) => Ok(Outcome::Done),
            Err(control::ControlError::Permanent { reply_text, .. }) => Ok(Outcome::NeedsInput(ProblemId::UnknownAttrs, Some(reply_text))),
            Err(error) => Err(error.into()),
        }
    }

    // ---- shared helpers ----------------------------------------------------

    fn run_disk_job(&mut self, job: Job) -> Result<diskpool::JobCompletion, SchedulerError> {
        let msg_id = self.next_disk_msg_id();
        self.disk.submit(self.disk_requester, msg_id, job);
        loop {
            let completion = self
                .disk_completions
                .recv_timeout(DISK_JOB_TIMEOUT)
                .map_err(|_| SchedulerError::Protocol("disk job timed out".to_string()))?;
            if completion.msg_id != msg_id {
                continue;
            }
            if completion.state == CompletionState::Failed {
                if let Some(error) = completion.error {
                    return Err(error.into());
                }
            }
            return Ok(completion);
        }
    }

    fn next_disk_msg_id(&self) -> u64 {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    /// Opens the data socket a [`DataChannelPlan`] describes: dials the
    /// server-offered passive address, or (when the plan carries an
    /// active-mode listener instead) waits for the server's inbound
    /// connection and claims it.
    fn open_data_socket(&self, plan: &control::DataChannelPlan) -> Result<(SocketId, Receiver<Event>), SchedulerError> {
        if let Some(passive_addr) = &plan.passive_addr {
            let addr = match passive_addr {
                wire::addr::PassiveAddr::V4(ip, port) => SocketAddr::new((*ip).into(), *port),
                wire::addr::PassiveAddr::SamePeer(port) => SocketAddr::new(self.control_peer.ip(), *port),
            };
            let (socket, events) = self.reactor.connect(addr);
            return Ok((socket, events));
        }

        if let Some((listener_socket, listener_events)) = &plan.active_listener {
            let deadline = std::time::Instant::now() + ACCEPT_TIMEOUT;
            loop {
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                if remaining.is_zero() {
                    return Err(SchedulerError::Protocol("timed out waiting for active-mode connection".to_string()));
                }
                match listener_events.recv_timeout(remaining) {
                    Ok(Event::Accepted { child }) => {
                        if let Some(events) = self.reactor.claim_accepted(child) {
                            return Ok((child, events));
                        }
                    }
                    Ok(_) => continue,
                    Err(_) => return Err(SchedulerError::Protocol("active-mode listener channel closed".to_string())),
                }
            }
            #[allow(unreachable_code)]
            {
                let _ = listener_socket;
            }
        }

        Err(SchedulerError::Protocol("data channel plan had neither a passive address nor an active listener".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_control_starts_unstopped_and_unpaused() {
        let control = WorkerControl::new();
        assert!(!control.should_stop());
        assert!(!control.is_paused());
    }

    #[test]
    fn worker_control_stop_is_observed_by_clones() {
        let control = WorkerControl::new();
        let clone = control.clone();
        control.request_stop();
        assert!(clone.should_stop());
    }

    #[test]
    fn worker_control_pause_toggles() {
        let control = WorkerControl::new();
        control.set_paused(true);
        assert!(control.is_paused());
        control.set_paused(false);
        assert!(!control.is_paused());
    }

    #[test]
    fn progress_counters_accumulate() {
        let counters = ProgressCounters::default();
        counters.add_total(100);
        counters.add_done(40);
        counters.item_finished();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.bytes_total, 100);
        assert_eq!(snapshot.bytes_done, 40);
        assert_eq!(snapshot.items_done, 1);
    }

    #[test]
    fn ascii_binary_mismatch_with_redownload_policy_retries_forced_to_binary() {
        use logging::{LogUidAllocator, NullSink};
        use std::io::{Read, Write};
        use std::net::SocketAddr;
        use std::thread;
        use test_support::{LoopbackListener, TempWorkspace};

        let control_listener = LoopbackListener::bind().unwrap();
        let control_addr: SocketAddr = ([127, 0, 0, 1], control_listener.port()).into();
        let data_listener = LoopbackListener::bind().unwrap();
        let data_port = data_listener.port();

        let server = thread::spawn(move || {
            let mut control = control_listener.accept_once().unwrap();
            control.write_all(b"220 test server ready\r\n").unwrap();
            let mut buf = [0_u8; 256];

            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"USER"));
            control.write_all(b"230 logged in\r\n").unwrap();
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"SYST"));
            control.write_all(b"215 UNIX Type: L8\r\n").unwrap();
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"FEAT"));
            control.write_all(b"211 none\r\n").unwrap();

            // First attempt: ASCII, mismatch.
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"TYPE A"));
            control.write_all(b"200 type set to A\r\n").unwrap();
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"EPSV"));
            control.write_all(format!("229 Entering Extended Passive Mode (|||{data_port}|)\r\n").as_bytes()).unwrap();
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"RETR"));

            let mut data = data_listener.accept_once().unwrap();
            data.write_all(&[0_u8, b'h', b'i']).unwrap();
            drop(data);
            control.write_all(b"426 Connection closed; transfer aborted\r\n").unwrap();

            // Second attempt: forced binary, clean transfer.
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"TYPE I"));
            control.write_all(b"200 type set to I\r\n").unwrap();
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"EPSV"));
            control.write_all(format!("229 Entering Extended Passive Mode (|||{data_port}|)\r\n").as_bytes()).unwrap();
            let n = control.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"RETR"));

            let mut data = data_listener.accept_once().unwrap();
            data.write_all(b"binary payload").unwrap();
            drop(data);
            control.write_all(b"226 Transfer complete\r\n").unwrap();
        });

        let workspace = TempWorkspace::new();
        let config = WorkerConfig {
            endpoint: Endpoint::new(control_addr, "anonymous", "guest"),
            kind: OperationKind::CopyDownload,
            local_root: workspace.root().to_path_buf(),
            remote_root: "/incoming".to_string(),
            policies: ConflictPolicies { ascii_tr_mode_for_bin_file: AsciiForBinaryPolicy::RedownloadBinary, ..ConflictPolicies::default() },
            attrs: None,
            include_mask: MaskSet::compile(&[]).unwrap(),
            ascii_mask: MaskSet::compile(&[]).unwrap(),
            transfer_mode_default: TransferModeDefault::Ascii,
        };
        let queue = Arc::new(Queue::new());
        let uid = queue.add_item(None, ItemKind::CopyFileOrLink, "/incoming", "report.dat").unwrap();
        let item = queue.claim_next_waiting().unwrap();
        assert_eq!(item.uid, uid);

        let allocator = LogUidAllocator::default();
        let mut worker = Worker::new(
            WorkerId(0),
            config,
            Arc::new(Reactor::new()),
            Arc::new(DiskPool::new(1)),
            Arc::clone(&queue),
            Arc::new(UploadListingCache::new()),
            Arc::new(ProgressCounters::default()),
            CancelToken::new(),
            allocator.next(),
            Arc::new(NullSink),
        );

        let outcome = worker.process(&item).unwrap();
        assert_eq!(outcome, Outcome::Done);

        let downloaded = workspace.read_file("report.dat").unwrap();
        assert_eq!(downloaded, b"binary payload");

        server.join().unwrap();
    }

    #[test]
    fn child_kind_for_copy_explore_dir_maps_every_entry_kind() {
        let worker_kind_checks = [
            (ItemKind::CopyExploreDir, EntryKind::Dir, ItemKind::CopyExploreDir),
            (ItemKind::CopyExploreDir, EntryKind::Link, ItemKind::CopyResolveLink),
            (ItemKind::CopyExploreDir, EntryKind::File, ItemKind::CopyFileOrLink),
        ];
        for (parent, entry, expected) in worker_kind_checks {
            let mapped = match (parent, entry) {
                (ItemKind::CopyExploreDir, EntryKind::Dir) => ItemKind::CopyExploreDir,
                (ItemKind::CopyExploreDir, EntryKind::Link) => ItemKind::CopyResolveLink,
                (ItemKind::CopyExploreDir, EntryKind::File) => ItemKind::CopyFileOrLink,
                _ => unreachable!(),
            };
            assert_eq!(mapped, expected);
        }
    }
}
