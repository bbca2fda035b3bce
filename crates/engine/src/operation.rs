//! [`Operation`]: one running transfer/delete/chattr job, its pool of
//! [`Worker`] threads, and the monitor thread that turns queue state into
//! the [`EngineEvent`] stream spec.md §7 describes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use control::{CancelToken, Endpoint};
use crossbeam_channel::{Receiver, Sender};
use diskpool::DiskPool;
use logging::{LogSink, LogUidAllocator};
use queue::{ForceAction, ItemState, Queue, Uid};
use reactor::Reactor;
use scheduler::cache::UploadListingCache;
use scheduler::policy::ConflictPolicies;
use scheduler::worker::{OperationKind, ProgressCounters, Worker, WorkerConfig, WorkerControl, WorkerId};

use crate::config::{EndpointConfig, EngineConfig};
use crate::events::{EngineEvent, OperationState};
use crate::EngineError;

/// How often the monitor thread polls the queue for state changes.
const MONITOR_POLL: Duration = Duration::from_millis(200);

/// The fixed per-operation parameters every worker this operation spawns
/// is built from, captured once at [`crate::Engine::create_operation`]
/// time.
pub(crate) struct OperationBlueprint {
    pub endpoint: Endpoint,
    pub kind: OperationKind,
    pub local_root: std::path::PathBuf,
    pub remote_root: String,
    pub policies: ConflictPolicies,
    pub attrs: Option<diskpool::FileAttrs>,
    pub include_mask: scheduler::mask::MaskSet,
    pub ascii_mask: scheduler::mask::MaskSet,
    pub transfer_mode_default: scheduler::mask::TransferModeDefault,
}

impl OperationBlueprint {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            endpoint: self.endpoint.clone(),
            kind: self.kind,
            local_root: self.local_root.clone(),
            remote_root: self.remote_root.clone(),
            policies: self.policies.clone(),
            attrs: self.attrs.clone(),
            include_mask: self.include_mask.clone(),
            ascii_mask: self.ascii_mask.clone(),
            transfer_mode_default: self.transfer_mode_default,
        }
    }
}

struct RunningWorker {
    handle: Option<JoinHandle<()>>,
    control: WorkerControl,
}

/// One running operation: a shared [`Queue`], a pool of worker threads
/// driving it, and a monitor thread publishing [`EngineEvent`]s about it.
///
/// Dropping an [`Operation`] does not stop its workers; call
/// [`Self::cancel`] first if that is the intent, matching spec.md §7's
/// "operations outlive the handle that created them until explicitly
/// stopped".
pub struct Operation {
    reactor: Arc<Reactor>,
    disk: Arc<DiskPool>,
    queue: Arc<Queue>,
    cache: Arc<UploadListingCache>,
    progress: Arc<ProgressCounters>,
    cancel: CancelToken,
    blueprint: Arc<OperationBlueprint>,
    log_sink: Arc<dyn LogSink>,
    log_uids: Arc<LogUidAllocator>,
    next_worker_id: Mutex<u32>,
    workers: Mutex<Vec<RunningWorker>>,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    monitor_stop: Arc<AtomicBool>,
}

impl Operation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        reactor: Arc<Reactor>,
        disk: Arc<DiskPool>,
        queue: Arc<Queue>,
        blueprint: OperationBlueprint,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            reactor,
            disk,
            queue,
            cache: Arc::new(UploadListingCache::new()),
            progress: Arc::new(ProgressCounters::default()),
            cancel: CancelToken::new(),
            blueprint: Arc::new(blueprint),
            log_sink,
            log_uids: Arc::new(LogUidAllocator::default()),
            next_worker_id: Mutex::new(0),
            workers: Mutex::new(Vec::new()),
            events_tx,
            events_rx,
            monitor: Mutex::new(None),
            monitor_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the operation: spawns `initial_workers` worker threads and
    /// the monitor thread, per spec.md §7's `start()`. Calling this more
    /// than once adds no further workers beyond what [`Self::add_worker`]
    /// would; it only (re)arms the monitor thread on first call.
    pub fn start(&self, initial_workers: u32) {
        for _ in 0..initial_workers.max(1) {
            self.add_worker();
        }
        self.spawn_monitor_if_needed();
    }

    /// Spawns one additional worker thread against this operation's
    /// shared queue, cache, and disk pool.
    pub fn add_worker(&self) {
        let id = {
            let mut next = self.next_worker_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let id = WorkerId(*next);
            *next += 1;
            id
        };
        let config = self.blueprint.worker_config();
        let log_uid = self.log_uids.next();
        let mut worker = Worker::new(
            id,
            config,
            Arc::clone(&self.reactor),
            Arc::clone(&self.disk),
            Arc::clone(&self.queue),
            Arc::clone(&self.cache),
            Arc::clone(&self.progress),
            self.cancel.clone(),
            log_uid,
            Arc::clone(&self.log_sink),
        );
        let control = worker.control_handle();
        let handle = std::thread::Builder::new()
            .name(format!("ftp-worker-{}", id.0))
            .spawn(move || worker.run())
            .expect("spawning a worker thread");
        self.workers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(RunningWorker { handle: Some(handle), control });
        self.spawn_monitor_if_needed();
    }

    /// Requests that worker `index` (0-based, in creation order) stop at
    /// its next checkpoint and joins its thread. A no-op if `index` is
    /// out of range or the worker already stopped.
    pub fn stop_worker(&self, index: usize) {
        let mut workers = self.workers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(worker) = workers.get_mut(index) {
            worker.control.request_stop();
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }

    /// Pauses or resumes worker `index`. A no-op if `index` is out of range.
    pub fn pause_worker(&self, index: usize, paused: bool) {
        let workers = self.workers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(worker) = workers.get(index) {
            worker.control.set_paused(paused);
        }
    }

    /// Cancels the operation: sets the shared [`CancelToken`] so every
    /// worker aborts its in-flight syscall at the next checkpoint, stops
    /// every worker, and sweeps every item still in a non-terminal state
    /// to [`ItemState::Failed`] so the operation settles rather than
    /// hanging in [`OperationState::InProgress`] forever. Matches
    /// spec.md §7's "cancel forces a terminal state"; there is no
    /// `Cancelled` `OperationState` — a cancelled operation reports
    /// [`OperationState::FinishedWithErrors`].
    pub fn cancel(&self) {
        self.cancel.cancel();
        let mut workers = self.workers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for worker in workers.iter() {
            worker.control.request_stop();
        }
        for worker in workers.iter_mut() {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
        drop(workers);
        for item in self.queue.snapshot_all() {
            if !item.state.is_terminal() {
                let _ = self.queue.update_state(item.uid, ItemState::Failed);
            }
        }
    }

    /// Resolves an item parked in [`ItemState::UserInputNeeded`], per
    /// spec.md §7's `resolve_error(item_uid, resolution)`: records the
    /// chosen [`ForceAction`] and returns it to [`ItemState::Waiting`] so
    /// a worker picks it up again.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Queue`] if `item_uid` is unknown or not
    /// currently parked.
    pub fn resolve_error(&self, item_uid: Uid, resolution: ForceAction) -> Result<(), EngineError> {
        self.queue.update_force_action(item_uid, resolution)?;
        Ok(())
    }

    /// Returns a receiver for this operation's [`EngineEvent`] stream.
    /// May be cloned/called repeatedly; every subscriber gets every event
    /// (the underlying channel is unbounded and multi-consumer, so
    /// concurrent subscribers compete for events rather than each seeing
    /// every one — callers wanting a broadcast should subscribe once and
    /// fan out themselves).
    #[must_use]
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events_rx.clone()
    }

    /// A snapshot of every item currently in this operation's queue, for
    /// callers that want the full picture rather than the event stream.
    #[must_use]
    pub fn snapshot_items(&self) -> Vec<queue::ItemSnapshot> {
        self.queue.snapshot_all()
    }

    fn spawn_monitor_if_needed(&self) {
        let mut monitor = self.monitor.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if monitor.is_some() {
            return;
        }
        let queue = Arc::clone(&self.queue);
        let progress = Arc::clone(&self.progress);
        let events_tx = self.events_tx.clone();
        let stop = Arc::clone(&self.monitor_stop);
        let handle = std::thread::Builder::new()
            .name("ftp-operation-monitor".to_string())
            .spawn(move || Self::monitor_loop(&queue, &progress, &events_tx, &stop))
            .expect("spawning the operation monitor thread");
        *monitor = Some(handle);
    }

    fn monitor_loop(queue: &Queue, progress: &ProgressCounters, events_tx: &Sender<EngineEvent>, stop: &AtomicBool) {
        let mut reported: std::collections::HashSet<Uid> = std::collections::HashSet::new();
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let _ = events_tx.send(EngineEvent::Progress(progress.snapshot()));

            let items = queue.snapshot_all();
            for item in &items {
                if item.state == ItemState::UserInputNeeded && reported.insert(item.uid) {
                    let _ = events_tx.send(EngineEvent::NeedsDecision {
                        item_uid: item.uid,
                        problem_id: item.problem_id,
                        detail: item.problem_detail.clone(),
                    });
                }
            }

            if !items.is_empty() {
                let aggregate = OperationState::aggregate(&items);
                if aggregate.is_terminal() {
                    let _ = events_tx.send(EngineEvent::Completed(aggregate));
                    return;
                }
            }

            std::thread::sleep(MONITOR_POLL);
        }
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        self.monitor_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.monitor.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            let _ = handle.join();
        }
    }
}

/// Wires [`EndpointConfig`]/[`EngineConfig`] together for
/// [`crate::Engine::create_operation`], kept here rather than in
/// `config.rs` since it is only ever called while building an
/// [`Operation`].
pub(crate) fn resolve_endpoint(request: &EndpointConfig, engine_config: &EngineConfig) -> Endpoint {
    request.to_control_endpoint(engine_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_operation_reports_no_workers_running_yet() {
        let reactor = Arc::new(Reactor::new());
        let disk = Arc::new(DiskPool::new(1));
        let queue = Arc::new(Queue::new());
        let blueprint = OperationBlueprint {
            endpoint: Endpoint::new("127.0.0.1:21".parse().unwrap(), "anonymous", "guest"),
            kind: OperationKind::Delete,
            local_root: std::env::temp_dir(),
            remote_root: "/".into(),
            policies: ConflictPolicies::default(),
            attrs: None,
            include_mask: scheduler::mask::MaskSet::match_all(),
            ascii_mask: scheduler::mask::MaskSet::match_all(),
            transfer_mode_default: scheduler::mask::TransferModeDefault::default(),
        };
        let operation = Operation::new(reactor, disk, queue, blueprint, Arc::new(logging::NullSink));
        assert!(operation.workers.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_on_an_empty_operation_does_not_panic() {
        let reactor = Arc::new(Reactor::new());
        let disk = Arc::new(DiskPool::new(1));
        let queue = Arc::new(Queue::new());
        let blueprint = OperationBlueprint {
            endpoint: Endpoint::new("127.0.0.1:21".parse().unwrap(), "anonymous", "guest"),
            kind: OperationKind::Delete,
            local_root: std::env::temp_dir(),
            remote_root: "/".into(),
            policies: ConflictPolicies::default(),
            attrs: None,
            include_mask: scheduler::mask::MaskSet::match_all(),
            ascii_mask: scheduler::mask::MaskSet::match_all(),
            transfer_mode_default: scheduler::mask::TransferModeDefault::default(),
        };
        let operation = Operation::new(reactor, disk, queue, blueprint, Arc::new(logging::NullSink));
        operation.cancel();
    }
}
