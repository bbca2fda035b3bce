//! The fixed-size disk worker pool: a FIFO job queue drained by blocking
//! filesystem threads, with completions routed back per registered caller.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};
use dashmap::DashMap;

use crate::error::DiskError;
use crate::handle::{FileHandleAllocator, FileHandleId};
use crate::job::{CompletionState, DirEntry, EntryKind, Job, ProducedData, WriteConflictPolicy};

/// The depth of the shared job queue before [`DiskPool::submit`] blocks the
/// caller. Bounded so a runaway producer applies backpressure rather than
/// growing memory without limit.
const JOB_QUEUE_DEPTH: usize = 256;

/// The identifier a caller registers under to receive [`JobCompletion`]s,
/// mirroring `reactor::SocketId`'s per-registration dispatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequesterId(u64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requester#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RequesterIdAllocator {
    next: AtomicU64,
}

impl RequesterIdAllocator {
    fn next(&self) -> RequesterId {
        RequesterId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// The completion of one [`Job`], delivered to the channel the submitting
/// caller registered for, tagged with the `msg_id` it submitted with so it
/// can match the reply to the right in-flight request (spec.md §4.3's
/// "completion port: caller's UID + message id").
#[derive(Debug)]
pub struct JobCompletion {
    /// The message id the caller supplied at submission time.
    pub msg_id: u64,
    /// Whether the job succeeded, was skipped, or failed.
    pub state: CompletionState,
    /// The failure, present when `state` is [`CompletionState::Failed`].
    pub error: Option<DiskError>,
    /// Any data the job produced.
    pub produced: Option<ProducedData>,
}

struct Request {
    requester: RequesterId,
    msg_id: u64,
    job: Job,
}

/// Returns the default worker count: the available parallelism, clamped to
/// spec.md §4.3's suggested `2..=4` range.
#[must_use]
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(2, |n| n.get().clamp(2, 4))
}

/// The disk I/O worker pool. Owns no caller state beyond open file handles;
/// all routing is keyed by [`RequesterId`].
pub struct DiskPool {
    jobs: Sender<Request>,
    completions: Arc<DashMap<RequesterId, Sender<JobCompletion>>>,
    requester_ids: Arc<RequesterIdAllocator>,
    handles: Arc<DashMap<FileHandleId, Mutex<File>>>,
    handle_ids: Arc<FileHandleAllocator>,
}

impl DiskPool {
    /// Spawns `worker_count` threads draining a shared job queue.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let (job_tx, job_rx): (Sender<Request>, Receiver<Request>) = bounded(JOB_QUEUE_DEPTH);
        let completions: Arc<DashMap<RequesterId, Sender<JobCompletion>>> = Arc::new(DashMap::new());
        let handles: Arc<DashMap<FileHandleId, Mutex<File>>> = Arc::new(DashMap::new());

        let handle_ids = Arc::new(FileHandleAllocator::default());

        for index in 0..worker_count.max(1) {
            let job_rx = job_rx.clone();
            let completions = Arc::clone(&completions);
            let handles = Arc::clone(&handles);
            let handle_ids = Arc::clone(&handle_ids);
            std::thread::Builder::new()
                .name(format!("diskpool-worker-{index}"))
                .spawn(move || worker_loop(&job_rx, &completions, &handles, &handle_ids))
                .expect("failed to spawn disk worker thread");
        }

        Self {
            jobs: job_tx,
            completions,
            requester_ids: Arc::new(RequesterIdAllocator::default()),
            handles,
            handle_ids,
        }
    }

    /// Registers a new caller, returning the id to submit jobs under and
    /// the channel its completions arrive on.
    #[must_use]
    pub fn register(&self) -> (RequesterId, Receiver<JobCompletion>) {
        let id = self.requester_ids.next();
        let (tx, rx) = crossbeam_channel::unbounded();
        self.completions.insert(id, tx);
        (id, rx)
    }

    /// Deregisters `requester`; its completion channel is dropped and any
    /// jobs already queued under it complete silently (the completion send
    /// fails and is discarded).
    pub fn deregister(&self, requester: RequesterId) {
        self.completions.remove(&requester);
    }

    /// Queues `job` for execution, tagged with `msg_id` for the caller to
    /// match against the eventual [`JobCompletion`].
    pub fn submit(&self, requester: RequesterId, msg_id: u64, job: Job) {
        let _ = self.jobs.send(Request { requester, msg_id, job });
    }

    /// Allocates a handle id ahead of an `OpenForWrite`/`AppendForResume`
    /// submission. Exposed so callers can correlate a handle with the item
    /// it belongs to before the open actually completes.
    #[must_use]
    pub fn allocate_handle(&self) -> FileHandleId {
        self.handle_ids.next()
    }
}

fn worker_loop(
    jobs: &Receiver<Request>,
    completions: &DashMap<RequesterId, Sender<JobCompletion>>,
    handles: &DashMap<FileHandleId, Mutex<File>>,
    handle_ids: &FileHandleAllocator,
) {
    while let Ok(request) = jobs.recv() {
        let Request { requester, msg_id, job } = request;
        let completion = execute(job, handles, handle_ids);
        if let Some(sink) = completions.get(&requester) {
            let _ = sink.send(JobCompletion { msg_id, state: completion.0, error: completion.1, produced: completion.2 });
        }
    }
}

type ExecResult = (CompletionState, Option<DiskError>, Option<ProducedData>);

fn execute(job: Job, handles: &DashMap<FileHandleId, Mutex<File>>, handle_ids: &FileHandleAllocator) -> ExecResult {
    match job {
        Job::ListDir { path } => list_dir(&path),
        Job::OpenForWrite { path, policy, mode: _ } => open_for_write(&path, policy, handles, handle_ids),
        Job::AppendForResume { path, offset } => append_for_resume(&path, offset, handles, handle_ids),
        Job::Write { handle, data } => write_chunk(handle, &data, handles),
        Job::TestResumeFingerprint { path, expected_size } => test_resume_fingerprint(&path, expected_size),
        Job::CloseFile { handle } => close_file(handle, handles),
        Job::Delete { path } => delete(&path),
        Job::SetAttrs { path, attrs } => set_attrs(&path, &attrs),
        Job::CreateDir { path } => create_dir(&path),
        Job::ReadForUpload { path, offset, max_len } => read_for_upload(&path, offset, max_len),
    }
}

fn list_dir(path: &Path) -> ExecResult {
    let read_dir = match fs::read_dir(path) {
        Ok(read_dir) => read_dir,
        Err(source) => return err(DiskError::from_io(path, source)),
    };

    let mut entries = Vec::new();
    for entry in read_dir {
        let Ok(entry) = entry else { continue };
        let Ok(metadata) = entry.metadata() else { continue };
        let kind = if metadata.is_dir() {
            EntryKind::Dir
        } else if metadata.file_type().is_symlink() {
            EntryKind::Link
        } else {
            EntryKind::File
        };
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
            size: if metadata.is_file() { Some(metadata.len()) } else { None },
        });
    }

    (CompletionState::Ok, None, Some(ProducedData::Listing(entries)))
}

fn open_for_write(
    path: &Path,
    policy: WriteConflictPolicy,
    handles: &DashMap<FileHandleId, Mutex<File>>,
    handle_ids: &FileHandleAllocator,
) -> ExecResult {
    let exists = path.exists();
    if exists && matches!(policy, WriteConflictPolicy::Skip) {
        return (CompletionState::Skipped, None, None);
    }
    if exists && matches!(policy, WriteConflictPolicy::Ask) {
        return err(DiskError::AlreadyExists { path: path.to_path_buf() });
    }

    let target = if exists && matches!(policy, WriteConflictPolicy::Autorename) {
        match first_free_autorenamed(path) {
            Some(renamed) => renamed,
            None => return err(DiskError::AlreadyExists { path: path.to_path_buf() }),
        }
    } else {
        path.to_path_buf()
    };

    let file = OpenOptions::new().write(true).create(true).truncate(true).open(&target);
    match file {
        Ok(file) => {
            let id = allocate_and_store(file, handles, handle_ids);
            (CompletionState::Ok, None, Some(ProducedData::Handle(id)))
        }
        Err(source) => err(DiskError::from_io(&target, source)),
    }
}

fn first_free_autorenamed(path: &Path) -> Option<std::path::PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let extension = path.extension().map(|ext| ext.to_string_lossy().into_owned());

    for suffix in 1..=9999 {
        let candidate_name = match &extension {
            Some(ext) => format!("{stem}({suffix}).{ext}"),
            None => format!("{stem}({suffix})"),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn append_for_resume(
    path: &Path,
    offset: u64,
    handles: &DashMap<FileHandleId, Mutex<File>>,
    handle_ids: &FileHandleAllocator,
) -> ExecResult {
    let file = OpenOptions::new().write(true).create(true).open(path);
    let mut file = match file {
        Ok(file) => file,
        Err(source) => return err(DiskError::from_io(path, source)),
    };

    if let Err(source) = file.seek(SeekFrom::Start(offset)) {
        return err(DiskError::from_io(path, source));
    }

    let id = allocate_and_store(file, handles, handle_ids);
    (CompletionState::Ok, None, Some(ProducedData::Handle(id)))
}

fn allocate_and_store(file: File, handles: &DashMap<FileHandleId, Mutex<File>>, handle_ids: &FileHandleAllocator) -> FileHandleId {
    let id = handle_ids.next();
    handles.insert(id, Mutex::new(file));
    id
}

fn write_chunk(handle: FileHandleId, data: &[u8], handles: &DashMap<FileHandleId, Mutex<File>>) -> ExecResult {
    let Some(entry) = handles.get(&handle) else {
        return err(DiskError::UnknownHandle(handle));
    };
    let mut file = entry.lock().expect("file mutex poisoned");
    match file.write_all(data) {
        Ok(()) => (CompletionState::Ok, None, None),
        Err(source) => {
            let kind = if source.kind() == std::io::ErrorKind::StorageFull {
                DiskError::DiskFull { path: std::path::PathBuf::new() }
            } else {
                DiskError::Io { path: std::path::PathBuf::new(), source }
            };
            err(kind)
        }
    }
}

fn test_resume_fingerprint(path: &Path, expected_size: u64) -> ExecResult {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.len() == expected_size {
                (CompletionState::Ok, None, Some(ProducedData::Size(metadata.len())))
            } else {
                err(DiskError::ResumeMismatch { path: path.to_path_buf(), local_size: metadata.len(), expected_size })
            }
        }
        Err(source) => err(DiskError::from_io(path, source)),
    }
}

fn close_file(handle: FileHandleId, handles: &DashMap<FileHandleId, Mutex<File>>) -> ExecResult {
    match handles.remove(&handle) {
        Some((_, file)) => {
            let mut file = file.into_inner().expect("file mutex poisoned");
            let _ = file.flush();
            (CompletionState::Ok, None, None)
        }
        None => err(DiskError::UnknownHandle(handle)),
    }
}

fn delete(path: &Path) -> ExecResult {
    let result = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    match result {
        Ok(()) => (CompletionState::Ok, None, None),
        Err(source) => err(DiskError::from_io(path, source)),
    }
}

fn set_attrs(path: &Path, attrs: &crate::job::FileAttrs) -> ExecResult {
    #[cfg(unix)]
    if let Some(mode) = attrs.unix_mode {
        use std::os::unix::fs::PermissionsExt;
        if let Err(source) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
            return err(DiskError::from_io(path, source));
        }
    }

    if let Some(modified) = attrs.modified {
        if let Err(source) = set_file_mtime(path, modified) {
            return err(DiskError::from_io(path, source));
        }
    }

    (CompletionState::Ok, None, None)
}

fn set_file_mtime(path: &Path, modified: std::time::SystemTime) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(modified)
}

fn create_dir(path: &Path) -> ExecResult {
    match fs::create_dir_all(path) {
        Ok(()) => (CompletionState::Ok, None, None),
        Err(source) => err(DiskError::from_io(path, source)),
    }
}

fn read_for_upload(path: &Path, offset: u64, max_len: usize) -> ExecResult {
    let file = File::open(path);
    let mut file = match file {
        Ok(file) => file,
        Err(source) => return err(DiskError::from_io(path, source)),
    };

    if let Err(source) = file.seek(SeekFrom::Start(offset)) {
        return err(DiskError::from_io(path, source));
    }

    let mut buf = vec![0u8; max_len];
    let mut total = 0usize;
    loop {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if total == buf.len() {
                    break;
                }
            }
            Err(source) => return err(DiskError::from_io(path, source)),
        }
    }
    buf.truncate(total);
    (CompletionState::Ok, None, Some(ProducedData::Bytes(buf)))
}

fn err(error: DiskError) -> ExecResult {
    (CompletionState::Failed, Some(error), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use test_support::TempWorkspace;

    #[test]
    fn list_dir_reports_files_and_subdirs() {
        let workspace = TempWorkspace::new();
        workspace.write_file("a.txt", b"hi");
        workspace.make_dir("sub");

        let pool = DiskPool::new(2);
        let (requester, rx) = pool.register();
        pool.submit(requester, 1, Job::ListDir { path: workspace.root().to_path_buf() });

        let completion = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(completion.state, CompletionState::Ok);
        let Some(ProducedData::Listing(entries)) = completion.produced else { panic!("expected listing") };
        assert!(entries.iter().any(|e| e.name == "a.txt" && e.kind == EntryKind::File));
        assert!(entries.iter().any(|e| e.name == "sub" && e.kind == EntryKind::Dir));
    }

    #[test]
    fn open_for_write_then_write_then_close_round_trips() {
        let workspace = TempWorkspace::new();
        let target = workspace.root().join("out.bin");

        let pool = DiskPool::new(2);
        let (requester, rx) = pool.register();

        pool.submit(
            requester,
            1,
            Job::OpenForWrite { path: target.clone(), policy: WriteConflictPolicy::Overwrite, mode: wire::TransferMode::Binary },
        );
        let opened = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let Some(ProducedData::Handle(handle)) = opened.produced else { panic!("expected handle") };

        pool.submit(requester, 2, Job::Write { handle, data: b"payload".to_vec() });
        let write_done = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(write_done.state, CompletionState::Ok);

        pool.submit(requester, 3, Job::CloseFile { handle });
        let closed = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(closed.state, CompletionState::Ok);

        assert_eq!(fs::read(&target).unwrap(), b"payload");
    }

    #[test]
    fn open_for_write_skip_policy_leaves_existing_file_untouched() {
        let workspace = TempWorkspace::new();
        workspace.write_file("existing.txt", b"original");
        let target = workspace.root().join("existing.txt");

        let pool = DiskPool::new(2);
        let (requester, rx) = pool.register();
        pool.submit(
            requester,
            1,
            Job::OpenForWrite { path: target.clone(), policy: WriteConflictPolicy::Skip, mode: wire::TransferMode::Binary },
        );
        let completion = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(completion.state, CompletionState::Skipped);
        assert_eq!(fs::read(&target).unwrap(), b"original");
    }

    #[test]
    fn open_for_write_autorename_picks_a_free_name() {
        let workspace = TempWorkspace::new();
        workspace.write_file("dup.txt", b"first");
        let target = workspace.root().join("dup.txt");

        let pool = DiskPool::new(2);
        let (requester, rx) = pool.register();
        pool.submit(
            requester,
            1,
            Job::OpenForWrite { path: target, policy: WriteConflictPolicy::Autorename, mode: wire::TransferMode::Binary },
        );
        let completion = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(completion.state, CompletionState::Ok);
        assert!(workspace.root().join("dup(1).txt").exists());
    }

    #[test]
    fn resume_fingerprint_mismatch_is_reported() {
        let workspace = TempWorkspace::new();
        workspace.write_file("partial.bin", b"1234");
        let target = workspace.root().join("partial.bin");

        let pool = DiskPool::new(2);
        let (requester, rx) = pool.register();
        pool.submit(requester, 1, Job::TestResumeFingerprint { path: target, expected_size: 999 });
        let completion = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(completion.state, CompletionState::Failed);
        assert!(matches!(completion.error, Some(DiskError::ResumeMismatch { .. })));
    }

    #[test]
    fn read_for_upload_returns_requested_slice() {
        let workspace = TempWorkspace::new();
        workspace.write_file("src.bin", b"0123456789");
        let target = workspace.root().join("src.bin");

        let pool = DiskPool::new(2);
        let (requester, rx) = pool.register();
        pool.submit(requester, 1, Job::ReadForUpload { path: target, offset: 3, max_len: 4 });
        let completion = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(completion.state, CompletionState::Ok);
        let Some(ProducedData::Bytes(bytes)) = completion.produced else { panic!("expected bytes") };
        assert_eq!(bytes, b"3456");
    }

    #[test]
    fn default_worker_count_is_within_spec_range() {
        let count = default_worker_count();
        assert!((2..=4).contains(&count));
    }

    #[test]
    fn deregistered_requester_does_not_block_worker_pool() {
        let workspace = TempWorkspace::new();
        let pool = DiskPool::new(2);
        let (requester, _rx) = pool.register();
        pool.deregister(requester);
        pool.submit(requester, 1, Job::CreateDir { path: workspace.root().join("orphaned") });
        // Draining a second, live requester proves the worker loop kept going.
        let (second, rx2) = pool.register();
        pool.submit(second, 1, Job::CreateDir { path: workspace.root().join("alive") });
        let completion = rx2.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(completion.state, CompletionState::Ok);
    }
}
