//! The download pipeline: `socket -> decrypt? -> decompress(MODE-Z)? ->
//! ascii-normalize? -> flush-buffer -> disk`.
//!
//! TLS and MODE-Z are not reimplemented here: the [`reactor::Reactor`]
//! socket handed to [`DownloadConnection::new`] already has the
//! appropriate [`reactor::Transport`] stack layered onto it by whoever
//! negotiated the data channel, so [`reactor::Event::BytesRead`] carries
//! plaintext, decompressed bytes. This pipeline only owns the
//! ascii-normalize and flush-buffer stages, plus the two timers spec.md
//! §5 assigns to a download (the flush timer and the no-data-transfer
//! deadline).

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use diskpool::{CompletionState, DiskPool, FileHandleId, Job, ProducedData, RequesterId, WriteConflictPolicy};
use ratectl::SpeedMeter;
use reactor::{Event, Reactor, SocketId, TimerId};
use wire::TransferMode;

use crate::ascii::{is_ascii_tr_for_bin_file_problem, wire_to_local};
use crate::error::DataConnError;
use crate::flush::{FlushBuffer, FLUSH_BUFFER_SIZE, FLUSH_TIMEOUT, NO_DATA_TRANSFER_TIMEOUT};
use crate::ServiceOutcome;

static TIMER_IDS: AtomicU64 = AtomicU64::new(1);

fn next_timer_id() -> TimerId {
    TimerId(TIMER_IDS.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Opening,
    Transferring,
    ClosingFile,
    Done,
}

/// A transient socket receiving one file (or one `LIST`/`NLST`/`MLSD`
/// listing) from the server, per spec.md §4.5.1.
pub struct DownloadConnection {
    reactor: Arc<Reactor>,
    socket: SocketId,
    socket_events: Receiver<Event>,
    disk: Arc<DiskPool>,
    requester: RequesterId,
    disk_completions: Receiver<diskpool::JobCompletion>,
    target_path: PathBuf,
    mode: TransferMode,
    expected_size: Option<u64>,
    resume_offset: Option<u64>,
    phase: Phase,
    handle: Option<FileHandleId>,
    buffer: FlushBuffer,
    direct_flush: bool,
    write_in_flight: bool,
    bytes_received: u64,
    next_msg_id: u64,
    open_msg_id: u64,
    pending_write_msg_id: Option<u64>,
    close_msg_id: Option<u64>,
    speed: SpeedMeter,
    ascii_mismatch: bool,
    peer_closed: bool,
    flush_timer: TimerId,
    no_data_timer: TimerId,
}

impl DownloadConnection {
    /// Begins a download: submits the
    /// [`Job::OpenForWrite`]/[`Job::AppendForResume`] job and arms the
    /// flush and no-data-transfer timers. Call [`Self::service`] in a
    /// loop to drive it to completion.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reactor: Arc<Reactor>,
        socket: SocketId,
        socket_events: Receiver<Event>,
        disk: Arc<DiskPool>,
        target_path: PathBuf,
        policy: WriteConflictPolicy,
        mode: TransferMode,
        expected_size: Option<u64>,
        resume_offset: Option<u64>,
    ) -> Self {
        let (requester, disk_completions) = disk.register();
        let open_msg_id = 1;
        if let Some(offset) = resume_offset {
            disk.submit(requester, open_msg_id, Job::AppendForResume { path: target_path.clone(), offset });
        } else {
            disk.submit(
                requester,
                open_msg_id,
                Job::OpenForWrite { path: target_path.clone(), policy, mode },
            );
        }

        let flush_timer = next_timer_id();
        let no_data_timer = next_timer_id();
        let _ = reactor.set_timer(socket, flush_timer, FLUSH_TIMEOUT);
        let _ = reactor.set_timer(socket, no_data_timer, NO_DATA_TRANSFER_TIMEOUT);

        Self {
            reactor,
            socket,
            socket_events,
            disk,
            requester,
            disk_completions,
            target_path,
            mode,
            expected_size,
            resume_offset,
            phase: Phase::Opening,
            handle: None,
            buffer: FlushBuffer::new(FLUSH_BUFFER_SIZE),
            direct_flush: false,
            write_in_flight: false,
            bytes_received: 0,
            next_msg_id: open_msg_id + 1,
            open_msg_id,
            pending_write_msg_id: None,
            close_msg_id: None,
            speed: SpeedMeter::new(),
            ascii_mismatch: false,
            peer_closed: false,
            flush_timer,
            no_data_timer,
        }
    }

    /// Forces every incoming chunk to be written through immediately
    /// rather than accumulated, trading throughput for a smaller
    /// in-memory window after a cancel (spec.md §4.5.1's
    /// `set_direct_flush`).
    pub fn set_direct_flush(&mut self, direct: bool) {
        self.direct_flush = direct;
    }

    /// Whether a chunk observed so far looked like binary data on an
    /// ASCII-mode transfer.
    #[must_use]
    pub const fn is_ascii_tr_for_bin_file_problem(&self) -> bool {
        self.ascii_mismatch
    }

    /// Total bytes received from the wire so far (pre ascii-normalize).
    #[must_use]
    pub const fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// The local path this download is writing to.
    #[must_use]
    pub fn target_path(&self) -> &std::path::Path {
        &self.target_path
    }

    /// The file size the control connection reported before the transfer
    /// started, when known (via `SIZE`), used to decide whether a missing
    /// MODE-Z terminator is benign.
    #[must_use]
    pub const fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    /// The byte offset this download resumed from, when it is a resume
    /// rather than a fresh transfer.
    #[must_use]
    pub const fn resume_offset(&self) -> Option<u64> {
        self.resume_offset
    }

    /// The current throughput estimate, bytes per second.
    #[must_use]
    pub fn current_rate_bytes_per_second(&self) -> f64 {
        self.speed.current_rate_bytes_per_second()
    }

    /// Processes at most one event (a socket read, a timer, or a disk
    /// completion), blocking for up to `timeout` if nothing is ready.
    ///
    /// # Errors
    ///
    /// Returns [`DataConnError`] if the disk pool or socket layer
    /// reported a failure this pipeline cannot recover from.
    pub fn service(&mut self, timeout: Duration) -> Result<ServiceOutcome, DataConnError> {
        if self.phase == Phase::Done {
            return Ok(ServiceOutcome::Done);
        }

        crossbeam_channel::select! {
            recv(self.socket_events) -> msg => self.handle_socket_event(msg.ok()),
            recv(self.disk_completions) -> msg => self.handle_disk_completion(msg.ok()),
            default(timeout) => Ok(ServiceOutcome::Idle),
        }
    }

    fn handle_socket_event(&mut self, event: Option<Event>) -> Result<ServiceOutcome, DataConnError> {
        let Some(event) = event else {
            self.peer_closed = true;
            return self.advance_after_peer_closed();
        };

        match event {
            Event::BytesRead { data } => {
                self.speed.record(data.len() as u64, std::time::Instant::now());
                self.bytes_received += data.len() as u64;

                let normalized = if self.mode == TransferMode::Ascii {
                    if is_ascii_tr_for_bin_file_problem(&data) {
                        self.ascii_mismatch = true;
                    }
                    wire_to_local(&data)
                } else {
                    data
                };

                self.buffer.push(&normalized);
                let _ = self.reactor.set_timer(self.socket, self.no_data_timer, NO_DATA_TRANSFER_TIMEOUT);

                if self.direct_flush || self.buffer.is_full() {
                    self.try_flush();
                }

                if self.ascii_mismatch {
                    Ok(ServiceOutcome::AsciiBinaryMismatch)
                } else {
                    Ok(ServiceOutcome::Progress)
                }
            }
            Event::Closed { .. } | Event::CompressedStreamEnd => {
                self.peer_closed = true;
                self.advance_after_peer_closed()
            }
            Event::DecompressionError(message) => Err(DataConnError::Decompression(message)),
            Event::Timer(id) if id == self.flush_timer => {
                let _ = self.reactor.set_timer(self.socket, self.flush_timer, FLUSH_TIMEOUT);
                if !self.buffer.is_empty() {
                    self.try_flush();
                }
                Ok(ServiceOutcome::Progress)
            }
            Event::Timer(id) if id == self.no_data_timer => Ok(ServiceOutcome::NoDataTransferTimeout),
            Event::Timer(_) | Event::Connected { .. } | Event::Accepted { .. } | Event::Writable => {
                Ok(ServiceOutcome::Idle)
            }
        }
    }

    fn handle_disk_completion(&mut self, completion: Option<diskpool::JobCompletion>) -> Result<ServiceOutcome, DataConnError> {
        let Some(completion) = completion else {
            return Ok(ServiceOutcome::Idle);
        };

        if completion.msg_id == self.open_msg_id {
            if completion.state != CompletionState::Ok {
                return Err(completion.error.map_or(DataConnError::AlreadyClosed, DataConnError::Disk));
            }
            if let Some(ProducedData::Handle(handle)) = completion.produced {
                self.handle = Some(handle);
            }
            self.phase = Phase::Transferring;
            return Ok(ServiceOutcome::Progress);
        }

        if Some(completion.msg_id) == self.pending_write_msg_id {
            self.pending_write_msg_id = None;
            self.write_in_flight = false;
            if completion.state == CompletionState::Failed {
                return Err(completion.error.map_or(DataConnError::AlreadyClosed, DataConnError::Disk));
            }
            if self.peer_closed && self.buffer.is_empty() {
                self.submit_close();
            } else if !self.buffer.is_empty() {
                self.try_flush();
            }
            return Ok(ServiceOutcome::Progress);
        }

        if Some(completion.msg_id) == self.close_msg_id {
            self.phase = Phase::Done;
            self.reactor.cancel_timer(self.flush_timer);
            self.reactor.cancel_timer(self.no_data_timer);
            self.disk.deregister(self.requester);
            return Ok(ServiceOutcome::Done);
        }

        Ok(ServiceOutcome::Idle)
    }

    fn advance_after_peer_closed(&mut self) -> Result<ServiceOutcome, DataConnError> {
        if self.write_in_flight {
            return Ok(ServiceOutcome::Progress);
        }
        if !self.buffer.is_empty() {
            self.try_flush();
            return Ok(ServiceOutcome::Progress);
        }
        if self.phase == Phase::Transferring {
            self.submit_close();
        }
        Ok(ServiceOutcome::Progress)
    }

    fn try_flush(&mut self) {
        if self.write_in_flight || self.buffer.is_empty() {
            return;
        }
        let Some(handle) = self.handle else { return };
        let data = self.buffer.take_for_flush();
        let msg_id = self.allocate_msg_id();
        self.pending_write_msg_id = Some(msg_id);
        self.write_in_flight = true;
        self.disk.submit(self.requester, msg_id, Job::Write { handle, data });
    }

    fn submit_close(&mut self) {
        let Some(handle) = self.handle else {
            self.phase = Phase::Done;
            return;
        };
        let msg_id = self.allocate_msg_id();
        self.close_msg_id = Some(msg_id);
        self.phase = Phase::ClosingFile;
        self.disk.submit(self.requester, msg_id, Job::CloseFile { handle });
    }

    fn allocate_msg_id(&mut self) -> u64 {
        let id = self.next_msg_id;
        self.next_msg_id += 1;
        id
    }

    /// Cancels the transfer, flushing whatever has been buffered and
    /// closing the file handle rather than discarding it (spec.md
    /// §4.5.1's `cancel_and_flush`).
    pub fn cancel_and_flush(&mut self) {
        self.peer_closed = true;
        if !self.buffer.is_empty() {
            self.try_flush();
        } else if self.phase == Phase::Transferring && !self.write_in_flight {
            self.submit_close();
        }
    }

    /// Blocks (bounded by repeated [`Self::service`] calls up to
    /// `timeout` total) until the file handle has closed.
    ///
    /// # Errors
    ///
    /// Returns [`DataConnError`] if the disk pool reports a failure
    /// while finishing the close.
    pub fn wait_for_file_close(&mut self, timeout: Duration) -> Result<(), DataConnError> {
        let deadline = std::time::Instant::now() + timeout;
        while self.phase != Phase::Done {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Err(DataConnError::NoDataTransferTimeout(timeout));
            }
            self.service(remaining)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskpool::DiskPool;
    use reactor::Reactor;
    use test_support::{LoopbackListener, TempWorkspace};

    fn connected_pair() -> (Arc<Reactor>, SocketId, Receiver<Event>) {
        let listener = LoopbackListener::bind().expect("bind loopback");
        let addr = format!("127.0.0.1:{}", listener.port()).parse().expect("parse addr");
        let reactor = Arc::new(Reactor::new());
        let (socket, events) = reactor.connect(addr);
        let server_side = listener.accept_once().expect("accept");
        drop(server_side);
        (reactor, socket, events)
    }

    #[test]
    fn new_download_submits_an_open_job() {
        let (reactor, socket, events) = connected_pair();
        let disk = Arc::new(DiskPool::new(2));
        let workspace = TempWorkspace::new();
        let target = workspace.root().join("out.bin");

        let download = DownloadConnection::new(
            reactor,
            socket,
            events,
            disk,
            target,
            WriteConflictPolicy::Overwrite,
            TransferMode::Binary,
            None,
            None,
        );

        assert_eq!(download.bytes_received(), 0);
        assert!(!download.is_ascii_tr_for_bin_file_problem());
    }

    #[test]
    fn ascii_mismatch_latches_once_triggered() {
        let (reactor, socket, events) = connected_pair();
        let disk = Arc::new(DiskPool::new(2));
        let workspace = TempWorkspace::new();
        let target = workspace.root().join("out.txt");

        let mut download = DownloadConnection::new(
            reactor,
            socket,
            events,
            disk,
            target,
            WriteConflictPolicy::Overwrite,
            TransferMode::Ascii,
            None,
            None,
        );

        // Wait for the open job to complete so a handle is assigned.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while download.handle.is_none() && std::time::Instant::now() < deadline {
            let _ = download.service(Duration::from_millis(50));
        }
        assert!(download.handle.is_some(), "open job should complete");

        let outcome = download.handle_socket_event(Some(Event::BytesRead { data: b"abc\0def".to_vec() }));
        assert!(matches!(outcome, Ok(ServiceOutcome::AsciiBinaryMismatch)));
        assert!(download.is_ascii_tr_for_bin_file_problem());
    }
}
