//! The upload pipeline: `disk -> read-buffer -> ascii-normalize? ->
//! compress(MODE-Z)? -> encrypt? -> socket`.
//!
//! As with [`crate::download`], TLS and MODE-Z are layered onto the
//! socket by whoever negotiated the data channel; this pipeline's job is
//! the read-ahead from disk, the ascii-normalize stage, and adaptive
//! chunk sizing via [`ratectl::PacketSizeEstimator`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use diskpool::{CompletionState, DiskPool, Job, ProducedData, RequesterId};
use ratectl::{PacketSizeEstimator, SpeedMeter};
use reactor::{Event, Reactor, SocketId, TimerId};
use wire::TransferMode;

use crate::ascii::local_to_wire;
use crate::error::DataConnError;
use crate::flush::NO_DATA_TRANSFER_TIMEOUT;
use crate::ServiceOutcome;

static TIMER_IDS: AtomicU64 = AtomicU64::new(1);

fn next_timer_id() -> TimerId {
    TimerId(TIMER_IDS.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Reading,
    Draining,
    Done,
}

/// A transient socket sending one local file to the server, per spec.md
/// §4.5.2.
pub struct UploadConnection {
    reactor: Arc<Reactor>,
    socket: SocketId,
    socket_events: Receiver<Event>,
    disk: Arc<DiskPool>,
    requester: RequesterId,
    disk_completions: Receiver<diskpool::JobCompletion>,
    source_path: PathBuf,
    mode: TransferMode,
    offset: u64,
    phase: Phase,
    read_in_flight: bool,
    eof_seen: bool,
    next_msg_id: u64,
    pending_read_msg_id: Option<u64>,
    bytes_sent: u64,
    estimator: PacketSizeEstimator,
    speed: SpeedMeter,
    no_data_timer: TimerId,
}

impl UploadConnection {
    /// Begins an upload by issuing the first [`Job::ReadForUpload`] and
    /// arming the no-data-transfer timer.
    #[must_use]
    pub fn new(
        reactor: Arc<Reactor>,
        socket: SocketId,
        socket_events: Receiver<Event>,
        disk: Arc<DiskPool>,
        source_path: PathBuf,
        mode: TransferMode,
        start_offset: u64,
    ) -> Self {
        let (requester, disk_completions) = disk.register();
        let no_data_timer = next_timer_id();
        let _ = reactor.set_timer(socket, no_data_timer, NO_DATA_TRANSFER_TIMEOUT);

        let mut connection = Self {
            reactor,
            socket,
            socket_events,
            disk,
            requester,
            disk_completions,
            source_path,
            mode,
            offset: start_offset,
            phase: Phase::Reading,
            read_in_flight: false,
            eof_seen: false,
            next_msg_id: 1,
            pending_read_msg_id: None,
            bytes_sent: 0,
            estimator: PacketSizeEstimator::new(ratectl::estimator::DEFAULT_PACKET_SIZE),
            speed: SpeedMeter::new(),
            no_data_timer,
        };
        connection.submit_read();
        connection
    }

    /// The local path this upload is reading from.
    #[must_use]
    pub fn source_path(&self) -> &std::path::Path {
        &self.source_path
    }

    /// Total bytes sent to the wire so far (post ascii-normalize).
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// The current throughput estimate, bytes per second.
    #[must_use]
    pub fn current_rate_bytes_per_second(&self) -> f64 {
        self.speed.current_rate_bytes_per_second()
    }

    /// The adaptive read/write chunk size currently recommended.
    #[must_use]
    pub fn recommended_chunk_size(&self) -> usize {
        self.estimator.recommended_size()
    }

    /// Processes at most one event (a disk read completion, a socket
    /// writable notification, or a timer), blocking up to `timeout`.
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
            recv(self.disk_completions) -> msg => self.handle_disk_completion(msg.ok()),
            recv(self.socket_events) -> msg => self.handle_socket_event(msg.ok()),
            default(timeout) => Ok(ServiceOutcome::Idle),
        }
    }

    fn handle_disk_completion(&mut self, completion: Option<diskpool::JobCompletion>) -> Result<ServiceOutcome, DataConnError> {
        let Some(completion) = completion else {
            return Ok(ServiceOutcome::Idle);
        };
        if Some(completion.msg_id) != self.pending_read_msg_id {
            return Ok(ServiceOutcome::Idle);
        }
        self.pending_read_msg_id = None;
        self.read_in_flight = false;

        if completion.state == CompletionState::Failed {
            return Err(completion.error.map_or(DataConnError::AlreadyClosed, DataConnError::Disk));
        }

        let Some(ProducedData::Bytes(bytes)) = completion.produced else {
            return Ok(ServiceOutcome::Idle);
        };

        if bytes.is_empty() {
            self.eof_seen = true;
            self.phase = Phase::Draining;
            let _ = self.reactor.close_graceful(self.socket);
            return Ok(ServiceOutcome::Progress);
        }

        self.offset += bytes.len() as u64;
        let wire_bytes = if self.mode == TransferMode::Ascii { local_to_wire(&bytes) } else { bytes };

        let start = std::time::Instant::now();
        self.reactor
            .send(self.socket, &wire_bytes)
            .map_err(DataConnError::Reactor)?;
        self.estimator.record_write(wire_bytes.len(), start);
        self.speed.record(wire_bytes.len() as u64, start);
        self.bytes_sent += wire_bytes.len() as u64;
        let _ = self.reactor.set_timer(self.socket, self.no_data_timer, NO_DATA_TRANSFER_TIMEOUT);

        self.submit_read();
        Ok(ServiceOutcome::Progress)
    }

    fn handle_socket_event(&mut self, event: Option<Event>) -> Result<ServiceOutcome, DataConnError> {
        let Some(event) = event else {
            self.phase = Phase::Done;
            self.disk.deregister(self.requester);
            return Ok(ServiceOutcome::Done);
        };

        match event {
            Event::Closed { .. } => {
                self.phase = Phase::Done;
                self.reactor.cancel_timer(self.no_data_timer);
                self.disk.deregister(self.requester);
                Ok(ServiceOutcome::Done)
            }
            Event::Timer(id) if id == self.no_data_timer => Ok(ServiceOutcome::NoDataTransferTimeout),
            Event::Writable
            | Event::Connected { .. }
            | Event::Accepted { .. }
            | Event::BytesRead { .. }
            | Event::DecompressionError(_)
            | Event::CompressedStreamEnd
            | Event::Timer(_) => Ok(ServiceOutcome::Idle),
        }
    }

    fn submit_read(&mut self) {
        if self.read_in_flight || self.eof_seen {
            return;
        }
        let msg_id = self.next_msg_id;
        self.next_msg_id += 1;
        self.pending_read_msg_id = Some(msg_id);
        self.read_in_flight = true;
        self.disk.submit(
            self.requester,
            msg_id,
            Job::ReadForUpload {
                path: self.source_path.clone(),
                offset: self.offset,
                max_len: self.estimator.recommended_size(),
            },
        );
    }

    /// Stops reading and requests a graceful close of the data socket,
    /// used when a worker cancels mid-upload.
    pub fn cancel_and_flush(&mut self) {
        self.eof_seen = true;
        self.phase = Phase::Draining;
        let _ = self.reactor.close_graceful(self.socket);
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
    fn new_upload_issues_a_first_read() {
        let (reactor, socket, events) = connected_pair();
        let disk = Arc::new(DiskPool::new(2));
        let workspace = TempWorkspace::new();
        let source = workspace.write_file("in.bin", b"hello world");

        let upload = UploadConnection::new(reactor, socket, events, disk, source, TransferMode::Binary, 0);

        assert_eq!(upload.bytes_sent(), 0);
        assert!(upload.recommended_chunk_size() > 0);
    }

    #[test]
    fn upload_drains_a_small_file_to_completion() {
        let listener = LoopbackListener::bind().expect("bind loopback");
        let addr: std::net::SocketAddr =
            format!("127.0.0.1:{}", listener.port()).parse().expect("parse addr");
        let reactor = Arc::new(Reactor::new());
        let (socket, events) = reactor.connect(addr);
        let mut server = listener.accept_once().expect("accept");

        let reader = std::thread::spawn(move || {
            use std::io::Read;
            let mut received = Vec::new();
            server.read_to_end(&mut received).expect("read all bytes");
            received
        });

        let disk = Arc::new(DiskPool::new(2));
        let workspace = TempWorkspace::new();
        let payload: &[u8] = b"hello world";
        let source = workspace.write_file("in.bin", payload);

        let mut upload = UploadConnection::new(reactor, socket, events, disk, source, TransferMode::Binary, 0);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while upload.phase != Phase::Done && std::time::Instant::now() < deadline {
            let _ = upload.service(Duration::from_millis(50));
        }

        let received = reader.join().expect("reader thread");
        assert_eq!(received, payload);
        assert_eq!(upload.bytes_sent(), payload.len() as u64);
    }
}
