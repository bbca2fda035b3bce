//! [`ControlConnection`]: the L4 state machine driving one FTP session's
//! command/reply exchange over a [`reactor::Reactor`] socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use logging::{Direction, LogEvent, LogSink, LogUid};
use reactor::{Event, Reactor, SocketId, TimerId, Transport};
use wire::addr::{parse_epsv, parse_pasv, PassiveAddr};
use wire::pwd::parse_pwd;
use wire::server_family::detect_server_family;
use wire::{format, Command, PathType, Reply, TransferMode};

use crate::endpoint::Endpoint;
use crate::error::ControlError;
use crate::reply_outcome::ReplyOutcome;
use crate::state::{CancelToken, ControlState, KeepAliveState};

/// `T_reply` (spec.md §5): how long a single command waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(20);
/// `T_ka` (spec.md §5): the keep-alive period while idle.
pub const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(30);
/// `T_rc` (spec.md §5): the reconnect backoff cap (0 when TLS-forced).
pub const RECONNECT_WAIT_CAP: Duration = Duration::from_secs(20);
const RECONNECT_WAIT_BASE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

static TIMER_IDS: AtomicU64 = AtomicU64::new(1);

fn next_timer_id() -> TimerId {
    TimerId(TIMER_IDS.fetch_add(1, Ordering::Relaxed))
}

/// What [`ControlConnection::ensure_connected`] accomplished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnsureConnectedOutcome {
    /// Already in [`ControlState::Idle`]; nothing was done.
    AlreadyConnected,
    /// A fresh connect/authenticate/negotiate sequence completed.
    Reconnected,
}

/// Outcome of [`ControlConnection::change_working_dir`], distinguishing
/// the two failure modes a worker treats differently (spec.md §4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeDirOutcome {
    /// The directory is now current (or already was).
    Ok,
    /// The server reported the path does not exist.
    NotFound,
    /// The server reported the path exists but access was refused.
    PermissionDenied,
}

/// Which side opens the data socket (spec.md §4.4/§4.5).
#[derive(Clone, Copy, Debug)]
pub enum DataChannelMode {
    /// Ask the server to listen (`EPSV`, falling back to `PASV`).
    /// `active_fallback_addr`, if given, is the local address to bind an
    /// active-mode listener on if the server rejects passive mode with a
    /// `5xx` reply.
    Passive {
        /// Local bind address to fall back to on a passive `5xx`.
        active_fallback_addr: Option<SocketAddr>,
    },
    /// Bind `local_addr` ourselves and tell the server via `PORT`/`EPRT`.
    Active {
        /// The address to listen on.
        local_addr: SocketAddr,
    },
}

/// What a worker needs to open the actual data socket, once
/// [`ControlConnection::prepare_data_channel`] returns.
pub struct DataChannelPlan {
    /// Set when the server is listening: the address to dial.
    pub passive_addr: Option<PassiveAddr>,
    /// Set when we are listening: the registered listener socket and its
    /// event channel, from which the eventual [`Event::Accepted`] is read.
    pub active_listener: Option<(SocketId, Receiver<Event>)>,
}

/// The control connection: one logical FTP session, per spec.md §4.4.
///
/// Not `Send`-shared between workers; each item's worker owns one and
/// drives it from a single thread, matching spec.md §5's "per-connection
/// state owned by its worker" resource policy.
pub struct ControlConnection {
    reactor: Arc<Reactor>,
    endpoint: Endpoint,
    socket: Option<SocketId>,
    events: Option<Receiver<Event>>,
    read_buf: Vec<u8>,
    state: ControlState,
    cached_cwd: Option<String>,
    cached_mode: Option<TransferMode>,
    path_type: PathType,
    log_uid: LogUid,
    log_sink: Arc<dyn LogSink>,
    keep_alive: KeepAliveState,
    keep_alive_timer: TimerId,
    reconnect_wait: Duration,
}

impl ControlConnection {
    /// Builds a connection bound to `endpoint`, not yet connected.
    #[must_use]
    pub fn new(reactor: Arc<Reactor>, endpoint: Endpoint, log_uid: LogUid, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            reactor,
            endpoint,
            socket: None,
            events: None,
            read_buf: Vec::new(),
            state: ControlState::Disconnected,
            cached_cwd: None,
            cached_mode: None,
            path_type: PathType::Unknown,
            log_uid,
            log_sink,
            keep_alive: KeepAliveState::Suspended,
            keep_alive_timer: next_timer_id(),
            reconnect_wait: RECONNECT_WAIT_BASE,
        }
    }

    /// The current state machine state.
    #[must_use]
    pub const fn state(&self) -> ControlState {
        self.state
    }

    /// The cached working directory, if `change_working_dir` has
    /// succeeded at least once since the last reconnect.
    #[must_use]
    pub fn cached_working_dir(&self) -> Option<&str> {
        self.cached_cwd.as_deref()
    }

    /// The cached transfer mode, if `set_transfer_mode` has succeeded at
    /// least once since the last reconnect.
    #[must_use]
    pub const fn cached_transfer_mode(&self) -> Option<TransferMode> {
        self.cached_mode
    }

    /// The server-family path type detected at connect time.
    #[must_use]
    pub const fn path_type(&self) -> PathType {
        self.path_type
    }

    fn log(&self, direction: Direction, text: impl Into<String>) {
        self.log_sink.log(&LogEvent::new(self.log_uid, direction, text));
    }

    /// (Re)connects if not already [`ControlState::Idle`], applying
    /// spec.md §4.4's reconnect policy: exponential backoff bounded by
    /// [`RECONNECT_WAIT_CAP`], skipped entirely for a fresh first attempt
    /// and for any certificate-fatal failure of the previous attempt.
    ///
    /// # Errors
    ///
    /// Returns the [`ControlError`] bucket of whatever step in the
    /// connect/authenticate/negotiate sequence failed.
    pub fn ensure_connected(&mut self, cancel: &CancelToken) -> Result<EnsureConnectedOutcome, ControlError> {
        if self.state == ControlState::Idle {
            return Ok(EnsureConnectedOutcome::AlreadyConnected);
        }

        match self.connect_and_negotiate(cancel) {
            Ok(()) => {
                self.reconnect_wait = RECONNECT_WAIT_BASE;
                Ok(EnsureConnectedOutcome::Reconnected)
            }
            Err(error) => {
                self.teardown();
                if !error.forces_immediate_reconnect() {
                    self.reconnect_wait = (self.reconnect_wait * 2).min(RECONNECT_WAIT_CAP);
                }
                Err(error)
            }
        }
    }

    fn connect_and_negotiate(&mut self, cancel: &CancelToken) -> Result<(), ControlError> {
        self.state = ControlState::Connecting;
        let (socket, events) = self.reactor.connect(self.endpoint.addr);
        self.socket = Some(socket);

        match recv_event(&events, DEFAULT_REPLY_TIMEOUT, cancel)? {
            Event::Connected { ok: true, .. } => {}
            Event::Connected { ok: false, err } => {
                return Err(ControlError::Transient(err.unwrap_or_else(|| "connect failed".to_string())));
            }
            other => return Err(ControlError::Transient(format!("unexpected event while connecting: {other:?}"))),
        }
        self.events = Some(events);

        self.state = ControlState::Greeting;
        let greeting = self.read_reply(cancel)?;
        self.log(Direction::Reply, greeting.text_lossy());
        ReplyOutcome::classify(greeting.clone()).into_result()?;

        self.state = ControlState::Authenticating;
        let user_reply = self.exchange(&Command::User(self.endpoint.user.clone()), cancel)?;
        if user_reply.class() == wire::ReplyClass::Partial {
            self.exchange(&Command::Pass(self.endpoint.password.clone()), cancel)?;
        }

        self.state = ControlState::Negotiating;
        let syst_reply = self.exchange(&Command::Syst, cancel).unwrap_or_else(|_| greeting.clone());
        let hint = detect_server_family(&greeting.text_lossy(), &syst_reply.text_lossy());
        self.path_type = hint.path_type;
        self.log(Direction::Info, format!("server family: {}", hint.hint));
        let _ = self.exchange(&Command::Feat, cancel);

        if self.endpoint.encrypt_control {
            self.state = ControlState::TlsUpgrading;
            self.upgrade_to_tls(cancel)?;
        }

        self.state = ControlState::Idle;
        self.cached_cwd = None;
        self.cached_mode = None;
        self.keep_alive = KeepAliveState::Active;
        self.arm_keep_alive();
        Ok(())
    }

    fn upgrade_to_tls(&mut self, cancel: &CancelToken) -> Result<(), ControlError> {
        self.exchange(&Command::AuthTls, cancel)
            .map_err(|_| ControlError::CertificateFatal("server rejected AUTH TLS".to_string()))?;

        let socket = self.socket.ok_or_else(|| ControlError::Local("no socket to upgrade".to_string()))?;
        let roots = rustls::RootCertStore::from_iter(webpki_roots_iter());
        let config = reactor::default_tls_client_config(roots);
        let server_name = rustls_pki_types::ServerName::try_from(self.endpoint.addr.ip().to_string())
            .map_err(|error| ControlError::CertificateFatal(error.to_string()))?;

        self.reactor
            .upgrade_transport(socket, move |inner| -> Box<dyn Transport> {
                let connection = rustls::ClientConnection::new(config, server_name.to_owned())
                    .expect("failed to build TLS client connection");
                Box::new(reactor::TlsTransport::new(connection, inner))
            })
            .map_err(|error| ControlError::CertificateFatal(error.to_string()))?;

        self.exchange(&Command::Pbsz(0), cancel)?;
        self.exchange(&Command::Prot('P'), cancel)?;
        Ok(())
    }

    /// Sends `cmd` and waits for its reply, classifying the result.
    /// Requires [`ControlState::Idle`]; transitions through
    /// `Commanding`/`AwaitingReply` and back.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Local`] if called outside `Idle`, otherwise
    /// whichever propagation bucket the reply (or a connection failure)
    /// falls into.
    pub fn send_command(&mut self, cmd: &Command, cancel: &CancelToken) -> Result<Reply, ControlError> {
        if self.state != ControlState::Idle {
            return Err(ControlError::Local(format!("send_command called outside Idle (state: {:?})", self.state)));
        }
        self.suspend_keep_alive();
        let result = self.exchange(cmd, cancel);
        self.state = ControlState::Idle;
        self.resume_keep_alive();
        result
    }

    /// Reads the trailing reply (`226 Transfer complete`, `426`, …) a
    /// server sends once a data transfer it already gave a preliminary
    /// `1xx` reply to finishes, per spec.md §5's "within one control
    /// connection, commands and their replies strictly ordered". Every
    /// `RETR`/`STOR`/`APPE`/`LIST` whose initial [`Self::send_command`]
    /// succeeded must be followed by exactly one call to this before the
    /// next command, or the next [`Self::read_reply`] would misparse this
    /// leftover line as that command's reply.
    ///
    /// # Errors
    ///
    /// Returns the propagated [`ControlError`] bucket for the trailing
    /// reply (e.g. [`ControlError::Permanent`] for a `426 Connection
    /// closed; transfer aborted`), or for a connection failure while
    /// waiting for it.
    pub fn read_transfer_reply(&mut self, cancel: &CancelToken) -> Result<Reply, ControlError> {
        self.suspend_keep_alive();
        self.state = ControlState::AwaitingReply;
        let result = self.read_reply(cancel).map(|reply| {
            self.log(Direction::Reply, reply.text_lossy());
            reply
        });
        self.state = ControlState::Idle;
        self.resume_keep_alive();
        let reply = result?;
        ReplyOutcome::classify(reply).into_result()
    }

    fn exchange(&mut self, cmd: &Command, cancel: &CancelToken) -> Result<Reply, ControlError> {
        let formatted = format(cmd);
        self.log(Direction::Cmd, String::from_utf8_lossy(&formatted.log).trim_end().to_string());

        self.state = ControlState::Commanding;
        let socket = self.socket.ok_or_else(|| ControlError::Local("not connected".to_string()))?;
        self.reactor
            .send(socket, &formatted.wire)
            .map_err(|error| ControlError::Transient(error.to_string()))?;

        self.state = ControlState::AwaitingReply;
        let reply = self.read_reply(cancel)?;
        self.log(Direction::Reply, reply.text_lossy());
        ReplyOutcome::classify(reply).into_result()
    }

    fn read_reply(&mut self, cancel: &CancelToken) -> Result<Reply, ControlError> {
        loop {
            if let Ok(Some((reply, consumed))) = wire::parse_reply(&self.read_buf) {
                self.read_buf.drain(..consumed);
                return Ok(reply);
            }

            let events = self.events.clone().ok_or_else(|| ControlError::Local("not connected".to_string()))?;
            match recv_event(&events, DEFAULT_REPLY_TIMEOUT, cancel)? {
                Event::BytesRead { data } => self.read_buf.extend_from_slice(&data),
                Event::Closed { err } => {
                    return Err(ControlError::Transient(err.unwrap_or_else(|| "connection closed".to_string())))
                }
                Event::Writable | Event::Timer(_) => continue,
                other => return Err(ControlError::Transient(format!("unexpected event awaiting reply: {other:?}"))),
            }
        }
    }

    /// Changes the cached working directory, issuing `CWD` only if it
    /// differs from the cached value (spec.md §4.4).
    ///
    /// # Errors
    ///
    /// Returns the [`ControlError`] bucket for any failure other than the
    /// two classified outcomes.
    pub fn change_working_dir(&mut self, path: &str, cancel: &CancelToken) -> Result<ChangeDirOutcome, ControlError> {
        if self.cached_cwd.as_deref() == Some(path) {
            return Ok(ChangeDirOutcome::Ok);
        }

        match self.send_command(&Command::Cwd(path.to_string()), cancel) {
            Ok(_) => {
                self.cached_cwd = Some(path.to_string());
                Ok(ChangeDirOutcome::Ok)
            }
            Err(ControlError::Permanent { code, reply_text }) => {
                let lower = reply_text.to_ascii_lowercase();
                if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
                    Ok(ChangeDirOutcome::PermissionDenied)
                } else if code == 550 {
                    Ok(ChangeDirOutcome::NotFound)
                } else {
                    Err(ControlError::Permanent { code, reply_text })
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Sets the transfer mode, re-issuing `TYPE` only on change.
    ///
    /// # Errors
    ///
    /// Returns the [`ControlError`] bucket for whatever caused `TYPE` to
    /// fail.
    pub fn set_transfer_mode(&mut self, mode: TransferMode, cancel: &CancelToken) -> Result<(), ControlError> {
        if self.cached_mode == Some(mode) {
            return Ok(());
        }
        self.send_command(&Command::Type(mode.type_code()), cancel)?;
        self.cached_mode = Some(mode);
        Ok(())
    }

    /// Prepares a data channel per `mode`, per spec.md §4.4/§4.5: passive
    /// mode issues `EPSV` (falling back to `PASV` on a `5xx`, and to
    /// active mode if the caller supplied a fallback address and passive
    /// mode itself is refused); active mode opens a local listener and
    /// issues `PORT`/`EPRT`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Local`] if address parsing fails, or the
    /// propagated [`ControlError`] from the underlying command exchange.
    pub fn prepare_data_channel(&mut self, mode: DataChannelMode, cancel: &CancelToken) -> Result<DataChannelPlan, ControlError> {
        match mode {
            DataChannelMode::Passive { active_fallback_addr } => match self.try_passive(cancel) {
                Ok(plan) => Ok(plan),
                Err(ControlError::Permanent { .. }) if active_fallback_addr.is_some() => {
                    self.open_active(active_fallback_addr.expect("checked is_some"), cancel)
                }
                Err(other) => Err(other),
            },
            DataChannelMode::Active { local_addr } => self.open_active(local_addr, cancel),
        }
    }

    fn try_passive(&mut self, cancel: &CancelToken) -> Result<DataChannelPlan, ControlError> {
        let reply = match self.send_command(&Command::Epsv, cancel) {
            Ok(reply) => reply,
            Err(ControlError::Permanent { .. }) => self.send_command(&Command::Pasv, cancel)?,
            Err(other) => return Err(other),
        };

        let text = reply.text_lossy();
        let addr = if reply.code() == 229 { parse_epsv(&text) } else { parse_pasv(&text) }
            .map_err(|error| ControlError::Local(error.to_string()))?;

        Ok(DataChannelPlan { passive_addr: Some(addr), active_listener: None })
    }

    fn open_active(&mut self, local_addr: SocketAddr, cancel: &CancelToken) -> Result<DataChannelPlan, ControlError> {
        let (listener_id, bound_addr, events) =
            self.reactor.listen(local_addr).map_err(|error| ControlError::Local(error.to_string()))?;

        let cmd = match bound_addr {
            SocketAddr::V4(v4) => {
                let octets = v4.ip().octets();
                let port = v4.port();
                Command::Port(format!(
                    "{},{},{},{},{},{}",
                    octets[0],
                    octets[1],
                    octets[2],
                    octets[3],
                    port / 256,
                    port % 256
                ))
            }
            SocketAddr::V6(v6) => Command::Eprt(format!("|2|{}|{}|", v6.ip(), v6.port())),
        };

        self.send_command(&cmd, cancel)?;
        Ok(DataChannelPlan { passive_addr: None, active_listener: Some((listener_id, events)) })
    }

    /// Parses a `257 PWD` reply's text using this connection's detected
    /// [`PathType`] conventions (currently identical across path types;
    /// the hook exists for future per-dialect quoting differences).
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Local`] if the reply text does not parse.
    pub fn parse_pwd_reply(&self, text: &str) -> Result<String, ControlError> {
        parse_pwd(text).map_err(|error| ControlError::Local(error.to_string()))
    }

    fn suspend_keep_alive(&mut self) {
        self.keep_alive = KeepAliveState::Suspended;
        if let Some(socket) = self.socket {
            self.reactor.cancel_timer(self.keep_alive_timer);
            let _ = socket;
        }
    }

    fn resume_keep_alive(&mut self) {
        self.keep_alive = KeepAliveState::Active;
        self.arm_keep_alive();
    }

    fn arm_keep_alive(&self) {
        if self.keep_alive == KeepAliveState::Active {
            if let Some(socket) = self.socket {
                let _ = self.reactor.set_timer(socket, self.keep_alive_timer, KEEP_ALIVE_PERIOD);
            }
        }
    }

    /// Services a fired keep-alive [`Event::Timer`] by sending `NOOP`.
    /// Workers poll their control connection's event channel for idle
    /// timers between items and call this when they see one for
    /// [`Self::keep_alive_timer_id`].
    ///
    /// # Errors
    ///
    /// Returns the [`ControlError`] bucket for whatever caused `NOOP` to
    /// fail; a failure here behaves like any other transient error.
    pub fn service_keep_alive(&mut self, cancel: &CancelToken) -> Result<(), ControlError> {
        if self.state != ControlState::Idle || self.keep_alive != KeepAliveState::Active {
            return Ok(());
        }
        self.send_command(&Command::Noop, cancel)?;
        Ok(())
    }

    /// The timer id this connection's keep-alive fires on, so a worker
    /// can recognise it among other [`Event::Timer`]s on the same
    /// channel.
    #[must_use]
    pub const fn keep_alive_timer_id(&self) -> TimerId {
        self.keep_alive_timer
    }

    /// The event receiver for this connection's socket, for a worker to
    /// poll directly (e.g. to notice an unsolicited `Closed` between
    /// commands).
    #[must_use]
    pub fn events(&self) -> Option<&Receiver<Event>> {
        self.events.as_ref()
    }

    fn teardown(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = self.reactor.close_graceful(socket);
            self.reactor.cancel_timer(self.keep_alive_timer);
        }
        self.events = None;
        self.read_buf.clear();
        self.state = ControlState::Disconnected;
        self.keep_alive = KeepAliveState::Suspended;
    }

    /// Gracefully closes the connection, sending `QUIT` first if still
    /// idle. Leaves the connection in [`ControlState::Disconnected`].
    pub fn quit(&mut self, cancel: &CancelToken) {
        if self.state == ControlState::Idle {
            let _ = self.send_command(&Command::Quit, cancel);
        }
        self.teardown();
    }
}

fn recv_event(events: &Receiver<Event>, timeout: Duration, cancel: &CancelToken) -> Result<Event, ControlError> {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(ControlError::Local("cancelled".to_string()));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ControlError::Transient("timed out waiting for a reply".to_string()));
        }
        match events.recv_timeout(remaining.min(POLL_INTERVAL)) {
            Ok(event) => return Ok(event),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ControlError::Transient("event channel closed".to_string()))
            }
        }
    }
}

fn webpki_roots_iter() -> impl Iterator<Item = rustls_pki_types::TrustAnchor<'static>> {
    webpki_roots::TLS_SERVER_ROOTS.iter().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::{LogUidAllocator, NullSink};
    use std::io::{Read, Write};
    use std::thread;
    use test_support::LoopbackListener;

    fn new_connection(addr: SocketAddr) -> ControlConnection {
        let reactor = Arc::new(Reactor::new());
        let endpoint = Endpoint::new(addr, "anonymous", "guest");
        let allocator = LogUidAllocator::default();
        ControlConnection::new(reactor, endpoint, allocator.next(), Arc::new(NullSink))
    }

    #[test]
    fn ensure_connected_runs_the_full_greeting_through_idle_sequence() {
        let listener = LoopbackListener::bind().unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], listener.port()).into();

        let server = thread::spawn(move || {
            let mut stream = listener.accept_once().unwrap();
            stream.write_all(b"220 test server ready\r\n").unwrap();

            let mut buf = [0_u8; 256];
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"USER anonymous"));
            stream.write_all(b"230 logged in\r\n").unwrap();

            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"SYST"));
            stream.write_all(b"215 UNIX Type: L8\r\n").unwrap();

            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"FEAT"));
            stream.write_all(b"211 no features\r\n").unwrap();
        });

        let mut connection = new_connection(addr);
        let cancel = CancelToken::new();
        let outcome = connection.ensure_connected(&cancel).unwrap();
        assert_eq!(outcome, EnsureConnectedOutcome::Reconnected);
        assert_eq!(connection.state(), ControlState::Idle);
        assert_eq!(connection.path_type(), PathType::Unix);

        server.join().unwrap();
    }

    #[test]
    fn ensure_connected_is_a_no_op_when_already_idle() {
        let listener = LoopbackListener::bind().unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], listener.port()).into();

        let server = thread::spawn(move || {
            let mut stream = listener.accept_once().unwrap();
            stream.write_all(b"220 ready\r\n").unwrap();
            let mut buf = [0_u8; 256];
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"USER"));
            stream.write_all(b"230 logged in\r\n").unwrap();
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"SYST"));
            stream.write_all(b"215 UNIX Type: L8\r\n").unwrap();
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"FEAT"));
            stream.write_all(b"211 none\r\n").unwrap();
        });

        let mut connection = new_connection(addr);
        let cancel = CancelToken::new();
        connection.ensure_connected(&cancel).unwrap();
        let second = connection.ensure_connected(&cancel).unwrap();
        assert_eq!(second, EnsureConnectedOutcome::AlreadyConnected);

        server.join().unwrap();
    }

    #[test]
    fn permanent_reply_classifies_as_permanent_control_error() {
        let listener = LoopbackListener::bind().unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], listener.port()).into();

        let server = thread::spawn(move || {
            let mut stream = listener.accept_once().unwrap();
            stream.write_all(b"220 ready\r\n").unwrap();
            let mut buf = [0_u8; 256];
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"USER"));
            stream.write_all(b"230 logged in\r\n").unwrap();
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"SYST"));
            stream.write_all(b"215 UNIX Type: L8\r\n").unwrap();
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"FEAT"));
            stream.write_all(b"211 none\r\n").unwrap();

            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"CWD"));
            stream.write_all(b"550 No such directory\r\n").unwrap();
        });

        let mut connection = new_connection(addr);
        let cancel = CancelToken::new();
        connection.ensure_connected(&cancel).unwrap();
        let outcome = connection.change_working_dir("/no/such/dir", &cancel).unwrap();
        assert_eq!(outcome, ChangeDirOutcome::NotFound);

        server.join().unwrap();
    }

    #[test]
    fn change_working_dir_is_a_no_op_when_cache_already_matches() {
        let listener = LoopbackListener::bind().unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], listener.port()).into();

        let server = thread::spawn(move || {
            let mut stream = listener.accept_once().unwrap();
            stream.write_all(b"220 ready\r\n").unwrap();
            let mut buf = [0_u8; 256];
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"USER"));
            stream.write_all(b"230 logged in\r\n").unwrap();
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"SYST"));
            stream.write_all(b"215 UNIX Type: L8\r\n").unwrap();
            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"FEAT"));
            stream.write_all(b"211 none\r\n").unwrap();

            let n = stream.read(&mut buf).unwrap();
            assert!(buf[..n].starts_with(b"CWD"));
            stream.write_all(b"250 directory changed\r\n").unwrap();
        });

        let mut connection = new_connection(addr);
        let cancel = CancelToken::new();
        connection.ensure_connected(&cancel).unwrap();
        connection.change_working_dir("/pub", &cancel).unwrap();
        // Second call for the same path must not send another CWD; the
        // server thread only expects to read one.
        let second = connection.change_working_dir("/pub", &cancel).unwrap();
        assert_eq!(second, ChangeDirOutcome::Ok);

        server.join().unwrap();
    }
}
