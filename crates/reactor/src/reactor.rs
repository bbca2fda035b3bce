//! The [`Reactor`]: socket registration, the `connect`/`listen`/`send`/
//! `close_graceful` contract, and the reader threads that turn inbound
//! bytes into [`Event::BytesRead`].

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;

use crate::error::ReactorError;
use crate::event::Event;
use crate::id::{SocketId, SocketIdAllocator, TimerId};
use crate::timer::Timers;
use crate::transport::{TcpTransport, Transport};

/// How often a reader thread wakes to check whether its socket has been
/// asked to close, between blocking reads. Chosen short enough that
/// `close_graceful` feels responsive without busy-looping.
const READER_POLL_INTERVAL: Duration = Duration::from_millis(200);

struct Connection {
    transport: Mutex<Box<dyn Transport>>,
    events: Sender<Event>,
    closing: AtomicBool,
}

/// The socket layer: a registry of live connections, each with its own
/// reader thread, dispatching [`Event`]s to a per-socket channel.
///
/// Events for one socket are delivered in arrival order; no ordering is
/// implied across sockets (spec.md §4.2).
#[derive(Default)]
pub struct Reactor {
    ids: SocketIdAllocator,
    connections: Arc<DashMap<SocketId, Arc<Connection>>>,
    /// Receivers for sockets registered by a listener's accept loop,
    /// waiting to be claimed by whoever handles the matching
    /// [`Event::Accepted`].
    pending_receivers: Arc<DashMap<SocketId, Receiver<Event>>>,
    timers: Arc<Timers>,
}

impl Reactor {
    /// Creates an empty reactor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dials `addr` on a background thread. Returns immediately with the
    /// [`SocketId`] the eventual connection will be registered under and
    /// the [`Receiver`] that will carry its [`Event::Connected`] and all
    /// subsequent events.
    pub fn connect(&self, addr: SocketAddr) -> (SocketId, Receiver<Event>) {
        let id = self.ids.next();
        let (tx, rx) = unbounded();
        let connections = Arc::clone(&self.connections);
        let sender = tx.clone();

        std::thread::Builder::new()
            .name(format!("reactor-connect-{}", id.get()))
            .spawn(move || match TcpStream::connect(addr) {
                Ok(stream) => {
                    let _ = stream.set_read_timeout(Some(READER_POLL_INTERVAL));
                    let transport: Box<dyn Transport> = Box::new(TcpTransport::new(stream));
                    register_and_run(&connections, id, transport, sender, true);
                }
                Err(source) => {
                    let _ = sender.send(Event::Connected { ok: false, err: Some(source.to_string()) });
                }
            })
            .expect("failed to spawn connect thread");

        (id, rx)
    }

    /// Binds `addr` and accepts connections on a background thread,
    /// registering each as a new [`SocketId`] and posting
    /// [`Event::Accepted`] on the listener's own channel. Returns the
    /// address actually bound (distinct from `addr` when its port is
    /// `0`), which `control` needs to quote back to the server in a
    /// `PORT`/`EPRT` command for active-mode data connections.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::Listen`] if the bind fails.
    pub fn listen(&self, addr: SocketAddr) -> Result<(SocketId, SocketAddr, Receiver<Event>), ReactorError> {
        let listener = TcpListener::bind(addr).map_err(|source| ReactorError::Listen { addr: addr.to_string(), source })?;
        let bound_addr = listener.local_addr().map_err(|source| ReactorError::Listen { addr: addr.to_string(), source })?;
        let id = self.ids.next();
        let (tx, rx) = unbounded();
        let connections = Arc::clone(&self.connections);
        let pending_receivers = Arc::clone(&self.pending_receivers);
        let sender = tx;

        std::thread::Builder::new()
            .name(format!("reactor-listen-{}", id.get()))
            .spawn(move || {
                for accepted in listener.incoming() {
                    let Ok(stream) = accepted else { break };
                    let _ = stream.set_read_timeout(Some(READER_POLL_INTERVAL));
                    let child_id = register_child(&connections, &pending_receivers, stream);
                    if sender.send(Event::Accepted { child: child_id }).is_err() {
                        break;
                    }
                }
            })
            .expect("failed to spawn listen thread");

        Ok((id, bound_addr, rx))
    }

    /// Returns the [`Receiver`] for a socket that was registered outside
    /// [`Self::connect`]/[`Self::listen`] (for instance, one wrapped in a
    /// TLS or MODE-Z filter by a higher layer after the base connection
    /// already completed). The caller is responsible for constructing the
    /// final [`Transport`] stack; this just starts the reader thread.
    #[must_use]
    pub fn register(&self, transport: Box<dyn Transport>) -> (SocketId, Receiver<Event>) {
        let id = self.ids.next();
        let (tx, rx) = unbounded();
        register_and_run(&self.connections, id, transport, tx, false);
        (id, rx)
    }

    /// Queues `bytes` for writing on `id`. Blocks until the write
    /// completes at the OS level (this reactor is thread-backed, not
    /// non-blocking); emits [`Event::Writable`] on that socket's channel
    /// once done, per spec.md §4.2.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::UnknownSocket`] if `id` is not registered,
    /// or [`ReactorError::Io`] if the write fails.
    pub fn send(&self, id: SocketId, bytes: &[u8]) -> Result<(), ReactorError> {
        let connection = self.connections.get(&id).ok_or(ReactorError::UnknownSocket(id))?;
        if connection.closing.load(Ordering::SeqCst) {
            return Err(ReactorError::AlreadyClosed(id));
        }
        let mut transport = connection.transport.lock().expect("transport mutex poisoned");
        transport.write_all(bytes).map_err(|source| ReactorError::Io { id, source })?;
        transport.flush().map_err(|source| ReactorError::Io { id, source })?;
        drop(transport);
        let _ = connection.events.send(Event::Writable);
        Ok(())
    }

    /// Flushes and half-closes `id`. The reader thread observes the
    /// resulting EOF (or the `closing` flag, whichever comes first) and
    /// posts a final [`Event::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::UnknownSocket`] if `id` is not registered.
    pub fn close_graceful(&self, id: SocketId) -> Result<(), ReactorError> {
        let connection = self.connections.get(&id).ok_or(ReactorError::UnknownSocket(id))?;
        connection.closing.store(true, Ordering::SeqCst);
        let mut transport = connection.transport.lock().expect("transport mutex poisoned");
        let _ = transport.flush();
        Ok(())
    }

    /// Replaces `id`'s transport in place, handing the current one to
    /// `upgrade` and installing whatever it returns. Used by `control` to
    /// layer TLS (and later MODE-Z) onto an already-registered control or
    /// data socket without tearing down its reader thread.
    ///
    /// The swap happens under the connection's transport lock, so the
    /// reader thread either observes the old transport or the new one,
    /// never a torn state; rustls' `StreamOwned` performs its handshake
    /// lazily on the first read/write, so no separate handshake-pumping
    /// step is needed here.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::UnknownSocket`] if `id` is not registered.
    pub fn upgrade_transport<F>(&self, id: SocketId, upgrade: F) -> Result<(), ReactorError>
    where
        F: FnOnce(Box<dyn Transport>) -> Box<dyn Transport>,
    {
        let connection = self.connections.get(&id).ok_or(ReactorError::UnknownSocket(id))?;
        let mut transport = connection.transport.lock().expect("transport mutex poisoned");
        let placeholder: Box<dyn Transport> = Box::new(io::Cursor::new(Vec::<u8>::new()));
        let current = std::mem::replace(&mut *transport, placeholder);
        *transport = upgrade(current);
        Ok(())
    }

    /// Arms a timer that posts [`Event::Timer`] on `id`'s channel after
    /// `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::UnknownSocket`] if `id` is not registered.
    pub fn set_timer(&self, id: SocketId, timer: TimerId, delay: Duration) -> Result<(), ReactorError> {
        let connection = self.connections.get(&id).ok_or(ReactorError::UnknownSocket(id))?;
        self.timers.set(timer, delay, connection.events.clone());
        Ok(())
    }

    /// Cancels a previously armed timer. A no-op if it already fired or
    /// was never armed.
    pub fn cancel_timer(&self, timer: TimerId) {
        self.timers.cancel(timer);
    }

    /// Claims the event [`Receiver`] for a socket [`Self::listen`]
    /// accepted, as announced by that listener's [`Event::Accepted`].
    /// Returns `None` if `child` is unknown or has already been claimed,
    /// so a caller that raced another claimant (or retried after a
    /// timeout) does not get a second receiver for the same socket.
    #[must_use]
    pub fn claim_accepted(&self, child: SocketId) -> Option<Receiver<Event>> {
        self.pending_receivers.remove(&child).map(|(_, rx)| rx)
    }
}

fn register_child(
    connections: &Arc<DashMap<SocketId, Arc<Connection>>>,
    pending_receivers: &Arc<DashMap<SocketId, Receiver<Event>>>,
    stream: TcpStream,
) -> SocketId {
    static CHILD_IDS: std::sync::OnceLock<SocketIdAllocator> = std::sync::OnceLock::new();
    let id = CHILD_IDS.get_or_init(SocketIdAllocator::default).next();
    let (tx, rx) = unbounded();
    pending_receivers.insert(id, rx);
    let transport: Box<dyn Transport> = Box::new(TcpTransport::new(stream));
    register_and_run(connections, id, transport, tx, false);
    id
}

/// Inserts a new [`Connection`] and spawns its reader loop. When
/// `announce_connected` is set, posts [`Event::Connected{ok: true}`]
/// before entering the read loop (the `connect` path); `listen`/`register`
/// callers skip this since there is no pending-connect event to resolve.
fn register_and_run(
    connections: &Arc<DashMap<SocketId, Arc<Connection>>>,
    id: SocketId,
    transport: Box<dyn Transport>,
    events: Sender<Event>,
    announce_connected: bool,
) {
    let connection = Arc::new(Connection { transport: Mutex::new(transport), events: events.clone(), closing: AtomicBool::new(false) });
    connections.insert(id, Arc::clone(&connection));

    if announce_connected {
        let _ = events.send(Event::Connected { ok: true, err: None });
    }

    let connections = Arc::clone(connections);
    std::thread::Builder::new()
        .name(format!("reactor-read-{}", id.get()))
        .spawn(move || reader_loop(id, &connection, &connections))
        .expect("failed to spawn reader thread");
}

fn reader_loop(id: SocketId, connection: &Arc<Connection>, connections: &Arc<DashMap<SocketId, Arc<Connection>>>) {
    let mut buf = [0u8; 64 * 1024];
    loop {
        if connection.closing.load(Ordering::SeqCst) {
            let _ = connection.events.send(Event::Closed { err: None });
            connections.remove(&id);
            return;
        }

        let read_result = {
            let mut transport = connection.transport.lock().expect("transport mutex poisoned");
            transport.read(&mut buf)
        };

        match read_result {
            Ok(0) => {
                let _ = connection.events.send(Event::Closed { err: None });
                connections.remove(&id);
                return;
            }
            Ok(n) => {
                let _ = connection.events.send(Event::BytesRead { data: buf[..n].to_vec() });
            }
            Err(error) if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(error) => {
                let _ = connection.events.send(Event::Closed { err: Some(error.to_string()) });
                connections.remove(&id);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::time::Duration;

    #[test]
    fn connect_reports_success_against_a_loopback_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let _ = listener.accept();
        });

        let reactor = Reactor::new();
        let (_id, rx) = reactor.connect(addr);
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, Event::Connected { ok: true, .. }));
    }

    #[test]
    fn connect_reports_failure_for_a_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reactor = Reactor::new();
        let (_id, rx) = reactor.connect(addr);
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, Event::Connected { ok: false, .. }));
    }

    #[test]
    fn send_and_receive_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"220 ready\r\n").unwrap();
        });

        let reactor = Reactor::new();
        let (id, rx) = reactor.connect(addr);
        assert!(matches!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Event::Connected { ok: true, .. }));

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            Event::BytesRead { data } => assert_eq!(&data, b"220 ready\r\n"),
            other => panic!("unexpected event: {other:?}"),
        }

        reactor.send(id, b"NOOP\r\n").unwrap();
        server.join().unwrap();
    }

    #[test]
    fn timer_fires_on_the_sockets_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let _ = listener.accept();
        });

        let reactor = Reactor::new();
        let (id, rx) = reactor.connect(addr);
        assert!(matches!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Event::Connected { ok: true, .. }));

        reactor.set_timer(id, TimerId(7), Duration::from_millis(20)).unwrap();
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, Event::Timer(TimerId(7))));
    }
}
