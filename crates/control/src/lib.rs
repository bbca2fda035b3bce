#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `control` is the FTP engine's L4 component: [`ControlConnection`], the
//! per-session command/reply state machine spec.md §4.4 describes. It owns
//! the greeting/authenticate/negotiate sequence, the cached working
//! directory and transfer mode, keep-alive suspend/resume, passive/active
//! data-channel negotiation, and the reconnect-with-backoff policy.
//!
//! # Design
//!
//! One [`ControlConnection`] is owned by exactly one worker and driven
//! from a single thread (spec.md §5's "per-connection state owned by its
//! worker"). It is built on a [`reactor::Reactor`] socket: every command
//! is a synchronous send-then-wait-for-reply exchange, never pipelined,
//! matching spec.md §5's ordering guarantee. [`ControlError`] buckets
//! every failure into the four propagation classes spec.md §7 names, so
//! callers (`scheduler`) decide retry/reconnect policy by matching on the
//! bucket rather than inspecting strings.
//!
//! # Invariants
//!
//! - [`ControlConnection::send_command`] only succeeds when the
//!   connection is [`ControlState::Idle`]; it leaves the connection back
//!   in `Idle` on both success and failure.
//! - Reconnect backoff resets to its base on a successful
//!   [`ControlConnection::ensure_connected`] and is skipped entirely when
//!   the previous failure was [`ControlError::CertificateFatal`].
//!
//! # Errors
//!
//! Every fallible method returns [`ControlError`], whose
//! [`ControlError::is_retryable`] and
//! [`ControlError::forces_immediate_reconnect`] distinguish the policy a
//! caller should apply.
//!
//! # Examples
//!
//! ```no_run
//! use control::{CancelToken, ControlConnection, Endpoint};
//! use logging::{LogUidAllocator, NullSink};
//! use reactor::Reactor;
//! use std::sync::Arc;
//!
//! let reactor = Arc::new(Reactor::new());
//! let endpoint = Endpoint::new("127.0.0.1:21".parse().unwrap(), "anonymous", "guest");
//! let allocator = LogUidAllocator::default();
//! let mut connection = ControlConnection::new(reactor, endpoint, allocator.next(), Arc::new(NullSink));
//! let cancel = CancelToken::new();
//! let _ = connection.ensure_connected(&cancel);
//! ```
//!
//! # See also
//!
//! - `dataconn` for the transient data connections this layer negotiates.
//! - `scheduler` for the worker loop that owns and retries a
//!   [`ControlConnection`].

mod connection;
mod endpoint;
mod error;
mod reply_outcome;
mod state;

pub use connection::{
    ChangeDirOutcome, ControlConnection, DataChannelMode, DataChannelPlan, EnsureConnectedOutcome,
    DEFAULT_REPLY_TIMEOUT, KEEP_ALIVE_PERIOD, RECONNECT_WAIT_CAP,
};
pub use endpoint::Endpoint;
pub use error::ControlError;
pub use reply_outcome::ReplyOutcome;
pub use state::{CancelToken, ControlState, KeepAliveState};
