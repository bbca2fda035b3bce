//! The control connection's outer state machine and keep-alive sub-state
//! (spec.md §4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The control connection's state, per spec.md §4.4:
/// `Disconnected -> Connecting -> Greeting -> Authenticating ->
/// Negotiating -> TlsUpgrading? -> Idle -> Commanding -> AwaitingReply ->
/// (Idle|DataTransfer|Disconnected)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ControlState {
    /// No socket; nothing in flight.
    Disconnected,
    /// A connect attempt is outstanding.
    Connecting,
    /// Waiting for the server's `220` greeting.
    Greeting,
    /// `USER`/`PASS`/`ACCT` exchange in progress.
    Authenticating,
    /// `FEAT`/`SYST`/`OPTS UTF8 ON` in progress.
    Negotiating,
    /// `AUTH TLS`/`PBSZ`/`PROT` handshake in progress.
    TlsUpgrading,
    /// Connected, authenticated, nothing in flight; keep-alive may fire.
    Idle,
    /// A command has been written; awaiting the reactor's `Writable`.
    Commanding,
    /// A command was sent; waiting for its reply to finish parsing.
    AwaitingReply,
    /// A data connection owned by this control connection is open.
    DataTransfer,
}

impl ControlState {
    /// Whether a worker may call [`crate::ControlConnection::send_command`]
    /// from this state without first calling `ensure_connected`.
    #[must_use]
    pub const fn is_ready_for_command(self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Keep-alive's own sub-state: suspended while a real command is in
/// flight or a data connection is open, otherwise active and eligible to
/// fire its periodic `NOOP`/`PWD`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum KeepAliveState {
    /// Eligible to fire when its timer elapses.
    Active,
    /// Will not fire; resumed once the suspending condition clears.
    Suspended,
}

/// Shared, cooperative cancellation flag passed down into
/// [`crate::ControlConnection::ensure_connected`] and
/// [`crate::ControlConnection::send_command`], matching spec.md §5's
/// `ShouldStop` cooperative-cancellation model. Cheap to clone; every
/// clone observes the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn only_idle_is_ready_for_command() {
        assert!(ControlState::Idle.is_ready_for_command());
        assert!(!ControlState::AwaitingReply.is_ready_for_command());
        assert!(!ControlState::Disconnected.is_ready_for_command());
    }
}
