//! Socket and timer identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The identifier a caller registers a socket under and receives events
/// tagged with. Never reused within a process lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SocketId(u64);

impl SocketId {
    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// Allocates monotonically increasing [`SocketId`]s.
#[derive(Debug, Default)]
pub struct SocketIdAllocator {
    next: AtomicU64,
}

impl SocketIdAllocator {
    /// Returns the next unused [`SocketId`].
    pub fn next(&self) -> SocketId {
        SocketId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// The identifier a caller picks for [`crate::Reactor::set_timer`] and
/// [`crate::Reactor::cancel_timer`]. Unlike [`SocketId`] these are caller
/// chosen, not allocated, since a caller typically wants a well-known
/// timer per purpose (e.g. one "no-data-transfer" timer per data
/// connection).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_repeats() {
        let allocator = SocketIdAllocator::default();
        let a = allocator.next();
        let b = allocator.next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
