//! Lock-ordering discipline for the locks this crate and its callers take
//! together, enforced in debug builds via a thread-local stack.
//!
//! spec.md §4.6 names a five-level global order —
//! `Socket < SocketsThread < Worker < Queue < Operation` — so that no two
//! threads can deadlock by acquiring two of these locks in opposite
//! order. The `Socket` and `SocketsThread` levels live in `reactor` and
//! are structurally never held while a `queue` lock is acquired (the
//! reactor hands events off through channels rather than calling back
//! into the queue), so this module only tracks the three levels that can
//! actually nest here.

use std::cell::RefCell;
use std::fmt;

/// A lock level in the enforced ordering. Variant order is the
/// acquisition order: a thread holding [`LockLevel::Queue`] may go on to
/// acquire [`LockLevel::Operation`], but never [`LockLevel::Worker`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum LockLevel {
    /// A single worker's own state (its current item, pause/stop flags).
    Worker,
    /// The shared queue (item table and parent counters).
    Queue,
    /// The operation-wide state (aggregate progress, subscriber list).
    Operation,
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

thread_local! {
    static HELD: RefCell<Vec<LockLevel>> = const { RefCell::new(Vec::new()) };
}

/// Marks `level` as acquired by the current thread, panicking if doing so
/// would violate the ordering (i.e. a higher or equal level is already
/// held). Returns a [`LockGuard`] that releases the marker on drop.
///
/// Only active in debug builds; a release build's [`enter`] is a no-op
/// that still returns a guard, so call sites don't need `cfg` guards.
#[must_use]
pub fn enter(level: LockLevel) -> LockGuard {
    if cfg!(debug_assertions) {
        HELD.with(|held| {
            let held = held.borrow();
            if let Some(&top) = held.last() {
                assert!(
                    top < level,
                    "lock order violation: attempted to acquire {level} while holding {top}"
                );
            }
        });
        HELD.with(|held| held.borrow_mut().push(level));
    }
    LockGuard { level, active: cfg!(debug_assertions) }
}

/// RAII marker returned by [`enter`]; releasing it out of order (e.g.
/// dropping an inner guard while an outer one is still held) panics.
#[derive(Debug)]
pub struct LockGuard {
    level: LockLevel,
    active: bool,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            let popped = held.pop();
            if !std::thread::panicking() {
                assert_eq!(popped, Some(self.level), "lock guards released out of acquisition order");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_acquisition_in_order_succeeds() {
        let _queue = enter(LockLevel::Queue);
        let _operation = enter(LockLevel::Operation);
    }

    #[test]
    #[should_panic(expected = "lock order violation")]
    fn out_of_order_acquisition_panics() {
        let _operation = enter(LockLevel::Operation);
        let _queue = enter(LockLevel::Queue);
    }

    #[test]
    fn guards_release_in_reverse_order() {
        let queue = enter(LockLevel::Queue);
        let operation = enter(LockLevel::Operation);
        drop(operation);
        drop(queue);
    }

    #[test]
    #[should_panic(expected = "out of acquisition order")]
    fn releasing_out_of_order_panics() {
        let queue = enter(LockLevel::Queue);
        let operation = enter(LockLevel::Operation);
        drop(queue);
        drop(operation);
    }
}
