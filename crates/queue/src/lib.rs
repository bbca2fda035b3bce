#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `queue` is the FTP engine's L6 component: the item table an operation's
//! workers pull from, per spec.md §4.6. It tracks each item's lifecycle
//! ([`ItemState`]), the closed set of reasons an item can stop making
//! progress ([`ProblemId`]), and the parent/child accounting a directory
//! expansion needs to know when it (and its ancestors) are actually
//! finished.
//!
//! # Design
//!
//! [`Queue`] wraps a single `std::sync::RwLock` around a flat item table
//! keyed by [`Uid`]; there is no per-item locking; contention is expected
//! to be low since most work happens off the lock (network I/O, disk
//! I/O) and only bookkeeping calls take it. [`lock_order`] gives the rest
//! of the engine a way to assert, in debug builds, that locks are always
//! acquired in the `Worker < Queue < Operation` order spec.md mandates —
//! the two outer levels (`Socket`, `SocketsThread`) belong to `reactor`
//! and never nest with this crate's locks.
//!
//! # Invariants
//!
//! - For every explore-parent item, `NotDone + Done + Skipped + Failed =
//!   ChildCount` and `UserInputNeeded <= NotDone` hold after every
//!   mutating call, checked with `debug_assert!` in
//!   [`Queue::update_state`].
//! - An item only reaches [`ItemState::UserInputNeeded`] with a non-[`
//!   ProblemId::Ok`] problem id attached, and only leaves it through
//!   [`Queue::update_force_action`].
//!
//! # Errors
//!
//! Every fallible [`Queue`] method returns [`QueueError`], distinguishing
//! an unknown uid from a structurally invalid request (e.g. treating a
//! leaf item as a parent).
//!
//! # Examples
//!
//! ```
//! use queue::{ItemKind, ItemState, Queue};
//!
//! let queue = Queue::new();
//! let parent = queue.add_item(None, ItemKind::UploadCopyExploreDir, "/local", "dir").unwrap();
//! let child = queue.add_item(Some(parent), ItemKind::UploadCopyFile, "/local/dir", "a.txt").unwrap();
//! queue.update_state(child, ItemState::Done).unwrap();
//! assert_eq!(queue.get_item(child).unwrap().state, ItemState::Done);
//! ```
//!
//! # See also
//!
//! - `scheduler` for the worker state machine that drives items through
//!   this queue.
//! - `engine` for the facade that turns [`ProblemId`]-bearing items into
//!   decisions surfaced to a caller.

mod item;
mod lock_order;
mod problem;
mod queue;

pub use item::{ChildCounters, ForceAction, Item, ItemKind, ItemState, TgtDirState, Uid, UidAllocator};
pub use lock_order::{enter, LockGuard, LockLevel};
pub use problem::ProblemId;
pub use queue::{ItemSnapshot, Queue, QueueError};
