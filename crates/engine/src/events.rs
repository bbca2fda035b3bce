//! The public event stream an [`crate::Operation`] emits, and the
//! aggregate [`OperationState`] its last event always reflects, spec.md
//! §3/§7.

use queue::{ProblemId, Uid};
use scheduler::worker::ProgressSnapshot;

/// The aggregate outcome of an operation, spec.md §3's closed
/// `OperationState` enumeration. Deliberately has no `Cancelled` variant:
/// [`crate::Operation::cancel`] sweeps every non-terminal item to
/// `Failed`, so a cancelled operation still settles into
/// `FinishedWithErrors`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationState {
    /// At least one item is still `Waiting`, `Processing`, or
    /// `UserInputNeeded`.
    InProgress,
    /// Every item reached a terminal state; at least one was `Skipped`
    /// and none `Failed`.
    FinishedWithSkips,
    /// Every item reached a terminal state; at least one was `Failed`.
    FinishedWithErrors,
    /// Every item reached a terminal state as `Done`.
    SuccessfullyFinished,
}

impl OperationState {
    /// Derives the aggregate state from a full set of item snapshots,
    /// spec.md §3's aggregation rule: `Failed` beats `Skipped`/`ForcedToFail`
    /// beats `Done`, and any non-terminal item keeps the whole operation
    /// `InProgress`.
    #[must_use]
    pub fn aggregate(items: &[queue::ItemSnapshot]) -> Self {
        use queue::ItemState;

        let mut any_failed = false;
        let mut any_skipped = false;
        for item in items {
            match item.state {
                ItemState::Waiting | ItemState::Processing | ItemState::UserInputNeeded => {
                    return Self::InProgress;
                }
                ItemState::Failed => any_failed = true,
                ItemState::Skipped | ItemState::ForcedToFail => any_skipped = true,
                ItemState::Done => {}
            }
        }
        if any_failed {
            Self::FinishedWithErrors
        } else if any_skipped {
            Self::FinishedWithSkips
        } else {
            Self::SuccessfullyFinished
        }
    }

    /// Returns whether this state is terminal: no further item can move
    /// and no new events follow besides this one.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// One message on an operation's [`crossbeam_channel::Receiver<EngineEvent>`],
/// spec.md §7's progress/decision/completion stream.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// A progress update: bytes and item counts since the operation started.
    Progress(ProgressSnapshot),
    /// An item needs a user decision before it, and anything waiting on
    /// it, can proceed.
    NeedsDecision {
        /// The item awaiting resolution.
        item_uid: Uid,
        /// Why it stopped.
        problem_id: ProblemId,
        /// A free-form description, if the failure supplied one.
        detail: Option<String>,
    },
    /// The operation reached a terminal [`OperationState`]. The last
    /// event an operation ever emits.
    Completed(OperationState),
}
