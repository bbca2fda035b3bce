//! [`EngineError`]: the single error type [`crate::engine_start`] and
//! [`crate::Engine::create_operation`] can fail with. Mid-operation
//! failures never surface here — they travel through an item's
//! [`queue::ItemState::UserInputNeeded`] state plus the
//! [`crate::events::EngineEvent::NeedsDecision`] stream instead, per
//! spec.md §7's "errors after an operation starts are not exceptions".

use control::ControlError;
use queue::QueueError;

/// Failures possible while starting the engine or creating an operation,
/// before any worker has begun processing items.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The probe connection used to detect the root path's server family
    /// and file/directory shape failed.
    #[error("could not reach {0}: {1}")]
    Connect(std::net::SocketAddr, #[source] ControlError),

    /// A local root path (for an upload or upload-move operation) does
    /// not exist or is not readable.
    #[error("local root {0:?} is not accessible: {1}")]
    LocalRoot(std::path::PathBuf, #[source] std::io::Error),

    /// An `ascii_mask`/`masks` glob pattern in [`crate::config::EngineConfig`]
    /// or [`crate::config::OperationRequest`] failed to compile.
    #[error("invalid glob pattern: {0}")]
    InvalidMask(#[from] globset::Error),

    /// Seeding the operation's root item into its queue failed (should
    /// not happen against a freshly created, empty queue; kept so
    /// [`queue::Queue::add_item`]'s `Result` is never silently discarded).
    #[error("could not seed operation queue: {0}")]
    Queue(#[from] QueueError),

    /// [`crate::config::EngineConfig`] or a [`crate::config::OperationRequest`]
    /// failed to deserialize from its configured format.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
