#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` is the FTP engine's public facade, spec.md §6/§9: the one
//! entry point a host application (or this workspace's own `ftp_engine`
//! binary crate) touches. It composes every lower layer —
//! `wire`/`reactor`/`diskpool`/`control`/`dataconn`/`queue`/`scheduler` —
//! behind [`Engine`], [`EngineConfig`], and [`Operation`], replacing the
//! source's process-wide singletons (spec.md §9's "Global singletons ...
//! replaced by an `Engine` value") with one explicitly threaded value.
//!
//! # Design
//!
//! [`engine_start`] builds one shared [`reactor::Reactor`] and
//! [`diskpool::DiskPool`]; [`Engine::create_operation`] seeds a fresh
//! [`queue::Queue`] with a root item (probing the server for the root's
//! path-type and file/directory shape, or splitting a local upload root)
//! and hands it to a new [`Operation`], which owns its worker pool and a
//! monitor thread translating queue state into an [`events::EngineEvent`]
//! stream. Mid-operation failures never return through a `Result`: per
//! spec.md §9's "callback-style UI integration ... re-expressed as an
//! event stream", they park the affected item in
//! [`queue::ItemState::UserInputNeeded`] and surface as
//! [`events::EngineEvent::NeedsDecision`], resolved later by
//! [`Operation::resolve_error`].
//!
//! # Invariants
//!
//! - [`Engine::create_operation`] never returns an [`Operation`] with a
//!   queue seeded from anything but exactly one root item.
//! - An [`Operation`]'s monitor thread sends exactly one
//!   [`events::EngineEvent::Completed`], its last event, once every item
//!   has reached a terminal [`queue::ItemState`].
//!
//! # Errors
//!
//! [`EngineError`] is the single error type [`engine_start`] and
//! [`Engine::create_operation`] can fail with; everything after that
//! point travels through the event stream instead.
//!
//! # Examples
//!
//! ```no_run
//! use engine::config::{EndpointConfig, EngineConfig, OperationRequest};
//! use engine::{engine_start, EngineEvent};
//! use scheduler::worker::OperationKind;
//!
//! let engine = engine_start(EngineConfig::default()).unwrap();
//! let request = OperationRequest {
//!     kind: OperationKind::CopyDownload,
//!     endpoint: EndpointConfig {
//!         addr: "127.0.0.1:21".parse().unwrap(),
//!         user: "anonymous".into(),
//!         password: "guest".into(),
//!         encrypt_control: None,
//!     },
//!     local_root: std::env::temp_dir(),
//!     remote_root: "/incoming/report.csv".into(),
//!     policies: scheduler::policy::ConflictPolicies::default(),
//!     unix_mode: None,
//!     masks: Vec::new(),
//!     ascii_mask: Vec::new(),
//!     transfer_mode_default: scheduler::mask::TransferModeDefault::default(),
//!     initial_workers: Some(1),
//! };
//! if let Ok(operation) = engine.create_operation(request) {
//!     let events = operation.subscribe();
//!     for event in events.iter() {
//!         if let EngineEvent::Completed(state) = event {
//!             println!("finished: {state:?}");
//!             break;
//!         }
//!     }
//! }
//! ```
//!
//! # See also
//!
//! - `scheduler` for the worker loop each operation's threads run.
//! - `queue` for the item table [`Operation::resolve_error`] mutates.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod operation;

pub use engine::{engine_start, Engine, OperationId};
pub use error::EngineError;
pub use events::{EngineEvent, OperationState};
pub use operation::Operation;
