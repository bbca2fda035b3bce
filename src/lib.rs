#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `ftp_engine` is the umbrella crate a host application depends on: it
//! re-exports [`engine`], the FTP engine's public facade, so the rest of
//! the workspace's layer crates (`wire`, `reactor`, `diskpool`, `control`,
//! `dataconn`, `queue`, `scheduler`, `logging`) never need to appear in a
//! downstream `Cargo.toml` directly. The end-to-end scenario tests
//! exercising the whole stack against an in-process server double live
//! under the `engine` crate's own `tests/` directory, one file per
//! scenario, since `engine` is the layer that already wires every other
//! crate together.
//!
//! # See also
//!
//! - [`engine`] for the facade itself: [`engine::engine_start`],
//!   [`engine::Engine::create_operation`], and the per-operation
//!   [`engine::EngineEvent`] stream.

pub use engine::*;
