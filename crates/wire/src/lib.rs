#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `wire` is the lowest layer of the FTP engine: it turns [`command::Command`]
//! values into the exact bytes a control connection writes, and turns bytes
//! read off that connection back into [`reply::Reply`] values. It also holds
//! the small amount of server-dialect knowledge the rest of the engine needs
//! to talk to something other than a stock Unix `vsftpd`:
//!
//! - [`reply`] — multi-line reply framing and `1xx`–`5xx` classification.
//! - [`command`] — canonical command formatting, with password redaction
//!   for the log-facing copy.
//! - [`addr`] — `PASV`/`EPSV` reply address parsing.
//! - [`pwd`] — `257` reply path parsing, quoted and unquoted.
//! - [`path`] — per-[`path::PathType`] component arithmetic (`append`,
//!   `cut_last`, `is_prefix`, `is_same`, validity, VMS and AS/400 naming).
//! - [`server_family`] — guesses a [`path::PathType`] from a greeting and a
//!   `SYST` reply.
//!
//! # Design
//!
//! Every function here is pure: no sockets, no clocks, no global state.
//! Higher layers own buffering and I/O; this crate only knows how to go
//! from bytes to typed values and back. Parsing works on raw bytes rather
//! than `&str` where a server might emit non-UTF-8 path bytes, falling back
//! to lossy decoding only at the edges that exist for human consumption
//! (logging, error messages).
//!
//! # Invariants
//!
//! - [`reply::parse_reply`] never returns a partial reply: it either
//!   returns a fully framed [`reply::Reply`] and the byte count it
//!   consumed, or `None` requesting more bytes.
//! - [`command::format`] always CRLF-terminates its output, matching RFC
//!   959 §3.3 regardless of the host platform's line-ending convention.
//! - Path arithmetic in [`path`] never allocates an interpretation of a
//!   component that failed [`path::is_valid_component`]; callers must
//!   validate before composing a command argument from user input.
//!
//! # Errors
//!
//! Fallible operations return [`error::WireError`], one variant per
//! recognised failure mode. This crate never panics on malformed server
//! input; a struggling or misbehaving server produces an `Err`, not a
//! crash.
//!
//! # Examples
//!
//! ```
//! use wire::command::{format, Command};
//! use wire::reply::parse_reply;
//!
//! let formatted = format(&Command::Pwd);
//! assert_eq!(formatted.wire, b"PWD\r\n");
//!
//! let (reply, _) = parse_reply(b"257 \"/pub\" is current directory\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(reply.code(), 257);
//! ```
//!
//! # See also
//!
//! - `control` for the state machine that drives commands through this
//!   codec over an actual socket.
//! - `dataconn` for how a [`path::PathType`] decision informs ASCII/binary
//!   transfer handling.

pub mod addr;
pub mod command;
pub mod error;
pub mod path;
pub mod pwd;
pub mod reply;
pub mod server_family;
pub mod transfer_mode;

pub use command::{format, Command, FormattedCommand};
pub use error::WireError;
pub use path::PathType;
pub use reply::{parse_reply, Reply, ReplyClass};
pub use transfer_mode::TransferMode;
