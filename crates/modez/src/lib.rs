#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `modez` implements the deflate stream used by FTP's `MODE Z` extension
//! (RFC-less, but universally implemented as raw zlib deflate framing around
//! the data-connection byte stream). A download pipeline runs bytes through
//! [`zlib::CountingZlibDecoder`] before handing them to ASCII normalisation
//! and the flush buffer; an upload pipeline runs bytes through
//! [`zlib::CountingZlibEncoder`] before they reach the socket.
//!
//! # Design
//!
//! The [`zlib`] module implements streaming-friendly encoders/decoders over
//! [`flate2`](https://docs.rs/flate2). Byte counters on both sides let the
//! data connection report compressed-vs-decompressed totals without
//! buffering the whole transfer in memory.
//!
//! # Invariants
//!
//! - Encoders and decoders never allocate internal output buffers; output is
//!   written into caller-provided sinks/vectors so the data connection can
//!   reuse its flush buffers across files.
//! - A missing stream terminator on `finish`/EOF is not itself treated as an
//!   error here — some servers (Serv-U among them) omit it. Callers that care
//!   about a clean terminator check [`zlib::CountingZlibDecoder::bytes_read`]
//!   against the expected total size and decide whether to warn.
//!
//! # Errors
//!
//! Encoder/decoder functions return [`std::io::Result`]; zlib-level failures
//! are surfaced through [`std::io::Error`].
//!
//! # Examples
//!
//! ```
//! use modez::zlib::{CompressionLevel, CountingZlibEncoder, compress_to_vec, decompress_to_vec};
//!
//! # fn main() -> std::io::Result<()> {
//! let data = b"streaming example payload";
//! let mut encoder = CountingZlibEncoder::new(CompressionLevel::Default);
//! encoder.write(data)?;
//! let compressed_len = encoder.finish()?;
//! assert!(compressed_len > 0);
//!
//! let compressed = compress_to_vec(data, CompressionLevel::Default)?;
//! let decompressed = decompress_to_vec(&compressed)?;
//! assert_eq!(decompressed, data);
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - [`zlib`] for the encoder/decoder API surface.
//! - `dataconn` for the pipeline that wraps these types around a socket.

mod common;
pub mod zlib;

pub use common::CountingSink;
