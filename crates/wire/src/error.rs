//! Errors raised while framing or parsing the FTP wire protocol.

use std::fmt;

/// A three-digit reply code that did not parse as one, for error reporting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MalformedCode(pub Vec<u8>);

impl fmt::Display for MalformedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Errors the wire codec can report. Every layer above this one classifies
/// these into the propagation buckets from the error-handling design rather
/// than matching on variants directly.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A reply line did not start with a three-digit code.
    #[error("malformed reply code: {0}")]
    MalformedReplyCode(MalformedCode),

    /// A multi-line reply's continuation never terminated before the
    /// caller ran out of buffered bytes.
    #[error("unterminated multi-line reply (expected final line beginning `{0} `)")]
    UnterminatedContinuation(String),

    /// A `PASV`/`EPSV` reply did not contain a recognisable address.
    #[error("could not parse passive-mode address from reply: {0}")]
    MalformedPasvReply(String),

    /// A `257` reply did not contain a recognisable path.
    #[error("could not parse path from 257 reply: {0}")]
    MalformedPwdReply(String),

    /// A path component was invalid for the given path type (contained a
    /// reserved separator, was empty, or otherwise could not be
    /// represented in that server family's naming scheme).
    #[error("invalid path component {component:?} for path type {path_type}")]
    InvalidPathComponent {
        /// The offending component.
        component: String,
        /// The path type it was rejected under.
        path_type: String,
    },
}
