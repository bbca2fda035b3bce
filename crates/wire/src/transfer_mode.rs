//! The `TYPE` command's two data representations.

use std::fmt;

/// Whether a transfer runs in ASCII (`TYPE A`) or binary/image (`TYPE I`)
/// representation. Cached on the control connection (spec.md §3) and
/// threaded through the disk worker pool's file jobs and the data
/// connection's pipelines, which both need to know whether line-ending
/// normalisation applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransferMode {
    /// `TYPE A`: newline translation applies (LF on the wire, the local
    /// platform's convention on disk, or vice versa on upload).
    Ascii,
    /// `TYPE I`: bytes pass through unmodified.
    Binary,
}

impl TransferMode {
    /// Returns the `TYPE` command's single-letter code.
    #[must_use]
    pub const fn type_code(self) -> char {
        match self {
            Self::Ascii => 'A',
            Self::Binary => 'I',
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => f.write_str("ASCII"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_match_ftp_protocol_letters() {
        assert_eq!(TransferMode::Ascii.type_code(), 'A');
        assert_eq!(TransferMode::Binary.type_code(), 'I');
    }
}
