//! ASCII (`TYPE A`) newline translation and the ASCII-for-binary heuristic.
//!
//! RFC 959's `TYPE A` representation carries text as CRLF-terminated
//! lines on the wire, translated to the local platform's convention on
//! disk (and back, on upload). A server or client misconfigured into
//! ASCII mode for a binary file corrupts it silently unless something
//! notices; spec.md §8 fixes the heuristic this module implements: a
//! single embedded `NUL` byte, or a `CR` not immediately followed by
//! `LF`, is treated as proof the stream is not really text.

/// Scans `chunk` for a byte sequence that should never appear in a
/// genuine ASCII-mode transfer: an embedded `NUL`, or a `CR` that is not
/// immediately followed by `LF`.
///
/// Per spec.md §8, a single occurrence is enough to flag the transfer;
/// callers latch this permanently for the rest of the transfer rather
/// than re-checking every chunk once it has fired once.
#[must_use]
pub fn is_ascii_tr_for_bin_file_problem(chunk: &[u8]) -> bool {
    let mut i = 0;
    while i < chunk.len() {
        match chunk[i] {
            0 => return true,
            b'\r' if chunk.get(i + 1) != Some(&b'\n') => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

/// Translates wire-form CRLF line endings to the local platform's
/// convention (bare `LF`) for a download's ascii-normalize stage.
///
/// A lone `CR` that survived [`is_ascii_tr_for_bin_file_problem`]'s check
/// (i.e. one immediately followed by `LF`, which is the normal case) is
/// simply dropped along with its paired `LF` becoming a single `\n`.
#[must_use]
pub fn wire_to_local(chunk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len());
    let mut i = 0;
    while i < chunk.len() {
        if chunk[i] == b'\r' && chunk.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(chunk[i]);
            i += 1;
        }
    }
    out
}

/// Translates local `LF` line endings to wire-form CRLF for an upload's
/// ascii-normalize stage.
#[must_use]
pub fn local_to_wire(chunk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len());
    for &byte in chunk {
        if byte == b'\n' {
            out.push(b'\r');
        }
        out.push(byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_not_flagged() {
        assert!(!is_ascii_tr_for_bin_file_problem(b"hello\r\nworld\r\n"));
    }

    #[test]
    fn embedded_nul_is_flagged() {
        assert!(is_ascii_tr_for_bin_file_problem(b"hello\0world"));
    }

    #[test]
    fn lone_cr_is_flagged() {
        assert!(is_ascii_tr_for_bin_file_problem(b"hello\rworld"));
    }

    #[test]
    fn cr_at_end_of_chunk_without_following_lf_is_flagged() {
        assert!(is_ascii_tr_for_bin_file_problem(b"hello\r"));
    }

    #[test]
    fn wire_to_local_collapses_crlf_to_lf() {
        assert_eq!(wire_to_local(b"a\r\nb\r\n"), b"a\nb\n");
    }

    #[test]
    fn local_to_wire_expands_lf_to_crlf() {
        assert_eq!(local_to_wire(b"a\nb\n"), b"a\r\nb\r\n");
    }

    #[test]
    fn round_trip_preserves_plain_text() {
        let original: &[u8] = b"line one\nline two\nline three\n";
        let wire = local_to_wire(original);
        let back = wire_to_local(&wire);
        assert_eq!(back, original);
    }
}
