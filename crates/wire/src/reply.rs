//! Parsing of FTP reply lines, including multi-line continuations.

use crate::error::{MalformedCode, WireError};

/// The coarse classification of a three-digit reply code (spec.md §4.1):
/// `1xx=info, 2xx=success, 3xx=partial, 4xx=transient, 5xx=permanent`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReplyClass {
    /// `1xx`: a preliminary positive reply, more to follow.
    Info,
    /// `2xx`: the requested action succeeded.
    Success,
    /// `3xx`: positive intermediate reply, more input needed from the client.
    Partial,
    /// `4xx`: transient negative reply; the command may succeed if retried.
    Transient,
    /// `5xx`: permanent negative reply.
    Permanent,
}

impl ReplyClass {
    /// Classifies a three-digit reply code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code / 100 {
            1 => Self::Info,
            2 => Self::Success,
            3 => Self::Partial,
            4 => Self::Transient,
            _ => Self::Permanent,
        }
    }
}

/// A fully parsed FTP reply: `{code, is_final, continuation_tag, text}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    code: u16,
    text: Vec<u8>,
}

impl Reply {
    /// Returns the three-digit numeric reply code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Returns the coarse classification of [`Self::code`].
    #[must_use]
    pub const fn class(&self) -> ReplyClass {
        ReplyClass::from_code(self.code)
    }

    /// Returns the reply text with line-framing collapsed: for multi-line
    /// replies this is every text line joined with `\n`, continuation
    /// markers stripped.
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Returns [`Self::text`] decoded lossily as UTF-8, for logging.
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

/// Finds the first complete reply in `buf`, returning the parsed [`Reply`]
/// and the number of bytes it consumed, or `None` if more bytes are needed.
///
/// Recognises multi-line replies (`nnn-…\r\n…\r\nnnn text`); continuation
/// ends only on a line beginning with the same three digits followed by a
/// space, per RFC 959 §4.2. Intermediate continuation lines are taken
/// verbatim and are not required to begin with digits at all — the normal
/// indented form RFC 959 §4.2 shows (`FEAT`'s `" MDTM"`-style rows) would
/// otherwise be rejected outright.
///
/// # Errors
///
/// Returns [`WireError::MalformedReplyCode`] if the first line does not
/// begin with three ASCII digits.
pub fn parse_reply(buf: &[u8]) -> Result<Option<(Reply, usize)>, WireError> {
    let mut consumed = 0usize;
    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut first_code: Option<u16> = None;

    loop {
        let Some(line_end) = find_line_end(&buf[consumed..]) else {
            return Ok(None);
        };
        let line = &buf[consumed..consumed + line_end];
        let line_bytes_consumed = line_end + 2; // CRLF

        match first_code {
            None => {
                let code = parse_leading_code(line)?;
                let is_continuation_start = line.get(3).copied() == Some(b'-');
                let rest = if line.len() > 4 { &line[4..] } else { &[][..] };
                lines.push(rest.to_vec());
                consumed += line_bytes_consumed;
                first_code = Some(code);
                if !is_continuation_start {
                    break;
                }
            }
            Some(code) => {
                consumed += line_bytes_consumed;
                if is_terminator_line(line, code) {
                    let rest = if line.len() > 4 { &line[4..] } else { &[][..] };
                    lines.push(rest.to_vec());
                    break;
                }
                lines.push(line.to_vec());
            }
        }
    }

    let code = first_code.expect("at least one line parsed");
    let text = lines.join(&b'\n');

    Ok(Some((Reply { code, text }, consumed)))
}

fn find_line_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"\r\n")
}

fn parse_leading_code(line: &[u8]) -> Result<u16, WireError> {
    if line.len() < 3 || !line[..3].iter().all(u8::is_ascii_digit) {
        return Err(WireError::MalformedReplyCode(MalformedCode(line.to_vec())));
    }
    let code = line[..3]
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
    Ok(code)
}

/// Whether `line` is the terminator of a multi-line reply whose first line
/// carried `code`: the same three digits followed by a space. A line that
/// merely fails to look like digits (an indented continuation row) is
/// never a terminator, not a parse error.
fn is_terminator_line(line: &[u8], code: u16) -> bool {
    line.len() >= 4 && line[3] == b' ' && matches!(parse_leading_code(&line[..3]), Ok(parsed) if parsed == code)
}

/// Formats a [`Reply`] back into its canonical single-line wire form. Used
/// by the testable round-trip property from spec.md §8: parsing then
/// formatting an FTP reply yields the original canonical form modulo
/// whitespace normalisation (multi-line replies collapse to their final
/// line plus the joined text for this purpose).
#[must_use]
pub fn format_reply_single_line(reply: &Reply) -> Vec<u8> {
    let mut out = Vec::with_capacity(reply.text.len() + 8);
    out.extend_from_slice(reply.code.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(&reply.text);
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line_reply() {
        let (reply, consumed) = parse_reply(b"220 Ready\r\n").unwrap().unwrap();
        assert_eq!(reply.code(), 220);
        assert_eq!(reply.text(), b"Ready");
        assert_eq!(consumed, 11);
    }

    #[test]
    fn classifies_reply_codes() {
        assert_eq!(ReplyClass::from_code(150), ReplyClass::Info);
        assert_eq!(ReplyClass::from_code(226), ReplyClass::Success);
        assert_eq!(ReplyClass::from_code(350), ReplyClass::Partial);
        assert_eq!(ReplyClass::from_code(425), ReplyClass::Transient);
        assert_eq!(ReplyClass::from_code(550), ReplyClass::Permanent);
    }

    #[test]
    fn parses_multiline_reply() {
        let input = b"214-The following commands are recognized\r\n   USER PASS\r\n214 Help OK\r\n";
        let (reply, consumed) = parse_reply(input).unwrap().unwrap();
        assert_eq!(reply.code(), 214);
        assert!(reply.text_lossy().contains("The following commands"));
        assert!(reply.text_lossy().contains("Help OK"));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn parses_feat_reply_with_indented_non_numeric_continuation_lines() {
        let input = b"211-Features:\r\n MDTM\r\n MLST type*;size*;modify*;\r\n211 End\r\n";
        let (reply, consumed) = parse_reply(input).unwrap().unwrap();
        assert_eq!(reply.code(), 211);
        assert!(reply.text_lossy().contains(" MDTM"));
        assert!(reply.text_lossy().contains("End"));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn continuation_does_not_end_on_matching_code_without_space() {
        let input = b"214-Start\r\n214-Not the end\r\n214 Actually the end\r\n";
        let (reply, _) = parse_reply(input).unwrap().unwrap();
        assert!(reply.text_lossy().contains("Not the end"));
        assert!(reply.text_lossy().ends_with("Actually the end"));
    }

    #[test]
    fn returns_none_when_incomplete() {
        assert!(parse_reply(b"220-Partial").unwrap().is_none());
        assert!(parse_reply(b"220-Partial\r\n").unwrap().is_none());
    }

    #[test]
    fn rejects_non_numeric_leading_code() {
        let err = parse_reply(b"abc Ready\r\n").unwrap_err();
        assert!(matches!(err, WireError::MalformedReplyCode(_)));
    }

    #[test]
    fn format_reply_round_trips_single_line() {
        let (reply, _) = parse_reply(b"226 Transfer complete\r\n").unwrap().unwrap();
        assert_eq!(format_reply_single_line(&reply), b"226 Transfer complete\r\n");
    }

    #[test]
    fn parses_two_replies_sequentially() {
        let input = b"220 Ready\r\n331 Need password\r\n";
        let (first, consumed) = parse_reply(input).unwrap().unwrap();
        assert_eq!(first.code(), 220);
        let (second, _) = parse_reply(&input[consumed..]).unwrap().unwrap();
        assert_eq!(second.code(), 331);
    }
}
