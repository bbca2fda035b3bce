//! Parsing of `PASV`/`EPSV` reply addresses.

use std::net::Ipv4Addr;

use crate::error::WireError;

/// An address a server offered for a passive-mode data connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PassiveAddr {
    /// A `PASV` reply's four-octet IPv4 address and port.
    V4(Ipv4Addr, u16),
    /// An `EPSV` reply's port, to be combined with the control
    /// connection's already-known peer address (RFC 2428 §3: EPSV never
    /// repeats the address).
    SamePeer(u16),
}

/// Parses a `227` `PASV` reply's text for the first `h1,h2,h3,h4,p1,p2`
/// sextet it contains. Servers vary in how they bracket this (parentheses,
/// nothing at all), so this scans for six dot-free numbers rather than
/// anchoring on exact punctuation.
///
/// # Errors
///
/// Returns [`WireError::MalformedPasvReply`] if no such sextet is found or
/// any component overflows a `u8`/port range.
pub fn parse_pasv(text: &str) -> Result<PassiveAddr, WireError> {
    let digits: Vec<&str> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|segment| !segment.is_empty())
        .collect();

    for window in digits.windows(6) {
        if let Some(addr) = try_parse_sextet(window) {
            return Ok(addr);
        }
    }

    Err(WireError::MalformedPasvReply(text.to_string()))
}

fn try_parse_sextet(window: &[&str]) -> Option<PassiveAddr> {
    let mut octets = [0u8; 4];
    for (slot, segment) in octets.iter_mut().zip(&window[..4]) {
        *slot = segment.parse().ok()?;
    }
    let p1: u16 = window[4].parse().ok()?;
    let p2: u16 = window[5].parse().ok()?;
    if p1 > 255 || p2 > 255 {
        return None;
    }
    let port = p1 * 256 + p2;
    Some(PassiveAddr::V4(Ipv4Addr::from(octets), port))
}

/// Parses a `229` `EPSV` reply's text for the `(|||port|)` delimited form
/// from RFC 2428 §3.
///
/// # Errors
///
/// Returns [`WireError::MalformedPasvReply`] if no delimited port is found.
pub fn parse_epsv(text: &str) -> Result<PassiveAddr, WireError> {
    let open = text
        .find('(')
        .ok_or_else(|| WireError::MalformedPasvReply(text.to_string()))?;
    let close = text[open..]
        .find(')')
        .ok_or_else(|| WireError::MalformedPasvReply(text.to_string()))?
        + open;
    let inner = &text[open + 1..close];

    let delim = inner
        .chars()
        .next()
        .ok_or_else(|| WireError::MalformedPasvReply(text.to_string()))?;
    let fields: Vec<&str> = inner.split(delim).collect();
    // `|||port|` splits (on `|`) into ["", "", "", "port", ""].
    let port_field = fields
        .get(3)
        .ok_or_else(|| WireError::MalformedPasvReply(text.to_string()))?;
    let port: u16 = port_field
        .parse()
        .map_err(|_| WireError::MalformedPasvReply(text.to_string()))?;

    Ok(PassiveAddr::SamePeer(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pasv_with_parentheses() {
        let addr = parse_pasv("Entering Passive Mode (192,168,1,1,200,13).").unwrap();
        assert_eq!(addr, PassiveAddr::V4(Ipv4Addr::new(192, 168, 1, 1), 200 * 256 + 13));
    }

    #[test]
    fn parses_pasv_without_parentheses() {
        let addr = parse_pasv("Entering Passive Mode 10,0,0,5,4,1").unwrap();
        assert_eq!(addr, PassiveAddr::V4(Ipv4Addr::new(10, 0, 0, 5), 4 * 256 + 1));
    }

    #[test]
    fn rejects_pasv_reply_without_sextet() {
        let err = parse_pasv("Entering Passive Mode").unwrap_err();
        assert!(matches!(err, WireError::MalformedPasvReply(_)));
    }

    #[test]
    fn parses_epsv_extended_passive_form() {
        let addr = parse_epsv("Entering Extended Passive Mode (|||6446|)").unwrap();
        assert_eq!(addr, PassiveAddr::SamePeer(6446));
    }

    #[test]
    fn rejects_epsv_reply_missing_delimiters() {
        let err = parse_epsv("Entering Extended Passive Mode").unwrap_err();
        assert!(matches!(err, WireError::MalformedPasvReply(_)));
    }

    #[test]
    fn pasv_rejects_overflowing_port_octet() {
        let err = parse_pasv("(1,2,3,4,999,1)").unwrap_err();
        assert!(matches!(err, WireError::MalformedPasvReply(_)));
    }
}
