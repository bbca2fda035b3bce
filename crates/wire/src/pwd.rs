//! Parsing of `257` `PWD` replies.

use crate::error::WireError;

/// Parses a `257` reply's text for the current working directory path.
///
/// RFC 959 §4.1.1 specifies the path is double-quoted with embedded quotes
/// doubled (`257 "/a/b""c"/d" is current directory`). Many servers omit the
/// quoting entirely and just echo the path, so parsing is liberal: if the
/// text starts with `"`, the quoted form is decoded; otherwise the first
/// whitespace-delimited token is taken as the path verbatim.
///
/// # Errors
///
/// Returns [`WireError::MalformedPwdReply`] if a quoted path's opening
/// quote is never closed.
pub fn parse_pwd(text: &str) -> Result<String, WireError> {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('"') {
        return parse_quoted(rest, text);
    }
    let token = trimmed
        .split_whitespace()
        .next()
        .ok_or_else(|| WireError::MalformedPwdReply(text.to_string()))?;
    Ok(token.to_string())
}

fn parse_quoted(rest: &str, original: &str) -> Result<String, WireError> {
    let mut path = String::new();
    let mut chars = rest.chars().peekable();

    loop {
        match chars.next() {
            None => return Err(WireError::MalformedPwdReply(original.to_string())),
            Some('"') => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    path.push('"');
                } else {
                    return Ok(path);
                }
            }
            Some(c) => path.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_quoted_path() {
        assert_eq!(
            parse_pwd("257 \"/pub/incoming\" is current directory").unwrap(),
            "/pub/incoming"
        );
    }

    #[test]
    fn parses_quoted_path_with_embedded_quote() {
        assert_eq!(
            parse_pwd("\"/a/b\"\"c\"/d\" is current directory").unwrap(),
            "/a/b\"c\"/d"
        );
    }

    #[test]
    fn parses_unquoted_path_liberally() {
        assert_eq!(parse_pwd("/pub/incoming is current directory").unwrap(), "/pub/incoming");
    }

    #[test]
    fn rejects_unterminated_quoted_path() {
        let err = parse_pwd("\"/pub/incoming is current directory").unwrap_err();
        assert!(matches!(err, WireError::MalformedPwdReply(_)));
    }

    #[test]
    fn rejects_empty_reply_text() {
        let err = parse_pwd("   ").unwrap_err();
        assert!(matches!(err, WireError::MalformedPwdReply(_)));
    }
}
