//! Classification of a parsed reply into the four outcomes spec.md §7
//! names: `{Success, Partial, TransientError, PermanentError}`.

use wire::{Reply, ReplyClass};

use crate::error::ControlError;

/// What [`crate::ControlConnection::send_command`] resolves a reply to.
/// This is the one place a `1xx`/`2xx`/`3xx`/`4xx`/`5xx` reply code turns
/// into policy; the control connection itself never retries, per
/// spec.md §7 ("it never retries on its own").
#[derive(Debug)]
pub enum ReplyOutcome {
    /// `2xx`: the command succeeded.
    Success(Reply),
    /// `1xx`/`3xx`: more is expected (a preliminary reply, or a positive
    /// intermediate reply requiring further input).
    Partial(Reply),
    /// `4xx`: retryable by reconnecting.
    TransientError(Reply),
    /// `5xx`: a permanent protocol failure.
    PermanentError(Reply),
}

impl ReplyOutcome {
    /// Classifies `reply` by its [`ReplyClass`].
    #[must_use]
    pub fn classify(reply: Reply) -> Self {
        match reply.class() {
            ReplyClass::Success => Self::Success(reply),
            ReplyClass::Info | ReplyClass::Partial => Self::Partial(reply),
            ReplyClass::Transient => Self::TransientError(reply),
            ReplyClass::Permanent => Self::PermanentError(reply),
        }
    }

    /// Converts a non-[`Self::Success`]/[`Self::Partial`] outcome into the
    /// matching [`ControlError`] bucket. Returns the underlying
    /// [`Reply`] back for the success/partial cases since there is
    /// nothing to convert.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Transient`] for `4xx` and
    /// [`ControlError::Permanent`] for `5xx`.
    pub fn into_result(self) -> Result<Reply, ControlError> {
        match self {
            Self::Success(reply) | Self::Partial(reply) => Ok(reply),
            Self::TransientError(reply) => {
                Err(ControlError::Transient(format!("{}: {}", reply.code(), reply.text_lossy())))
            }
            Self::PermanentError(reply) => {
                Err(ControlError::Permanent { code: reply.code(), reply_text: reply.text_lossy() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wire::parse_reply;

    fn reply(raw: &[u8]) -> Reply {
        parse_reply(raw).unwrap().unwrap().0
    }

    #[test]
    fn success_reply_converts_to_ok() {
        let outcome = ReplyOutcome::classify(reply(b"226 Transfer complete\r\n"));
        assert!(matches!(outcome, ReplyOutcome::Success(_)));
    }

    #[test]
    fn transient_reply_converts_to_control_error() {
        let outcome = ReplyOutcome::classify(reply(b"425 Cannot open data connection\r\n"));
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, ControlError::Transient(_)));
    }

    #[test]
    fn permanent_reply_carries_the_full_text() {
        let outcome = ReplyOutcome::classify(reply(b"550 No such file or directory\r\n"));
        let err = outcome.into_result().unwrap_err();
        match err {
            ControlError::Permanent { code, reply_text } => {
                assert_eq!(code, 550);
                assert_eq!(reply_text, "No such file or directory");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
