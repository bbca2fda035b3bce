//! The four propagation buckets from spec.md §7, as a closed error enum
//! callers match on instead of inspecting strings.

/// Errors the control connection reports. Every variant maps to one of
/// the four propagation buckets spec.md §7 names; a worker decides what
/// to do with each bucket (retry, reconnect, surface, skip, fail), this
/// crate only classifies.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Connection closed mid-exchange, a `4xx` reply, a data-connection
    /// timeout, or a transient DNS/TLS failure. Retried by reconnect.
    #[error("transient: {0}")]
    Transient(String),

    /// `ReuseSSLSessionFailed`, an unverified certificate, or a changed
    /// certificate. Forces an immediate reconnect with no backoff wait.
    #[error("TLS/certificate fatal: {0}")]
    CertificateFatal(String),

    /// A `5xx` reply. Carries the full server reply text as the item's
    /// error description, per spec.md §7.
    #[error("permanent ({code}): {reply_text}")]
    Permanent {
        /// The three-digit reply code.
        code: u16,
        /// The server's reply text, verbatim.
        reply_text: String,
    },

    /// A filesystem path, configuration, or other local failure that has
    /// nothing to do with the network.
    #[error("local: {0}")]
    Local(String),
}

impl ControlError {
    /// `true` for the bucket that must reconnect immediately, without the
    /// usual exponential backoff wait (spec.md §4.4).
    #[must_use]
    pub const fn forces_immediate_reconnect(&self) -> bool {
        matches!(self, Self::CertificateFatal(_))
    }

    /// `true` for the bucket a worker may retry by reconnecting.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::CertificateFatal(_))
    }
}
