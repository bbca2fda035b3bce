//! Deterministic sleep primitive used by reconnect/retry backoff.

use std::time::Duration;

#[cfg(any(test, feature = "test-support"))]
mod recording;

#[cfg(any(test, feature = "test-support"))]
pub use recording::{RecordedSleepIter, RecordedSleepSession, recorded_sleep_session};

#[cfg(any(test, feature = "test-support"))]
use recording::append_recorded_sleeps;

const MAX_SLEEP_DURATION: Duration = Duration::new(i64::MAX as u64, 999_999_999);

/// Outcome of a [`paced_sleep`] call: what was requested versus what elapsed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct SleepOutcome {
    requested: Duration,
    actual: Duration,
}

impl SleepOutcome {
    /// Constructs an outcome from the requested and observed durations.
    pub const fn new(requested: Duration, actual: Duration) -> Self {
        Self { requested, actual }
    }

    /// Returns the duration the caller asked to sleep for.
    #[must_use]
    pub const fn requested(&self) -> Duration {
        self.requested
    }

    /// Returns the duration actually observed to elapse.
    #[must_use]
    pub const fn actual(&self) -> Duration {
        self.actual
    }

    /// Returns `true` when no sleep happened at all.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.requested.is_zero() && self.actual.is_zero()
    }
}

/// Sleeps for `duration`, splitting it into chunks no longer than the
/// platform's maximum supported `std::thread::sleep` argument.
///
/// When built with `cfg(test)` or the `test-support` feature, the sleep is
/// recorded instead of performed so callers elsewhere in the workspace (the
/// control connection's reconnect backoff, in particular) can assert on
/// pacing decisions without a real test taking minutes to run.
pub fn paced_sleep(duration: Duration) -> SleepOutcome {
    if duration.is_zero() {
        return SleepOutcome::default();
    }

    let start = std::time::Instant::now();
    let mut remaining = duration;

    #[cfg(any(test, feature = "test-support"))]
    let mut recorded_chunks: Vec<Duration> = Vec::new();

    while !remaining.is_zero() {
        let chunk = remaining.min(MAX_SLEEP_DURATION);
        if chunk.is_zero() {
            break;
        }

        #[cfg(any(test, feature = "test-support"))]
        {
            recorded_chunks.push(chunk);
        }
        #[cfg(not(any(test, feature = "test-support")))]
        {
            std::thread::sleep(chunk);
        }

        remaining = remaining.saturating_sub(chunk);
    }

    #[cfg(any(test, feature = "test-support"))]
    if !recorded_chunks.is_empty() {
        append_recorded_sleeps(recorded_chunks);
    }

    SleepOutcome::new(duration, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_noop() {
        assert!(paced_sleep(Duration::ZERO).is_noop());
    }

    #[test]
    fn nonzero_duration_records_instead_of_blocking() {
        let mut session = recorded_sleep_session();
        session.clear();

        let outcome = paced_sleep(Duration::from_millis(250));
        assert_eq!(outcome.requested(), Duration::from_millis(250));
        assert!(!session.is_empty());
        assert_eq!(session.take(), [Duration::from_millis(250)]);
    }

    #[test]
    fn sleep_outcome_default_is_noop() {
        assert!(SleepOutcome::default().is_noop());
    }

    #[test]
    fn sleep_outcome_reports_requested_and_actual() {
        let outcome = SleepOutcome::new(Duration::from_secs(1), Duration::from_millis(950));
        assert_eq!(outcome.requested(), Duration::from_secs(1));
        assert_eq!(outcome.actual(), Duration::from_millis(950));
        assert!(!outcome.is_noop());
    }
}
