//! Transfer speed tracking for a data connection's `speed-meter` state.

use std::time::{Duration, Instant};

/// Width of the sliding window used to compute the current transfer rate.
const RATE_WINDOW: Duration = Duration::from_secs(2);

/// Tracks cumulative bytes transferred and a smoothed current rate.
///
/// Both the download and upload data connection variants own one of these;
/// it backs the `transferred` and `speed-meter` fields surfaced to progress
/// reporting and to the no-data-transfer timeout check.
#[derive(Clone, Debug)]
pub struct SpeedMeter {
    total: u64,
    window_start: Option<Instant>,
    bytes_in_window: u64,
    current_rate: f64,
    last_activity: Option<Instant>,
}

impl SpeedMeter {
    /// Constructs a meter with no transferred bytes and no activity yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total: 0,
            window_start: None,
            bytes_in_window: 0,
            current_rate: 0.0,
            last_activity: None,
        }
    }

    /// Records `bytes` transferred at time `now`.
    pub fn record(&mut self, bytes: u64, now: Instant) {
        if bytes == 0 {
            return;
        }

        self.total = self.total.saturating_add(bytes);
        self.last_activity = Some(now);

        let window_start = *self.window_start.get_or_insert(now);
        self.bytes_in_window = self.bytes_in_window.saturating_add(bytes);

        let elapsed = now.saturating_duration_since(window_start);
        if elapsed < RATE_WINDOW {
            return;
        }

        self.current_rate = self.bytes_in_window as f64 / elapsed.as_secs_f64();
        self.window_start = Some(now);
        self.bytes_in_window = 0;
    }

    /// Returns the cumulative number of bytes transferred.
    #[must_use]
    pub const fn total_transferred(&self) -> u64 {
        self.total
    }

    /// Returns the most recently computed rate, in bytes per second.
    ///
    /// The value is `0.0` until a full [`RATE_WINDOW`] worth of activity has
    /// been observed.
    #[must_use]
    pub const fn current_rate_bytes_per_second(&self) -> f64 {
        self.current_rate
    }

    /// Returns the time of the most recent `record` call, if any.
    #[must_use]
    pub const fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// Returns how long it has been since the last recorded activity, as of
    /// `now`. Returns `None` if nothing has ever been recorded.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.last_activity.map(|last| now.saturating_duration_since(last))
    }
}

impl Default for SpeedMeter {
    fn default() -> Self {
        Self::new()
    }
}
