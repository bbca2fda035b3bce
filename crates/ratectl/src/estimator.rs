//! Adaptive upload packet-size estimator.
//!
//! An upload data connection does not know in advance how large a single
//! `write()` to the socket should be to keep the peer's TCP receive window
//! full without blocking on a slow link. The estimator watches bytes sent
//! per one-second window and adjusts the recommended chunk size: when
//! throughput collapses relative to the last estimate it halves the chunk
//! and remembers the size that was "too big"; when throughput holds up it
//! grows the chunk back towards (but never above) that remembered ceiling.

use std::time::{Duration, Instant};

/// Smallest chunk size the estimator will ever recommend.
pub const MIN_PACKET_SIZE: usize = 4 * 1024;

/// Default starting chunk size for a freshly connected upload.
pub const DEFAULT_PACKET_SIZE: usize = 32 * 1024;

/// Width of the throughput measurement window.
const MEASUREMENT_WINDOW: Duration = Duration::from_secs(1);

/// If throughput in the current window falls below this fraction of the
/// throughput recorded the last time the chunk size changed, the chunk is
/// considered too big and is halved.
const COLLAPSE_THRESHOLD: f64 = 0.6;

/// Fractional step used to grow the chunk size back up after a collapse,
/// applied once per measurement window while throughput holds up.
const GROWTH_STEP: f64 = 0.25;

/// Tracks throughput for an upload socket and recommends a write chunk size.
///
/// Mirrors the `LastPacketSizeEstimation` / `PacketSizeChangeTime` /
/// `BytesSentAfterPckSizeCh` / `PacketSizeChangeSpeed` / `TooBigPacketSize`
/// bookkeeping an upload data connection keeps per socket.
#[derive(Clone, Debug)]
pub struct PacketSizeEstimator {
    current_estimate: usize,
    too_big_packet_size: Option<usize>,
    window_start: Option<Instant>,
    bytes_in_window: u64,
    speed_before_last_change: Option<f64>,
    discount_next_write: bool,
}

impl PacketSizeEstimator {
    /// Constructs an estimator starting from `initial_size`, clamped to
    /// [`MIN_PACKET_SIZE`].
    #[must_use]
    pub fn new(initial_size: usize) -> Self {
        Self {
            current_estimate: initial_size.max(MIN_PACKET_SIZE),
            too_big_packet_size: None,
            window_start: None,
            bytes_in_window: 0,
            speed_before_last_change: None,
            discount_next_write: true,
        }
    }

    /// Returns the chunk size the caller should use for its next write.
    #[must_use]
    pub const fn recommended_size(&self) -> usize {
        self.current_estimate
    }

    /// Returns the packet size last observed to collapse throughput, if any.
    #[must_use]
    pub const fn too_big_packet_size(&self) -> Option<usize> {
        self.too_big_packet_size
    }

    /// Records that `bytes` were just written to the socket at time `now`.
    ///
    /// The first call after construction is discounted from the throughput
    /// measurement: it is typically absorbed by the kernel send buffer and
    /// would otherwise report a speed far higher than the wire can sustain.
    pub fn record_write(&mut self, bytes: usize, now: Instant) {
        if bytes == 0 {
            return;
        }

        if self.discount_next_write {
            self.discount_next_write = false;
            self.window_start = Some(now);
            self.bytes_in_window = 0;
            return;
        }

        let window_start = *self.window_start.get_or_insert(now);
        self.bytes_in_window = self.bytes_in_window.saturating_add(bytes as u64);

        let elapsed = now.saturating_duration_since(window_start);
        if elapsed < MEASUREMENT_WINDOW {
            return;
        }

        let speed = self.bytes_in_window as f64 / elapsed.as_secs_f64();
        self.apply_measurement(speed);

        self.window_start = Some(now);
        self.bytes_in_window = 0;
    }

    fn apply_measurement(&mut self, speed: f64) {
        let Some(previous_speed) = self.speed_before_last_change else {
            self.speed_before_last_change = Some(speed);
            return;
        };

        if previous_speed > 0.0 && speed < previous_speed * COLLAPSE_THRESHOLD {
            self.too_big_packet_size = Some(self.current_estimate);
            self.speed_before_last_change = Some(speed);
            self.current_estimate = (self.current_estimate / 2).max(MIN_PACKET_SIZE);
            return;
        }

        self.speed_before_last_change = Some(speed);
        self.grow_towards_ceiling();
    }

    fn grow_towards_ceiling(&mut self) {
        let ceiling = self.too_big_packet_size.unwrap_or(usize::MAX);
        if self.current_estimate >= ceiling {
            return;
        }

        let step = ((self.current_estimate as f64) * GROWTH_STEP).max(1.0) as usize;
        self.current_estimate = self
            .current_estimate
            .saturating_add(step)
            .min(ceiling)
            .max(MIN_PACKET_SIZE);
    }
}
