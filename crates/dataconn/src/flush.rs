//! The double-buffered flush path a download drains its socket bytes
//! into before handing them to [`diskpool`].
//!
//! Constants here are taken from `original_source/src/plugins/ftp/datacon.h`'s
//! `DATACON_FLUSHBUFFERSIZE`, `DATACON_FLUSHTIMEOUT`, and
//! `DATACON_TESTNODATATRTIMEOUT`, per SPEC_FULL.md §4.5.

use std::time::Duration;

/// Flush buffer size: once an accumulating chunk reaches this many bytes
/// it is handed to the disk pool even if the flush timer has not fired.
pub const FLUSH_BUFFER_SIZE: usize = 64 * 1024;

/// A download flushes whatever has accumulated at least this often, so a
/// slow trickle of small reads still reaches disk in a timely fashion.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// The periodic stall-check interval used internally to probe whether a
/// transfer is still alive, distinct from the harder
/// [`NO_DATA_TRANSFER_TIMEOUT`] deadline.
pub const STALL_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// No bytes moving for this long means the transfer is treated as dead
/// (spec.md §5's `T_nd`).
pub const NO_DATA_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Accumulates bytes read off a data socket into one buffer while a
/// previous buffer's worth is in flight to the disk pool.
///
/// [`FlushBuffer::take_for_flush`] hands back the filled buffer and
/// immediately makes a fresh, pre-allocated one the new accumulation
/// target, so the socket read loop never has to wait for an allocation
/// before it can keep reading.
#[derive(Debug)]
pub struct FlushBuffer {
    active: Vec<u8>,
    spare: Vec<u8>,
    capacity: usize,
}

impl FlushBuffer {
    /// Creates a buffer pair, each pre-allocated to `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            active: Vec::with_capacity(capacity),
            spare: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `data` to the buffer currently accumulating.
    pub fn push(&mut self, data: &[u8]) {
        self.active.extend_from_slice(data);
    }

    /// The number of bytes currently accumulated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing has been accumulated since the last flush.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether the accumulated bytes have reached [`FLUSH_BUFFER_SIZE`]
    /// and should be flushed regardless of the flush timer.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.active.len() >= self.capacity
    }

    /// Takes the accumulated bytes for a flush, swapping in the spare
    /// buffer as the new accumulation target.
    pub fn take_for_flush(&mut self) -> Vec<u8> {
        let filled = std::mem::replace(&mut self.active, std::mem::take(&mut self.spare));
        self.spare = Vec::with_capacity(self.capacity);
        filled
    }
}
