use std::iter::{ExactSizeIterator, FusedIterator};
use std::marker::PhantomData;
use std::mem;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

fn recorded_sleeps() -> &'static Mutex<Vec<Duration>> {
    static RECORDED_SLEEPS: OnceLock<Mutex<Vec<Duration>>> = OnceLock::new();
    RECORDED_SLEEPS.get_or_init(|| Mutex::new(Vec::new()))
}

fn recorded_sleep_session_lock() -> &'static Mutex<()> {
    static SESSION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    SESSION_LOCK.get_or_init(|| Mutex::new(()))
}

pub(super) fn append_recorded_sleeps(chunks: Vec<Duration>) {
    lock_recorded_sleeps().extend(chunks);
}

fn lock_recorded_sleeps() -> MutexGuard<'static, Vec<Duration>> {
    recorded_sleeps()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn lock_recorded_sleep_session() -> MutexGuard<'static, ()> {
    recorded_sleep_session_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
/// Guard that provides exclusive access to the recorded sleep durations.
///
/// Tests obtain a [`RecordedSleepSession`] at the start of a scenario, call
/// [`RecordedSleepSession::clear`] to discard previous measurements, run the
/// code under test, and inspect the captured durations via
/// [`RecordedSleepSession::take`]. Holding the guard keeps concurrent tests
/// from draining or appending to the shared buffer while assertions run.
pub struct RecordedSleepSession<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl RecordedSleepSession<'_> {
    #[inline]
    fn with_recorded_sleeps<R>(&self, op: impl FnOnce(&[Duration]) -> R) -> R {
        let guard = lock_recorded_sleeps();
        op(guard.as_slice())
    }

    #[inline]
    fn with_recorded_sleeps_mut<R>(&self, op: impl FnOnce(&mut Vec<Duration>) -> R) -> R {
        let mut guard = lock_recorded_sleeps();
        op(guard.as_mut())
    }

    /// Removes any previously recorded durations.
    #[inline]
    pub fn clear(&mut self) {
        self.with_recorded_sleeps_mut(|durations| durations.clear());
    }

    /// Returns `true` when no sleep durations have been recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.with_recorded_sleeps(|durations| durations.is_empty())
    }

    /// Returns the number of recorded sleep intervals.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_recorded_sleeps(|durations| durations.len())
    }

    /// Returns a snapshot of the recorded durations without clearing them.
    #[inline]
    pub fn snapshot(&self) -> Vec<Duration> {
        self.with_recorded_sleeps(|durations| durations.to_vec())
    }

    /// Returns the most recently recorded duration without draining the buffer.
    #[inline]
    #[must_use]
    pub fn last_duration(&self) -> Option<Duration> {
        self.with_recorded_sleeps(|durations| durations.last().copied())
    }

    /// Returns the cumulative duration of all recorded sleeps without consuming them.
    #[inline]
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.with_recorded_sleeps(|durations| {
            durations
                .iter()
                .copied()
                .fold(Duration::ZERO, |acc, chunk| acc.saturating_add(chunk))
        })
    }

    /// Drains the recorded sleep durations, returning ownership of the vector.
    #[inline]
    pub fn take(&mut self) -> Vec<Duration> {
        self.with_recorded_sleeps_mut(mem::take)
    }

    /// Consumes the session and returns the recorded durations.
    #[inline]
    pub fn into_vec(mut self) -> Vec<Duration> {
        self.take()
    }

    /// Iterates over the recorded sleep durations without consuming them.
    #[inline]
    pub fn iter(&self) -> RecordedSleepIter<'_> {
        let guard = lock_recorded_sleeps();
        let end = guard.len();

        RecordedSleepIter {
            guard,
            index: 0,
            end,
            _session: PhantomData,
        }
    }
}

impl IntoIterator for RecordedSleepSession<'_> {
    type Item = Duration;
    type IntoIter = std::vec::IntoIter<Duration>;

    fn into_iter(mut self) -> Self::IntoIter {
        self.take().into_iter()
    }
}

impl<'session, 'iter> IntoIterator for &'iter RecordedSleepSession<'session>
where
    'session: 'iter,
{
    type Item = Duration;
    type IntoIter = RecordedSleepIter<'iter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'session, 'iter> IntoIterator for &'iter mut RecordedSleepSession<'session>
where
    'session: 'iter,
{
    type Item = Duration;
    type IntoIter = RecordedSleepIter<'iter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
/// Iterator over the durations captured by a [`RecordedSleepSession`].
pub struct RecordedSleepIter<'a> {
    guard: MutexGuard<'static, Vec<Duration>>,
    index: usize,
    end: usize,
    _session: PhantomData<&'a RecordedSleepSession<'a>>,
}

impl Iterator for RecordedSleepIter<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }

        let item = self.guard.get(self.index).copied();
        if item.is_some() {
            self.index += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for RecordedSleepIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }

        self.end = self.end.saturating_sub(1);
        self.guard.get(self.end).copied()
    }
}

impl ExactSizeIterator for RecordedSleepIter<'_> {
    fn len(&self) -> usize {
        self.end.saturating_sub(self.index)
    }
}

impl FusedIterator for RecordedSleepIter<'_> {}

#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
/// Obtains a guard that serialises access to recorded sleep durations.
#[must_use]
pub fn recorded_sleep_session() -> RecordedSleepSession<'static> {
    RecordedSleepSession {
        _guard: lock_recorded_sleep_session(),
    }
}

#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
impl Default for RecordedSleepSession<'static> {
    fn default() -> Self {
        recorded_sleep_session()
    }
}
