//! `set_timer`/`cancel_timer` support: one detached thread per live timer,
//! cancellable through a shared generation flag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use dashmap::DashMap;

use crate::event::Event;
use crate::id::TimerId;

/// Tracks the live generation of every outstanding timer so a late firing
/// from a thread that lost a race with [`Timers::cancel`] can recognise
/// itself as stale and drop silently.
#[derive(Default)]
pub struct Timers {
    generations: DashMap<TimerId, Arc<AtomicU64>>,
}

impl Timers {
    /// Arms a timer that fires [`Event::Timer`] on `sink` after `delay`,
    /// unless cancelled first. Re-arming an id that is already running
    /// cancels the previous instance.
    pub fn set(&self, id: TimerId, delay: Duration, sink: Sender<Event>) {
        self.cancel(id);
        let generation = Arc::new(AtomicU64::new(1));
        self.generations.insert(id, Arc::clone(&generation));
        let expected = generation.load(Ordering::SeqCst);

        std::thread::Builder::new()
            .name(format!("reactor-timer-{}", id.0))
            .spawn(move || {
                std::thread::sleep(delay);
                if generation.load(Ordering::SeqCst) == expected {
                    let _ = sink.send(Event::Timer(id));
                }
            })
            .expect("failed to spawn timer thread");
    }

    /// Cancels a previously armed timer. A no-op if `id` is not armed.
    pub fn cancel(&self, id: TimerId) {
        if let Some(entry) = self.generations.get(&id) {
            entry.fetch_add(1, Ordering::SeqCst);
        }
        self.generations.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_after_delay() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timers = Timers::default();
        timers.set(TimerId(1), Duration::from_millis(20), tx);
        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(event, Event::Timer(TimerId(1))));
    }

    #[test]
    fn cancel_suppresses_firing() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timers = Timers::default();
        timers.set(TimerId(2), Duration::from_millis(20), tx);
        timers.cancel(TimerId(2));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn re_arming_cancels_previous_instance() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let timers = Timers::default();
        timers.set(TimerId(3), Duration::from_millis(200), tx.clone());
        timers.set(TimerId(3), Duration::from_millis(20), tx);
        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(event, Event::Timer(TimerId(3))));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
