//! Bridges [`LogEvent`](crate::LogEvent)s into the `tracing` ecosystem.

use crate::{Direction, LogEvent, LogSink};

/// A [`LogSink`] that re-emits every event as a `tracing` event, so a host
/// application can attach `tracing-subscriber` (or any other `tracing`
/// subscriber) without the engine committing to a concrete log format.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: &LogEvent) {
        let log_uid = event.log_uid().get();
        let text = event.text();
        match event.direction() {
            Direction::Cmd => tracing::debug!(log_uid, direction = "cmd", %text),
            Direction::Reply => tracing::debug!(log_uid, direction = "reply", %text),
            Direction::Info => tracing::info!(log_uid, direction = "info", %text),
            Direction::Error => tracing::error!(log_uid, direction = "error", %text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogUidAllocator;

    #[test]
    fn tracing_sink_does_not_panic_without_a_subscriber() {
        let sink = TracingSink;
        let uid = LogUidAllocator::default().next();
        sink.log(&LogEvent::new(uid, Direction::Info, "hello"));
    }
}
