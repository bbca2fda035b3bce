//! Demonstrates wiring `logging`'s structured events into `tracing-subscriber`.

use logging::{Direction, LogEvent, LogSink, LogUidAllocator};
use logging::tracing_bridge::TracingSink;

fn main() {
    tracing_subscriber::fmt::init();

    let uids = LogUidAllocator::default();
    let log_uid = uids.next();
    let sink = TracingSink;

    sink.log(&LogEvent::new(log_uid, Direction::Info, "control connection established"));
    sink.log(&LogEvent::new(log_uid, Direction::Cmd, "USER anonymous"));
    sink.log(&LogEvent::new(log_uid, Direction::Reply, "230 Login successful"));
}
