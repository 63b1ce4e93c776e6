// sink.rs - Notification sinks and the dispatcher that fans events out.
//
// Sinks decide what "deliver" means: append to a JSONL file, post to an
// email relay, push to a chat channel. The dispatcher is synchronous and
// never propagates sink failures back to the caller.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::EventError;
use crate::event::TransitionEvent;

/// Something that receives transition events.
pub trait NotificationSink: Send + Sync {
    /// Short name used in log lines when delivery fails.
    fn name(&self) -> &str;

    /// Deliver one event. Errors are logged by the dispatcher and dropped.
    fn send(&self, event: &TransitionEvent) -> Result<(), EventError>;
}

/// Appends events as JSON Lines to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, event: &TransitionEvent) -> Result<(), EventError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| EventError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| EventError::IoError {
                path: self.path.clone(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| EventError::IoError {
            path: self.path.clone(),
            source,
        })?;

        Ok(())
    }
}

/// Fans each event out to every registered sink.
///
/// A failing sink does not stop the others from receiving the event.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no sinks (events are dropped).
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Register a sink.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style variant of [`add_sink`](Self::add_sink).
    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver an event to all sinks. Returns how many sinks accepted it.
    pub fn dispatch(&self, event: &TransitionEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.send(event) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    sink = sink.name(),
                    event = %event.label(),
                    entity_id = %event.entity_id,
                    "notification delivery failed: {}",
                    e
                ),
            }
        }
        delivered
    }

    /// Deliver a batch of events in order.
    pub fn dispatch_all<'a>(&self, events: impl IntoIterator<Item = &'a TransitionEvent>) {
        for event in events {
            self.dispatch(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EntityType;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use uuid::Uuid;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn send(&self, _event: &TransitionEvent) -> Result<(), EventError> {
            Err(EventError::DeliveryFailed("relay offline".to_string()))
        }
    }

    struct RecordingSink(Arc<Mutex<Vec<TransitionEvent>>>);

    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn send(&self, event: &TransitionEvent) -> Result<(), EventError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn sample_event() -> TransitionEvent {
        TransitionEvent::new(
            EntityType::Goal,
            Uuid::new_v4(),
            "in_progress",
            "overdue",
            TransitionEvent::SYSTEM_ACTOR,
            Utc::now(),
        )
    }

    #[test]
    fn log_sink_appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let sink = LogSink::new(&path);

        sink.send(&sample_event()).unwrap();
        sink.send(&sample_event()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let first: TransitionEvent = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first.to_state, "overdue");
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new()
            .with_sink(Box::new(FailingSink))
            .with_sink(Box::new(RecordingSink(seen.clone())));

        let delivered = dispatcher.dispatch(&sample_event());

        assert_eq!(delivered, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_dispatcher_drops_events() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.sink_count(), 0);
        assert_eq!(dispatcher.dispatch(&sample_event()), 0);
    }

    #[test]
    fn dispatch_all_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new().with_sink(Box::new(RecordingSink(seen.clone())));
        let a = sample_event();
        let b = sample_event();

        dispatcher.dispatch_all([&a, &b]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].event_id, a.event_id);
        assert_eq!(seen[1].event_id, b.event_id);
    }
}
