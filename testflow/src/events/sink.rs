//! Event sink trait and implementations.

use super::event::{ACTION_FAILED, CORRELATION_TIMEOUT};
use super::TestEvent;
use async_trait::async_trait;
use tracing::{debug, info, warn, Level};

/// Trait for event sinks that receive test events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: TestEvent);

    /// Emits an event without blocking.
    ///
    /// Implementations must not panic; failures are logged and suppressed.
    fn try_emit(&self, event: &TestEvent);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: TestEvent) {}

    fn try_emit(&self, _event: &TestEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &TestEvent) {
        let failure = matches!(event.event_type.as_str(), ACTION_FAILED | CORRELATION_TIMEOUT);
        if failure {
            warn!(event_type = %event.event_type, data = ?event.data, "Test event");
        } else if self.level == Level::DEBUG {
            debug!(event_type = %event.event_type, data = ?event.data, "Test event");
        } else {
            info!(event_type = %event.event_type, data = ?event.data, "Test event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: TestEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: &TestEvent) {
        self.log_event(event);
    }
}

/// A collecting event sink for tests and reporting.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<TestEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<TestEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<TestEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the echoed messages in emission order.
    #[must_use]
    pub fn echoed(&self) -> Vec<String> {
        self.events_of_type(super::event::ECHO)
            .iter()
            .filter_map(|e| e.data_str("message").map(String::from))
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: TestEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: &TestEvent) {
        self.events.write().push(event.clone());
    }
}
