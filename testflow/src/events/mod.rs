//! Event sink system for observability.
//!
//! The engine reports action lifecycle and correlation events through an
//! [`EventSink`]. Formatting and transport of the events is left to the sink.

mod event;
mod sink;

pub use event::{
    TestEvent, ACTION_FAILED, ACTION_STARTED, ACTION_SUCCEEDED, CORRELATION_TIMEOUT, ECHO,
    TEST_FINISHED, TEST_STARTED,
};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

// Process wide default sink picked up by new contexts.
static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the current global event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the current global event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the current global event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_global_sink() {
        let sink = Arc::new(CollectingEventSink::new());
        set_event_sink(sink.clone());

        get_event_sink().try_emit(&TestEvent::action_started("global-sink-check"));
        clear_event_sink();
        get_event_sink().try_emit(&TestEvent::action_started("global-sink-after-clear"));

        let actions: Vec<String> = sink
            .events_of_type("action-started")
            .iter()
            .filter_map(|e| e.data_str("action").map(String::from))
            .collect();
        assert!(actions.contains(&"global-sink-check".to_string()));
        assert!(!actions.contains(&"global-sink-after-clear".to_string()));
    }
}
