//! Mock event source for testing without files.

use super::{after_watermark, DataSourceError, EventSource};
use crate::domain::{Event, EventId};
use async_trait::async_trait;

/// Mock event source that returns predefined events.
#[derive(Debug, Clone, Default)]
pub struct MockEventSource {
    events: Vec<Event>,
    failure: Option<DataSourceError>,
}

impl MockEventSource {
    /// Create a new mock event source with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the mock event source.
    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Add multiple events to the mock event source.
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events.extend(events);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn with_failure(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_events(&self, after: Option<EventId>) -> Result<Vec<Event>, DataSourceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(after_watermark(self.events.clone(), after))
    }
}
