//! Event source abstraction for delivering normalized token events.

use crate::domain::{Event, EventId};
use async_trait::async_trait;
use std::fmt;

pub mod jsonl;
pub mod mock;

pub use jsonl::JsonlEventSource;
pub use mock::MockEventSource;

/// Source of already-decoded, balance-affecting events.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Fetch every event strictly after `after` (all events when `None`).
    ///
    /// # Returns
    /// Events in deterministic `EventId` order.
    async fn fetch_events(&self, after: Option<EventId>) -> Result<Vec<Event>, DataSourceError>;
}

/// Error type for event source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// The underlying file or stream could not be read
    Io(String),
    /// A record could not be decoded
    ParseError { line: usize, message: String },
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::Io(msg) => write!(f, "I/O error: {}", msg),
            DataSourceError::ParseError { line, message } => {
                write!(f, "Parse error on line {}: {}", line, message)
            }
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

impl From<std::io::Error> for DataSourceError {
    fn from(err: std::io::Error) -> Self {
        DataSourceError::Io(err.to_string())
    }
}

/// Keep events strictly after `after` and put them in replay order.
pub(crate) fn after_watermark(mut events: Vec<Event>, after: Option<EventId>) -> Vec<Event> {
    if let Some(after) = after {
        events.retain(|e| e.id > after);
    }
    crate::domain::sort_events_deterministic(&mut events);
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::Io("no such file".to_string());
        assert_eq!(err.to_string(), "I/O error: no such file");

        let err = DataSourceError::ParseError {
            line: 3,
            message: "missing field `id`".to_string(),
        };
        assert_eq!(err.to_string(), "Parse error on line 3: missing field `id`");

        let err = DataSourceError::Other("boom".to_string());
        assert_eq!(err.to_string(), "Error: boom");
    }
}
