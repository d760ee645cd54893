//! Newline-delimited JSON event file.

use super::{after_watermark, DataSourceError, EventSource};
use crate::domain::{Event, EventId};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads one JSON-encoded [`Event`] per line. Blank lines are ignored.
#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
}

impl JsonlEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode `content`. Line numbers in errors are 1-based.
    pub fn parse(content: &str) -> Result<Vec<Event>, DataSourceError> {
        let mut events = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: Event =
                serde_json::from_str(trimmed).map_err(|e| DataSourceError::ParseError {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            events.push(event);
        }
        Ok(events)
    }
}

#[async_trait]
impl EventSource for JsonlEventSource {
    async fn fetch_events(&self, after: Option<EventId>) -> Result<Vec<Event>, DataSourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let events = Self::parse(&content)?;
        let total = events.len();
        let events = after_watermark(events, after);
        debug!(
            path = %self.path.display(),
            total,
            pending = events.len(),
            "Read event file"
        );
        Ok(events)
    }
}
