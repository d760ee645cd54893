//! Append-only history of scope states.

use super::scope::ScopeKey;
use super::state::ScopeState;
use super::store::ScopeStore;
use crate::domain::{EventId, TimeMs};
use serde::{Deserialize, Serialize};

/// Immutable copy of a scope's state right after an event touched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesSnapshot {
    pub event: EventId,
    pub timestamp: TimeMs,
    pub state: ScopeState,
}

impl TimeseriesSnapshot {
    pub fn key(&self) -> &ScopeKey {
        &self.state.key
    }
}

/// Collects the scopes one event touches and snapshots each of them once.
#[derive(Debug)]
pub struct TimeseriesRecorder {
    event: EventId,
    timestamp: TimeMs,
    touched: Vec<ScopeKey>,
}

impl TimeseriesRecorder {
    pub fn new(event: EventId, timestamp: TimeMs) -> Self {
        Self {
            event,
            timestamp,
            touched: Vec::new(),
        }
    }

    pub fn touch(&mut self, key: &ScopeKey) {
        if !self.touched.contains(key) {
            self.touched.push(key.clone());
        }
    }

    pub fn touched(&self) -> &[ScopeKey] {
        &self.touched
    }

    /// Stamp every touched scope and append one snapshot per scope, in touch order.
    ///
    /// Returns the number of snapshots recorded.
    pub fn flush<S: ScopeStore + ?Sized>(self, store: &mut S) -> usize {
        let count = self.touched.len();
        for key in self.touched {
            let state = store.fetch_or_init(&key);
            state.stamp(self.event, self.timestamp);
            let snapshot = TimeseriesSnapshot {
                event: self.event,
                timestamp: self.timestamp,
                state: state.clone(),
            };
            store.record_snapshot(snapshot);
        }
        count
    }
}
