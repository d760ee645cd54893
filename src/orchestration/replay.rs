use crate::datasource::{DataSourceError, EventSource};
use crate::db::Repository;
use crate::domain::{sort_events_deterministic, EventId};
use crate::engine::Aggregator;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Replayer {
    source: Arc<dyn EventSource>,
    repo: Arc<Repository>,
    batch_size: usize,
}

impl Replayer {
    pub fn new(source: Arc<dyn EventSource>, repo: Arc<Repository>, batch_size: usize) -> Self {
        Self {
            source,
            repo,
            batch_size: batch_size.max(1),
        }
    }

    /// Apply every event after the persisted watermark.
    ///
    /// After each batch the drained change set and the batch's last event id
    /// are written in one transaction, so a restart resumes exactly where the
    /// last committed batch ended. `aggregator` must hold the state persisted
    /// up to the current watermark (see [`Repository::load_aggregator`]); after
    /// an error it should be reloaded before replaying again.
    pub async fn replay_incremental(
        &self,
        aggregator: &mut Aggregator,
    ) -> Result<ReplayResult, ReplayError> {
        let watermark = self.repo.get_watermark().await?;
        let mut events = self.source.fetch_events(watermark).await?;
        sort_events_deterministic(&mut events);
        let events_fetched = events.len();

        let mut last_applied = watermark;
        let mut pending = Vec::with_capacity(events.len());
        let mut events_skipped = 0usize;
        for event in events {
            if last_applied.is_some_and(|last| event.id <= last) {
                warn!(event = %event.id, "Skipping event at or before watermark");
                events_skipped += 1;
                continue;
            }
            last_applied = Some(event.id);
            pending.push(event);
        }

        let mut result = ReplayResult {
            events_fetched,
            events_skipped,
            watermark,
            ..ReplayResult::default()
        };
        for batch in pending.chunks(self.batch_size) {
            for event in batch {
                result.snapshots_recorded += aggregator.handle(event);
            }
            let changes = aggregator.take_changes();
            let Some(batch_end) = batch.last().map(|e| e.id) else {
                continue;
            };
            self.repo
                .persist_changes_atomic(&changes, batch_end, batch.len())
                .await?;

            result.events_applied += batch.len();
            result.batches += 1;
            result.watermark = Some(batch_end);
            info!(
                batch = result.batches,
                events = batch.len(),
                scopes = changes.scopes.len(),
                snapshots = changes.snapshots.len(),
                watermark = %batch_end,
                "Replay batch committed"
            );
        }

        info!(
            events_applied = result.events_applied,
            events_skipped = result.events_skipped,
            batches = result.batches,
            "Replay completed"
        );
        Ok(result)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    pub events_fetched: usize,
    pub events_applied: usize,
    pub events_skipped: usize,
    pub batches: usize,
    pub snapshots_recorded: usize,
    pub watermark: Option<EventId>,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
