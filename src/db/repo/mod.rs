//! `Repository` over the SQLite scope store.
//!
//! Scope states and snapshots live in `scopes.rs`; tokens, price claims and
//! leaf balances in `reference.rs`. Writes go through
//! [`Repository::persist_changes_atomic`] so a batch and its watermark land
//! together.

mod reference;
mod scopes;

use crate::domain::{Decimal, EventId, ExactAmount};
use crate::engine::{Aggregator, ChangeSet, MemoryScopeStore};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::{info, warn};

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Check that the database answers queries.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Replay state operations
    // =========================================================================

    /// Last event whose effects are fully persisted.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_watermark(&self) -> Result<Option<EventId>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT block_number, tx_index, log_index FROM replay_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let block_number: i64 = r.get("block_number");
            let tx_index: i64 = r.get("tx_index");
            let log_index: i64 = r.get("log_index");
            EventId::new(block_number as u64, tx_index as u32, log_index as u32)
        }))
    }

    /// Total events applied across all replays.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn events_applied(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT events_applied FROM replay_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("events_applied")).unwrap_or(0))
    }

    /// Persist one drained change set and advance the watermark in a single
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is written then.
    pub async fn persist_changes_atomic(
        &self,
        changes: &ChangeSet,
        watermark: EventId,
        applied: usize,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for record in &changes.tokens {
            reference::upsert_token(&mut *tx, record).await?;
        }
        for (token, price) in &changes.prices {
            reference::upsert_price(&mut *tx, token, price).await?;
        }
        for change in &changes.balances {
            reference::write_leaf_balance(&mut *tx, change).await?;
        }
        for state in &changes.scopes {
            scopes::upsert_scope_state(&mut *tx, state).await?;
        }
        for snapshot in &changes.snapshots {
            scopes::insert_snapshot(&mut *tx, snapshot).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO replay_state (id, block_number, tx_index, log_index, events_applied)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                block_number = excluded.block_number,
                tx_index = excluded.tx_index,
                log_index = excluded.log_index,
                events_applied = events_applied + excluded.events_applied
            "#,
        )
        .bind(watermark.block_number as i64)
        .bind(watermark.tx_index)
        .bind(watermark.log_index)
        .bind(applied as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Rebuild the in-memory engine from persisted state.
    ///
    /// # Errors
    /// Returns an error if any query fails.
    pub async fn load_aggregator(&self) -> Result<Aggregator<MemoryScopeStore>, sqlx::Error> {
        let mut store = MemoryScopeStore::new();
        for state in self.list_all_scope_states().await? {
            store.insert(state);
        }
        let registry = self.load_registry().await?;
        let prices = self.load_price_claims().await?;
        let balances = self.load_leaf_balances().await?;

        info!(
            scopes = store.len(),
            tokens = registry.len(),
            "Engine state loaded"
        );
        Ok(Aggregator::from_parts(store, registry, prices, balances))
    }
}

/// Parse a stored decimal, falling back to zero.
fn parse_decimal(raw: &str, column: &str, context: &str) -> Decimal {
    Decimal::from_str_canonical(raw).unwrap_or_else(|e| {
        warn!(
            context = %context,
            column = %column,
            value = %raw,
            error = %e,
            "Failed to parse stored decimal, using default"
        );
        Decimal::default()
    })
}

/// Parse a stored exact amount, falling back to zero.
fn parse_exact(raw: &str, column: &str, context: &str) -> ExactAmount {
    ExactAmount::from_str(raw).unwrap_or_else(|e| {
        warn!(
            context = %context,
            column = %column,
            value = %raw,
            error = %e,
            "Failed to parse stored amount, using default"
        );
        ExactAmount::default()
    })
}
