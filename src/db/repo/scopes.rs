//! Scope state and timeseries operations for the repository.

use crate::domain::{Address, EventId, TimeMs, TokenType};
use crate::engine::{ScopeKey, ScopeKind, ScopeState, TimeseriesSnapshot};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{parse_decimal, parse_exact, Repository};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind the key columns (kind, scope_id, account, system, token_type, token).
fn bind_key<'q>(query: SqliteQuery<'q>, key: &'q ScopeKey) -> SqliteQuery<'q> {
    query
        .bind(key.kind().as_str())
        .bind(key.id())
        .bind(key.account().map(Address::as_str))
        .bind(key.system().map(Address::as_str))
        .bind(key.token_type().map(TokenType::as_str))
        .bind(key.token().map(Address::as_str))
}

/// Bind the value columns shared by `scope_states` and `scope_timeseries`.
fn bind_values<'q>(query: SqliteQuery<'q>, state: &'q ScopeState) -> SqliteQuery<'q> {
    query
        .bind(state.total_value_exact.to_string())
        .bind(state.total_value.to_canonical_string())
        .bind(state.total_frozen_exact.to_string())
        .bind(state.total_frozen.to_canonical_string())
        .bind(state.total_available_exact.to_string())
        .bind(state.total_available.to_canonical_string())
        .bind(state.total_value_in_base_currency.to_canonical_string())
        .bind(state.balances_count)
        .bind(state.token_balances_count)
        .bind(state.count)
        .bind(state.launched_count)
        .bind(state.percentage_of_total_supply.to_canonical_string())
        .bind(state.event_count)
}

pub(super) async fn upsert_scope_state(
    conn: &mut SqliteConnection,
    state: &ScopeState,
) -> Result<(), sqlx::Error> {
    let query = sqlx::query(
        r#"
        INSERT INTO scope_states (
            kind, scope_id, account, system, token_type, token,
            total_value_exact, total_value, total_frozen_exact, total_frozen,
            total_available_exact, total_available, total_value_in_base_currency,
            balances_count, token_balances_count, count, launched_count,
            percentage_of_total_supply, event_count,
            last_block_number, last_tx_index, last_log_index, last_updated_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(kind, scope_id) DO UPDATE SET
            total_value_exact = excluded.total_value_exact,
            total_value = excluded.total_value,
            total_frozen_exact = excluded.total_frozen_exact,
            total_frozen = excluded.total_frozen,
            total_available_exact = excluded.total_available_exact,
            total_available = excluded.total_available,
            total_value_in_base_currency = excluded.total_value_in_base_currency,
            balances_count = excluded.balances_count,
            token_balances_count = excluded.token_balances_count,
            count = excluded.count,
            launched_count = excluded.launched_count,
            percentage_of_total_supply = excluded.percentage_of_total_supply,
            event_count = excluded.event_count,
            last_block_number = excluded.last_block_number,
            last_tx_index = excluded.last_tx_index,
            last_log_index = excluded.last_log_index,
            last_updated_ms = excluded.last_updated_ms
        "#,
    );
    bind_values(bind_key(query, &state.key), state)
        .bind(state.last_event.map(|e| e.block_number as i64))
        .bind(state.last_event.map(|e| e.tx_index))
        .bind(state.last_event.map(|e| e.log_index))
        .bind(state.last_updated.map(|t| t.as_ms()))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Append one snapshot. A snapshot already stored for the same
/// (scope, event) is left as is.
pub(super) async fn insert_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &TimeseriesSnapshot,
) -> Result<(), sqlx::Error> {
    let query = sqlx::query(
        r#"
        INSERT INTO scope_timeseries (
            kind, scope_id, account, system, token_type, token,
            total_value_exact, total_value, total_frozen_exact, total_frozen,
            total_available_exact, total_available, total_value_in_base_currency,
            balances_count, token_balances_count, count, launched_count,
            percentage_of_total_supply, event_count,
            block_number, tx_index, log_index, timestamp_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(kind, scope_id, block_number, tx_index, log_index) DO NOTHING
        "#,
    );
    bind_values(bind_key(query, snapshot.key()), &snapshot.state)
        .bind(snapshot.event.block_number as i64)
        .bind(snapshot.event.tx_index)
        .bind(snapshot.event.log_index)
        .bind(snapshot.timestamp.as_ms())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn optional_address(row: &SqliteRow, column: &str) -> Result<Option<Address>, String> {
    let raw: Option<String> = row.get(column);
    raw.map(|s| Address::from_str(&s).map_err(|e| format!("{}: {}", column, e)))
        .transpose()
}

/// Rebuild a scope key from its stored dimension columns.
fn key_from_row(row: &SqliteRow) -> Option<ScopeKey> {
    let kind_str: String = row.get("kind");
    let scope_id: String = row.get("scope_id");
    let token_type: Option<String> = row.get("token_type");

    let parts = optional_address(row, "account").and_then(|account| {
        Ok((
            account,
            optional_address(row, "system")?,
            optional_address(row, "token")?,
        ))
    });
    let (account, system, token) = match parts {
        Ok(parts) => parts,
        Err(e) => {
            warn!(scope_id = %scope_id, error = %e, "Skipping scope row with invalid address");
            return None;
        }
    };

    let key = match ScopeKey::from_parts(
        account,
        system,
        token_type.as_deref().map(TokenType::new),
        token,
    ) {
        Ok(key) => key,
        Err(e) => {
            warn!(scope_id = %scope_id, error = %e, "Skipping scope row with invalid dimensions");
            return None;
        }
    };
    if key.kind().as_str() != kind_str {
        warn!(
            scope_id = %scope_id,
            stored = %kind_str,
            derived = %key.kind(),
            "Skipping scope row whose kind does not match its dimensions"
        );
        return None;
    }
    Some(key)
}

/// Decode the shared value columns onto a zeroed state for `key`.
fn values_from_row(row: &SqliteRow, key: ScopeKey) -> ScopeState {
    let context = key.to_string();
    let exact = |column: &str| {
        let raw: String = row.get(column);
        parse_exact(&raw, column, &context)
    };
    let decimal = |column: &str| {
        let raw: String = row.get(column);
        parse_decimal(&raw, column, &context)
    };

    let mut state = ScopeState::new(key);
    state.total_value_exact = exact("total_value_exact");
    state.total_value = decimal("total_value");
    state.total_frozen_exact = exact("total_frozen_exact");
    state.total_frozen = decimal("total_frozen");
    state.total_available_exact = exact("total_available_exact");
    state.total_available = decimal("total_available");
    state.total_value_in_base_currency = decimal("total_value_in_base_currency");
    state.balances_count = row.get("balances_count");
    state.token_balances_count = row.get("token_balances_count");
    state.count = row.get("count");
    state.launched_count = row.get("launched_count");
    state.percentage_of_total_supply = decimal("percentage_of_total_supply");
    state.event_count = row.get("event_count");
    state
}

fn scope_state_from_row(row: &SqliteRow) -> Option<ScopeState> {
    let key = key_from_row(row)?;
    let mut state = values_from_row(row, key);

    let block_number: Option<i64> = row.get("last_block_number");
    let tx_index: Option<i64> = row.get("last_tx_index");
    let log_index: Option<i64> = row.get("last_log_index");
    state.last_event = match (block_number, tx_index, log_index) {
        (Some(b), Some(t), Some(l)) => Some(EventId::new(b as u64, t as u32, l as u32)),
        _ => None,
    };
    let last_updated_ms: Option<i64> = row.get("last_updated_ms");
    state.last_updated = last_updated_ms.map(TimeMs::new);
    Some(state)
}

fn snapshot_from_row(row: &SqliteRow) -> Option<TimeseriesSnapshot> {
    let key = key_from_row(row)?;
    let block_number: i64 = row.get("block_number");
    let tx_index: i64 = row.get("tx_index");
    let log_index: i64 = row.get("log_index");
    let timestamp_ms: i64 = row.get("timestamp_ms");

    let event = EventId::new(block_number as u64, tx_index as u32, log_index as u32);
    let timestamp = TimeMs::new(timestamp_ms);
    let mut state = values_from_row(row, key);
    state.last_event = Some(event);
    state.last_updated = Some(timestamp);

    Some(TimeseriesSnapshot {
        event,
        timestamp,
        state,
    })
}

impl Repository {
    /// Current state of one scope.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_scope_state(&self, key: &ScopeKey) -> Result<Option<ScopeState>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM scope_states WHERE kind = ? AND scope_id = ?")
            .bind(key.kind().as_str())
            .bind(key.id())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().and_then(scope_state_from_row))
    }

    /// Every scope of one kind, ordered by scope id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_scope_states(&self, kind: ScopeKind) -> Result<Vec<ScopeState>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM scope_states WHERE kind = ? ORDER BY scope_id")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().filter_map(scope_state_from_row).collect())
    }

    /// The System × TokenType scopes of one system, ordered by token type.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_token_type_scopes(
        &self,
        system: &Address,
    ) -> Result<Vec<ScopeState>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM scope_states WHERE kind = ? AND system = ? ORDER BY token_type",
        )
        .bind(ScopeKind::SystemTokenType.as_str())
        .bind(system.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(scope_state_from_row).collect())
    }

    pub(super) async fn list_all_scope_states(&self) -> Result<Vec<ScopeState>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM scope_states")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().filter_map(scope_state_from_row).collect())
    }

    /// Snapshots of one scope in event order, optionally bounded by time
    /// (both bounds inclusive).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_timeseries(
        &self,
        key: &ScopeKey,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<TimeseriesSnapshot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM scope_timeseries
            WHERE kind = ? AND scope_id = ?
              AND (? IS NULL OR timestamp_ms >= ?)
              AND (? IS NULL OR timestamp_ms <= ?)
            ORDER BY block_number, tx_index, log_index
            "#,
        )
        .bind(key.kind().as_str())
        .bind(key.id())
        .bind(from_ms)
        .bind(from_ms)
        .bind(to_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(snapshot_from_row).collect())
    }
}
