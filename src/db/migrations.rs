//! Schema bootstrap for the scope store.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Tables created by `schema.sql`, in creation order.
pub const TABLES: [&str; 6] = [
    "scope_states",
    "scope_timeseries",
    "tokens",
    "price_claims",
    "leaf_balances",
    "replay_state",
];

/// Pragmas applied to every pooled connection. `journal_mode` is set apart
/// because it answers with the mode actually chosen.
const CONNECTION_PRAGMAS: [&str; 3] = [
    "PRAGMA foreign_keys = ON",
    "PRAGMA busy_timeout = 5000",
    "PRAGMA synchronous = NORMAL",
];

/// Open (or create) the database at `db_path` and bring the schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { prepare_connection(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    apply_schema(&pool).await?;

    info!(path = %db_path, "Scope store ready");
    Ok(pool)
}

/// Every statement is `CREATE ... IF NOT EXISTS`, so reapplying is harmless.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements: Vec<&str> = include_str!("schema.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    info!(statements = statements.len(), "Schema applied");
    Ok(())
}

async fn prepare_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for pragma in CONNECTION_PRAGMAS {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }

    let journal_mode: String = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?
        .get(0);
    debug!(journal_mode = %journal_mode, "Connection prepared");
    Ok(())
}
