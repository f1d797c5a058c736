//! Database bootstrap for the order backend.
//!
//! Provides `init_db` for opening the embedded SQLite file and
//! `run_migrations` for creating the tables if they do not exist yet and
//! adding columns that older databases lack.

use std::str::FromStr;

use anyhow::{Context, Result};
use app_config::AppConfig;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use tracing::info;

/// Schema statements, applied in order. Every statement is idempotent.
pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_products.sql",
        include_str!("../migrations/001_create_products.sql"),
    ),
    (
        "002_create_orders.sql",
        include_str!("../migrations/002_create_orders.sql"),
    ),
];

/// Opens (and creates if missing) the database file named in the configuration.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub async fn init_db(cfg: &AppConfig) -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::new()
        .filename(&cfg.database_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let conn = options
        .connect()
        .await
        .with_context(|| format!("Failed to open database {}", cfg.database_path))?;

    info!(path = %cfg.database_path, "Database opened");
    Ok(conn)
}

/// Opens a private in-memory database.
pub async fn open_in_memory() -> Result<SqliteConnection, sqlx::Error> {
    SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .connect()
        .await
}

/// Applies all schema statements to the given connection.
///
/// # Errors
/// Returns the first statement that fails.
pub async fn run_migrations(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for (file_name, content) in MIGRATIONS {
        info!("Applying migration: {}", file_name);
        sqlx::query(content).execute(&mut *conn).await?;
    }
    add_missing_columns(conn).await
}

/// Columns added after the first release; older `orders` tables lack them.
const LATE_ORDER_COLUMNS: &[(&str, &str)] = &[
    ("company_invoice", "TEXT NOT NULL DEFAULT ''"),
    ("company_delivery", "TEXT NOT NULL DEFAULT ''"),
];

/// Brings an `orders` table created by an older release up to date.
async fn add_missing_columns(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let present: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('orders')")
        .fetch_all(&mut *conn)
        .await?;

    for (column, definition) in LATE_ORDER_COLUMNS {
        if present.iter().any(|(name,)| name == column) {
            continue;
        }
        info!(column = %column, "Adding missing orders column");
        sqlx::query(&format!("ALTER TABLE orders ADD COLUMN {column} {definition}"))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
