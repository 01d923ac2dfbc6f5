//! SQLite connection handling for the persistent vector index.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open the index database, creating the file and parent directory if absent.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    open(db_path, true).await
}

/// Open an existing index database. Returns `None` when the file does not exist.
pub async fn open_existing(db_path: &Path) -> Result<Option<SqlitePool>> {
    if !db_path.exists() {
        return Ok(None);
    }
    Ok(Some(open(db_path, false).await?))
}

async fn open(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
