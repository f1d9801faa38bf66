//! SQLite connection pool for the chunk index.
//!
//! The database file and its parent directory are created on first use.
//! The pool runs in WAL mode so retrieval reads proceed while an ingestion
//! is writing, and it is sized to the ingest concurrency so every in-flight
//! upsert can hold a connection.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

use crate::config::Config;

/// How long a writer waits for SQLite's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    // One connection per concurrent upsert, plus one for queries.
    let max_connections = config.ingest.concurrency.max(1) as u32 + 1;

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_parent_dir_in_wal_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("index").join("rqa.sqlite");
        let config: Config =
            toml::from_str(&format!("[db]\npath = \"{}\"\n", path.display())).unwrap();

        let pool = connect(&config).await.unwrap();
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
        pool.close().await;
    }
}
