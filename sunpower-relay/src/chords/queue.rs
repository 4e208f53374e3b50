//! Persistent submission queue
//!
//! URIs waiting for delivery live in a SQLite table so a run that is
//! interrupted picks up where it left off.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;

/// A queued URI
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingUri {
    pub id: i64,
    pub uri: String,
    pub attempts: i64,
}

/// Open (creating if needed) the queue database at `path`
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create queue directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open queue database: {}", path.display()))?;

    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_uris (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uri TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            enqueued_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create pending_uris table")?;

    Ok(())
}

/// Append a URI to the queue
pub async fn enqueue(pool: &SqlitePool, uri: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO pending_uris (uri) VALUES (?)")
        .bind(uri)
        .execute(pool)
        .await
        .context("Failed to enqueue URI")?;

    Ok(result.last_insert_rowid())
}

/// Drop the oldest entries so at most `max_len` remain; returns how many were dropped
pub async fn evict_oldest(pool: &SqlitePool, max_len: usize) -> Result<u64> {
    let max_len = i64::try_from(max_len).unwrap_or(i64::MAX);
    let result = sqlx::query(
        "DELETE FROM pending_uris WHERE id IN (
             SELECT id FROM pending_uris ORDER BY id DESC LIMIT -1 OFFSET ?
         )",
    )
    .bind(max_len)
    .execute(pool)
    .await
    .context("Failed to evict old queue entries")?;

    Ok(result.rows_affected())
}

/// Number of entries not yet delivered
pub async fn pending_count(pool: &SqlitePool) -> Result<usize> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_uris")
        .fetch_one(pool)
        .await
        .context("Failed to count pending URIs")?;

    Ok(count as usize)
}

/// Oldest entry in the queue
pub async fn next_pending(pool: &SqlitePool) -> Result<Option<PendingUri>> {
    sqlx::query_as::<_, PendingUri>(
        "SELECT id, uri, attempts FROM pending_uris ORDER BY id LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("Failed to read next pending URI")
}

/// Remove an entry (delivered or given up on)
pub async fn remove(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM pending_uris WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to remove queue entry")?;

    Ok(())
}

/// Count a failed attempt; returns the new attempt count
pub async fn record_failure(pool: &SqlitePool, id: i64, error: &str) -> Result<i64> {
    let (attempts,): (i64,) = sqlx::query_as(
        "UPDATE pending_uris SET attempts = attempts + 1, last_error = ?
         WHERE id = ?
         RETURNING attempts",
    )
    .bind(error)
    .bind(id)
    .fetch_one(pool)
    .await
    .context("Failed to record delivery failure")?;

    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect(&dir.path().join("queue.db")).await.unwrap();

        assert_eq!(pending_count(&pool).await.unwrap(), 0);
        assert!(next_pending(&pool).await.unwrap().is_none());

        enqueue(&pool, "http://a").await.unwrap();
        enqueue(&pool, "http://b").await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 2);

        let next = next_pending(&pool).await.unwrap().unwrap();
        assert_eq!(next.uri, "http://a");
        assert_eq!(next.attempts, 0);

        remove(&pool, next.id).await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_evict_oldest_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect(&dir.path().join("queue.db")).await.unwrap();

        for i in 0..5 {
            enqueue(&pool, &format!("http://host/{}", i)).await.unwrap();
        }

        assert_eq!(evict_oldest(&pool, 10).await.unwrap(), 0);
        assert_eq!(evict_oldest(&pool, 3).await.unwrap(), 2);
        assert_eq!(pending_count(&pool).await.unwrap(), 3);
        assert_eq!(next_pending(&pool).await.unwrap().unwrap().uri, "http://host/2");
    }

    #[tokio::test]
    async fn test_record_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pool = connect(&dir.path().join("queue.db")).await.unwrap();

        let id = enqueue(&pool, "http://a").await.unwrap();
        assert_eq!(record_failure(&pool, id, "timeout").await.unwrap(), 1);
        assert_eq!(record_failure(&pool, id, "timeout").await.unwrap(), 2);
        assert_eq!(next_pending(&pool).await.unwrap().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.db");

        {
            let pool = connect(&path).await.unwrap();
            enqueue(&pool, "http://left-over").await.unwrap();
            pool.close().await;
        }

        let pool = connect(&path).await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 1);
        assert_eq!(next_pending(&pool).await.unwrap().unwrap().uri, "http://left-over");
    }
}
