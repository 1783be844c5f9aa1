/// Session persistence operations
///
/// Each conversation is one row. History and document are stored as JSON so
/// the record is self-contained; timestamps are unix milliseconds so idle
/// sweeps can use the index.
use super::SessionBackend;
use crate::session::{DocumentContext, Session, Turn};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};

/// SQLite implementation of [`SessionBackend`]
#[derive(Clone)]
pub struct SqliteSessionBackend {
    pool: SqlitePool,
}

impl SqliteSessionBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of persisted sessions
    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count sessions")
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .with_context(|| format!("Invalid timestamp {}", millis))
}

#[async_trait]
impl SessionBackend for SqliteSessionBackend {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT history, document, created_at, last_active_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load session")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history_json: String = row.try_get("history")?;
        let document_json: Option<String> = row.try_get("document")?;
        let created_at: i64 = row.try_get("created_at")?;
        let last_active_at: i64 = row.try_get("last_active_at")?;

        let history: Vec<Turn> =
            serde_json::from_str(&history_json).context("Corrupt session history")?;
        let document: Option<DocumentContext> = document_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("Corrupt session document")?;

        Ok(Some(Session::restore(
            id.to_string(),
            history,
            document,
            from_millis(created_at)?,
            from_millis(last_active_at)?,
        )))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let history = serde_json::to_string(session.history())?;
        let document = session
            .document()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO sessions (id, history, document, created_at, last_active_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                history = excluded.history,
                document = excluded.document,
                last_active_at = excluded.last_active_at",
        )
        .bind(session.id())
        .bind(history)
        .bind(document)
        .bind(session.created_at.timestamp_millis())
        .bind(session.last_active_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to save session")?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    async fn delete_idle(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_active_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("Failed to delete idle sessions")?;

        Ok(result.rows_affected())
    }
}
