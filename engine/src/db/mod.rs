//! Durable session storage
//!
//! Optional SQLite backing for the session store, selected by
//! `storage.database_url`. One pool is shared by every conversation; WAL
//! journaling lets concurrent turns on different conversations write while
//! others read.

use crate::session::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub mod sessions;

pub use sessions::SqliteSessionBackend;

/// Schema scripts, applied in order on every open. Each must be idempotent.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Durable storage for sessions, one record per conversation
///
/// Errors surface to users as `StoreUnavailable`.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Load a session, `None` if the conversation has no record
    async fn load(&self, id: &str) -> Result<Option<Session>>;

    /// Insert or replace the record for `session`
    async fn save(&self, session: &Session) -> Result<()>;

    /// Remove the record for `id`; removing a missing record is not an error
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove records last active before `cutoff`, returning how many were removed
    async fn delete_idle(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Shared SQLite pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file at `db_path`, creating parent directories
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        Self::connect(&format!("sqlite://{}", db_path.display())).await
    }

    /// Open a `sqlite:` URL and bring the schema up to date
    ///
    /// The file is created when missing. SQLite replays a leftover WAL on
    /// open, so an unclean shutdown needs no recovery step.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open session database")?;

        let db = Self { pool };
        db.migrate().await?;
        info!("Session database ready");

        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        for (name, script) in MIGRATIONS {
            debug!(migration = *name, "applying migration");
            sqlx::raw_sql(script)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Migration {} failed", name))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checkpoint the WAL into the main database file
    pub async fn flush_wal(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("WAL checkpoint failed")?;
        Ok(())
    }

    /// Checkpoint and close the pool; called once on shutdown
    pub async fn close(self) -> Result<()> {
        self.flush_wal().await?;
        self.pool.close().await;
        info!("Session database closed");
        Ok(())
    }

    /// Session backend sharing this pool
    pub fn sessions(&self) -> SqliteSessionBackend {
        SqliteSessionBackend::new(self.pool.clone())
    }
}
