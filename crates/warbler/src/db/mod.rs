//! Database connection and scoped sessions.
//!
//! Nothing in this crate holds a global connection. Callers open a
//! [`Database`] from resolved configuration, then run every operation inside
//! a [`Session`] they pass explicitly.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, instrument};

use crate::error::WarblerResult;

/// Database connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a database file, creating it and its directory if needed.
    pub async fn open(path: &Path, max_connections: u32) -> WarblerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        Self::connect_with(SqliteConnectOptions::new().filename(path), max_connections).await
    }

    /// Connect to a database URL and run pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> WarblerResult<Self> {
        Self::connect_with(SqliteConnectOptions::from_str(database_url)?, max_connections).await
    }

    #[instrument(skip_all)]
    async fn connect_with(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> WarblerResult<Self> {
        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        debug!(max_connections, "connected to database");

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Create an in-memory database (for testing).
    ///
    /// Limited to one connection: every connection to `:memory:` is a
    /// separate database.
    pub async fn in_memory() -> WarblerResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> WarblerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Open a new session. Its writes are discarded unless it is committed.
    pub async fn begin(&self) -> WarblerResult<Session> {
        let tx = self.pool.begin().await?;
        Ok(Session { tx })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A unit of work over one database transaction.
///
/// Holds a pooled connection until it is committed, rolled back or dropped.
/// With the single-connection in-memory database, finish one session before
/// opening the next.
pub struct Session {
    tx: Transaction<'static, Sqlite>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// The connection every repository call runs on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Make the session's writes durable.
    pub async fn commit(self) -> WarblerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard the session's writes.
    pub async fn rollback(self) -> WarblerResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
