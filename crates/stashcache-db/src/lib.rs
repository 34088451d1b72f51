//! The relational mirror store (C2, §4.2).
//!
//! A thin wrapper around a single-writer `sqlx::SqlitePool` (WAL mode),
//! chosen because the design explicitly assumes single-connection-session
//! affinity for passes that use temp tables (§5, §9) and an
//! `INSERT OR IGNORE`/`ON CONFLICT` idempotent-upsert idiom (§4.2).

mod derive;
mod exclusion;
mod instance;
mod junctions;
mod overlay;
mod sync_state;
#[cfg(test)]
mod tests;
mod upsert;

use std::path::Path;

use snafu::{ResultExt as _, Snafu};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub use derive::*;
pub use exclusion::*;
pub use instance::*;
pub use junctions::*;
pub use overlay::*;
pub use sync_state::*;
pub use upsert::*;

pub const LOG_TARGET: &str = "stashcache::db";

#[derive(Debug, Snafu)]
pub enum DbError {
    #[snafu(display("failed to open database at {path}: {source}"))]
    Open {
        path: String,
        source: sqlx::Error,
    },
    #[snafu(display("migration failed: {source}"))]
    Migrate { source: sqlx::migrate::MigrateError },
    #[snafu(display("query failed: {source}"))]
    Query { source: sqlx::Error },
    #[snafu(display("transaction failed: {source}"))]
    Transaction { source: sqlx::Error },
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<sqlx::Error> for DbError {
    fn from(source: sqlx::Error) -> Self {
        DbError::Query { source }
    }
}

/// The mirror store handle. Cheaply `Clone`-able (the pool is
/// reference-counted); every mutation goes through C3/C4/C5 (§5).
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if necessary) a SQLite database at `path` and runs
    /// pending migrations. A single connection is kept in the write pool so
    /// that session-scoped temp tables (C5's empty-entity passes, §5) are
    /// visible across statements in the same logical phase.
    pub async fn open(path: &Path) -> DbResult<Self> {
        let path_str = path.display().to_string();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context(OpenSnafu {
                path: path_str.clone(),
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(MigrateSnafu)?;

        Ok(Self { pool })
    }

    /// An in-memory database, for tests.
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context(OpenSnafu {
                path: ":memory:".to_string(),
            })?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(MigrateSnafu)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a write transaction. Callers are expected to `commit()` or
    /// let it drop (implicit rollback), the same shape as the teacher's
    /// `WriteTransactionCtx`.
    pub async fn begin(&self) -> DbResult<sqlx::Transaction<'_, sqlx::Sqlite>> {
        self.pool.begin().await.context(TransactionSnafu)
    }
}
