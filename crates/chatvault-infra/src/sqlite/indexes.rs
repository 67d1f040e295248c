//! Secondary indexes backing the listing and metrics queries.
//!
//! Creation is idempotent (`CREATE INDEX IF NOT EXISTS`), so `ensure_indexes`
//! is safe to call on every startup and from concurrent processes.

use chatvault_core::retry::RetryExecutor;
use chatvault_types::error::StoreError;

use super::INDEX_TIMEOUT;
use super::document::map_sqlx;
use super::pool::DatabasePool;

/// Index name and its creation statement.
const INDEXES: &[(&str, &str)] = &[
    (
        "idx_user_id",
        "CREATE INDEX IF NOT EXISTS idx_user_id ON sessions (uid)",
    ),
    (
        "idx_start_time",
        "CREATE INDEX IF NOT EXISTS idx_start_time ON sessions (ts DESC)",
    ),
    (
        "idx_admin_assisted",
        "CREATE INDEX IF NOT EXISTS idx_admin_assisted ON sessions (admin_assisted)",
    ),
    (
        "idx_user_start_time",
        "CREATE INDEX IF NOT EXISTS idx_user_start_time ON sessions (uid, ts DESC)",
    ),
];

/// Names of the indexes `ensure_indexes` maintains.
pub fn index_names() -> impl Iterator<Item = &'static str> {
    INDEXES.iter().map(|(name, _)| *name)
}

pub struct IndexManager {
    pool: DatabasePool,
    retry: RetryExecutor,
}

impl IndexManager {
    pub fn new(pool: DatabasePool, retry: RetryExecutor) -> Self {
        Self { pool, retry }
    }

    /// Create every session index that does not exist yet, in one transaction.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let writer = &self.pool.writer;

        self.retry
            .run("EnsureIndexes", INDEX_TIMEOUT, move || async move {
                let mut tx = writer.begin().await.map_err(map_sqlx)?;
                for (_, statement) in INDEXES {
                    sqlx::query(statement)
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx)?;
                }
                tx.commit().await.map_err(map_sqlx)
            })
            .await?;

        tracing::info!(count = INDEXES.len(), "session indexes ensured");
        Ok(())
    }

    /// Names of the indexes currently defined on the sessions table.
    pub async fn list_indexes(&self) -> Result<Vec<String>, StoreError> {
        let reader = &self.pool.reader;

        let rows: Vec<(String,)> = self
            .retry
            .run("ListIndexes", INDEX_TIMEOUT, move || async move {
                sqlx::query_as(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'index' AND tbl_name = 'sessions' AND name NOT LIKE 'sqlite_%' \
                     ORDER BY name",
                )
                .fetch_all(reader)
                .await
                .map_err(map_sqlx)
            })
            .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
