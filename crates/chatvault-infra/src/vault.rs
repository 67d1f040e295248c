//! One-call construction of every store component over a shared pool.

use chatvault_core::retry::RetryExecutor;
use chatvault_types::error::StoreError;

use crate::crypto::EncryptionCodec;
use crate::sqlite::indexes::IndexManager;
use crate::sqlite::metrics::SqliteSessionMetrics;
use crate::sqlite::pool::DatabasePool;
use crate::sqlite::query::SqliteSessionQuery;
use crate::sqlite::session::SqliteSessionStore;

/// The session store, query engine, metrics aggregator and index manager,
/// sharing one database pool and one retry executor (and so one
/// cancellation token).
pub struct ChatVault {
    pub sessions: SqliteSessionStore,
    pub query: SqliteSessionQuery,
    pub metrics: SqliteSessionMetrics,
    pub indexes: IndexManager,
    pool: DatabasePool,
}

impl ChatVault {
    /// Open the database at `database_url` and build every component.
    ///
    /// An empty `key` disables encryption.
    pub async fn open(
        database_url: &str,
        key: &[u8],
        retry: RetryExecutor,
    ) -> Result<Self, StoreError> {
        let pool = DatabasePool::new(database_url)
            .await
            .map_err(|e| StoreError::backend(format!("failed to open database: {e}")))?;
        Ok(Self::from_pool(pool, EncryptionCodec::new(key), retry))
    }

    pub fn from_pool(pool: DatabasePool, codec: EncryptionCodec, retry: RetryExecutor) -> Self {
        Self {
            sessions: SqliteSessionStore::new(pool.clone(), codec, retry.clone()),
            query: SqliteSessionQuery::new(pool.clone(), retry.clone()),
            metrics: SqliteSessionMetrics::new(pool.clone(), retry.clone()),
            indexes: IndexManager::new(pool.clone(), retry),
            pool,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::default_database_url;
    use chatvault_core::session::repository::{SessionMetrics, SessionQuery, SessionStore};
    use chatvault_types::config::RetryConfig;
    use chatvault_types::session::{Message, Sender, Session};
    use chrono::{Duration, Utc};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_components_share_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = default_database_url(dir.path());
        let vault = ChatVault::open(&url, &[5u8; 24], RetryExecutor::default())
            .await
            .unwrap();
        vault.indexes.ensure_indexes().await.unwrap();

        let start = Utc::now() - Duration::minutes(5);
        let mut session = Session::new(uuid::Uuid::now_v7().to_string(), "u-1", start);
        session.total_tokens = 42;
        vault.sessions.create_session(&session).await.unwrap();
        vault
            .sessions
            .add_message(&session.id, &Message::new(Sender::User, "hi", start))
            .await
            .unwrap();

        let listed = vault.query.list_user_sessions("u-1", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message_count, 1);

        let usage = vault
            .metrics
            .token_usage(start - Duration::minutes(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(usage.total_tokens, 42);

        vault.close().await;
    }

    #[tokio::test]
    async fn test_open_unreachable_database_is_store_error() {
        let err = ChatVault::open(
            "sqlite:///definitely/not/a/dir/chatvault.db",
            &[],
            RetryExecutor::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(err.to_string().starts_with("failed to open database"));
    }

    #[tokio::test]
    async fn test_shared_token_reaches_every_component() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let retry = RetryExecutor::new(RetryConfig::default()).with_cancellation(token.clone());
        let vault = ChatVault::open(&default_database_url(dir.path()), &[], retry)
            .await
            .unwrap();

        token.cancel();
        // Cancellation only affects waits between retries; healthy calls succeed.
        assert!(vault.query.list_all_sessions(0).await.unwrap().is_empty());
    }
}
