//! SQLite metrics aggregation.
//!
//! Fetches the per-session samples for `[start, end)` and folds them with the
//! pure aggregation in `chatvault_core::metrics`. Token usage is summed in SQL.

use chatvault_core::metrics::{SessionSample, aggregate, validate_window};
use chatvault_core::retry::RetryExecutor;
use chatvault_core::session::repository::SessionMetrics;
use chatvault_types::error::StoreError;
use chatvault_types::metrics::{Metrics, TokenUsage};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::METRICS_TIMEOUT;
use super::document::{decode_response_ms, format_datetime, map_sqlx, parse_datetime};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionMetrics`.
pub struct SqliteSessionMetrics {
    pool: DatabasePool,
    retry: RetryExecutor,
}

impl SqliteSessionMetrics {
    pub fn new(pool: DatabasePool, retry: RetryExecutor) -> Self {
        Self { pool, retry }
    }
}

fn sample_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSample, StoreError> {
    let start: String = row.try_get("ts").map_err(map_sqlx)?;
    let end: Option<String> = row.try_get("end_ts").map_err(map_sqlx)?;
    let total_tokens: i64 = row.try_get("total_tokens").map_err(map_sqlx)?;
    let admin_assisted: bool = row.try_get("admin_assisted").map_err(map_sqlx)?;
    let resp_times: String = row.try_get("resp_times").map_err(map_sqlx)?;

    Ok(SessionSample {
        start_time: parse_datetime(&start)?,
        end_time: end.as_deref().map(parse_datetime).transpose()?,
        total_tokens: u64::try_from(total_tokens).unwrap_or(0),
        admin_assisted,
        response_ms: decode_response_ms(&resp_times)?,
    })
}

impl SessionMetrics for SqliteSessionMetrics {
    async fn session_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Metrics, StoreError> {
        validate_window(start, end)?;
        let (from, to) = (format_datetime(&start), format_datetime(&end));
        let (from, to) = (from.as_str(), to.as_str());
        let reader = &self.pool.reader;

        let rows = self
            .retry
            .run("GetSessionMetrics", METRICS_TIMEOUT, move || async move {
                sqlx::query(
                    "SELECT ts, end_ts, total_tokens, admin_assisted, resp_times \
                     FROM sessions WHERE ts >= ? AND ts < ?",
                )
                .bind(from)
                .bind(to)
                .fetch_all(reader)
                .await
                .map_err(map_sqlx)
            })
            .await?;

        let samples = rows
            .iter()
            .map(sample_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let metrics = aggregate(&samples, start, end, Utc::now());
        tracing::debug!(
            sessions = metrics.total_sessions,
            max_concurrent = metrics.max_concurrent,
            "session metrics computed"
        );
        Ok(metrics)
    }

    async fn token_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TokenUsage, StoreError> {
        validate_window(start, end)?;
        let (from, to) = (format_datetime(&start), format_datetime(&end));
        let (from, to) = (from.as_str(), to.as_str());
        let reader = &self.pool.reader;

        let (total, count): (i64, i64) = self
            .retry
            .run("GetTokenUsage", METRICS_TIMEOUT, move || async move {
                sqlx::query_as(
                    "SELECT COALESCE(SUM(total_tokens), 0), COUNT(*) \
                     FROM sessions WHERE ts >= ? AND ts < ?",
                )
                .bind(from)
                .bind(to)
                .fetch_one(reader)
                .await
                .map_err(map_sqlx)
            })
            .await?;

        Ok(TokenUsage::new(
            u64::try_from(total).unwrap_or(0),
            u64::try_from(count).unwrap_or(0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptionCodec;
    use crate::sqlite::session::SqliteSessionStore;
    use crate::sqlite::test_support::{test_pool, ts};
    use chatvault_core::session::repository::SessionStore;
    use chatvault_types::session::Session;
    use std::time::Duration;

    async fn fixture() -> (SqliteSessionStore, SqliteSessionMetrics) {
        let pool = test_pool().await;
        (
            SqliteSessionStore::new(pool.clone(), EncryptionCodec::disabled(), RetryExecutor::default()),
            SqliteSessionMetrics::new(pool, RetryExecutor::default()),
        )
    }

    async fn insert(
        store: &SqliteSessionStore,
        id: &str,
        start: i64,
        end: Option<i64>,
        tokens: u64,
        admin: bool,
        response_ms: &[u64],
    ) {
        let mut session = Session::new(id, "u-1", ts(start));
        session.end_time = end.map(ts);
        session.total_tokens = tokens;
        session.admin_assisted = admin;
        session.response_times = response_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
        store.create_session(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_over_window() {
        let (store, metrics) = fixture().await;
        insert(&store, "a", 0, Some(60), 100, true, &[100, 300]).await;
        insert(&store, "b", 30, Some(90), 50, false, &[200]).await;
        insert(&store, "c", 50, Some(70), 30, false, &[]).await;
        // Outside the window
        insert(&store, "early", -50, Some(-10), 999, true, &[9_000]).await;
        insert(&store, "late", 100, Some(150), 999, true, &[9_000]).await;

        let m = metrics.session_metrics(ts(0), ts(100)).await.unwrap();
        assert_eq!(m.total_sessions, 3);
        assert_eq!(m.active_sessions, 0);
        assert_eq!(m.admin_assisted_count, 1);
        assert_eq!(m.total_tokens, 180);
        assert!((m.avg_tokens_per_session - 60.0).abs() < 1e-9);
        assert_eq!(m.max_response_ms, 300);
        assert_eq!(m.avg_response_ms, 200);
        assert_eq!(m.max_concurrent, 3);
        // 60 + 60 + 20 session-seconds over 100s
        assert!((m.avg_concurrent - 1.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_window_end_is_exclusive() {
        let (store, metrics) = fixture().await;
        insert(&store, "edge", 100, None, 10, false, &[]).await;

        let m = metrics.session_metrics(ts(0), ts(100)).await.unwrap();
        assert_eq!(m.total_sessions, 0);

        let m = metrics.session_metrics(ts(100), ts(101)).await.unwrap();
        assert_eq!(m.total_sessions, 1);
        assert_eq!(m.active_sessions, 1);
    }

    #[tokio::test]
    async fn test_empty_window_is_all_zero() {
        let (_store, metrics) = fixture().await;
        let m = metrics.session_metrics(ts(0), ts(3_600)).await.unwrap();
        assert_eq!(m, Metrics::default());
    }

    #[tokio::test]
    async fn test_inverted_window_rejected() {
        let (_store, metrics) = fixture().await;
        let err = metrics.session_metrics(ts(10), ts(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTimeRange));
        let err = metrics.token_usage(ts(10), ts(10)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_token_usage() {
        let (store, metrics) = fixture().await;
        insert(&store, "a", 0, None, 120, false, &[]).await;
        insert(&store, "b", 10, None, 30, false, &[]).await;
        insert(&store, "c", 500, None, 1_000, false, &[]).await;

        let usage = metrics.token_usage(ts(0), ts(100)).await.unwrap();
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(usage.session_count, 2);
        assert!((usage.avg_tokens_per_session - 75.0).abs() < 1e-9);

        let none = metrics.token_usage(ts(1_000), ts(2_000)).await.unwrap();
        assert_eq!(none, TokenUsage::new(0, 0));
    }
}
