//! SQLite session store.
//!
//! Implements `SessionStore` from `chatvault-core`. Every statement runs as a
//! unit of work under the shared `RetryExecutor`; message content passes
//! through the `EncryptionCodec` on the way in and out.

use chatvault_core::retry::RetryExecutor;
use chatvault_core::session::repository::{SessionStore, validate_session, validate_session_id};
use chatvault_types::error::StoreError;
use chatvault_types::session::{Message, Session};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteExecutor;

use super::document::{
    MessageDocument, SessionDocument, SessionRow, format_datetime, map_insert_error, map_sqlx,
    parse_datetime,
};
use super::pool::DatabasePool;
use super::{DEFAULT_TIMEOUT, MESSAGE_ADD_TIMEOUT, SESSION_END_TIMEOUT};
use crate::counters::SessionCounters;
use crate::crypto::EncryptionCodec;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
    codec: EncryptionCodec,
    retry: RetryExecutor,
    counters: SessionCounters,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool, codec: EncryptionCodec, retry: RetryExecutor) -> Self {
        Self {
            pool,
            codec,
            retry,
            counters: SessionCounters::global(),
        }
    }

    pub fn with_counters(mut self, counters: SessionCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn codec(&self) -> &EncryptionCodec {
        &self.codec
    }
}

/// Stored start time and open/ended state of one session.
struct Lifecycle {
    start_time: DateTime<Utc>,
    active: bool,
}

async fn load_lifecycle<'e>(
    executor: impl SqliteExecutor<'e>,
    session_id: &str,
) -> Result<Option<Lifecycle>, StoreError> {
    let Some(row) = sqlx::query("SELECT ts, end_ts IS NULL AS open FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx)?
    else {
        return Ok(None);
    };
    let start_ts: String = row.try_get("ts").map_err(map_sqlx)?;
    Ok(Some(Lifecycle {
        start_time: parse_datetime(&start_ts)?,
        active: row.try_get("open").map_err(map_sqlx)?,
    }))
}

/// Whole seconds from the stored start to `end_time`, never negative.
fn clamped_duration(session_id: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> i64 {
    let duration = (end_time - start_time).num_seconds();
    if duration < 0 {
        tracing::warn!(
            session_id,
            duration,
            "end time precedes start time, clamping duration to zero"
        );
        return 0;
    }
    duration
}

impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        validate_session(session)?;
        let doc = SessionDocument::from_session(session, &self.codec)?;
        let doc = &doc;
        let writer = &self.pool.writer;

        self.retry
            .run("CreateSession", DEFAULT_TIMEOUT, move || async move {
                sqlx::query(
                    r#"INSERT INTO sessions
                       (id, uid, nm, model_id, ts, last_activity, end_ts, dur, active,
                        help_requested, admin_assisted, assisting_admin_id, assisting_admin_name,
                        total_tokens, resp_times, max_resp_ms, avg_resp_ms, msgs,
                        created_at, modified_at)
                       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, json(?), ?, ?, json(?), ?, ?)"#,
                )
                .bind(&doc.id)
                .bind(&doc.user_id)
                .bind(&doc.name)
                .bind(&doc.model_id)
                .bind(&doc.start_time)
                .bind(&doc.last_activity)
                .bind(&doc.end_time)
                .bind(doc.duration_secs)
                .bind(doc.active)
                .bind(doc.help_requested)
                .bind(doc.admin_assisted)
                .bind(&doc.assisting_admin_id)
                .bind(&doc.assisting_admin_name)
                .bind(doc.total_tokens)
                .bind(&doc.response_times)
                .bind(doc.max_response_ms)
                .bind(doc.avg_response_ms)
                .bind(&doc.messages)
                .bind(&doc.modified_at)
                .bind(&doc.modified_at)
                .execute(writer)
                .await
                .map_err(|e| map_insert_error(e, &doc.id))
            })
            .await?;

        self.counters.session_created(doc.active);
        tracing::debug!(
            session_id = %session.id,
            user_id = %session.user_id,
            messages = session.messages.len(),
            "session created"
        );
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, StoreError> {
        validate_session_id(session_id)?;
        let reader = &self.pool.reader;

        let row = self
            .retry
            .run("GetSession", DEFAULT_TIMEOUT, move || async move {
                sqlx::query("SELECT * FROM sessions WHERE id = ?")
                    .bind(session_id)
                    .fetch_optional(reader)
                    .await
                    .map_err(map_sqlx)
            })
            .await?
            .ok_or(StoreError::SessionNotFound)?;

        SessionRow::from_row(&row)
            .map_err(map_sqlx)?
            .into_session(&self.codec)
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        validate_session(session)?;
        let doc = SessionDocument::from_session(session, &self.codec)?;
        let doc = &doc;
        let end_time = session.end_time;
        let session_id = session.id.as_str();
        let writer = &self.pool.writer;

        // id, uid, ts, msgs and created_at are immutable through this path.
        // A missing end time leaves the stored end state alone: only
        // EndSession, or an update carrying an end time, ends a session.
        let was_active = self
            .retry
            .run("UpdateSession", DEFAULT_TIMEOUT, move || async move {
                let lifecycle = load_lifecycle(writer, session_id)
                    .await?
                    .ok_or(StoreError::SessionNotFound)?;
                let duration =
                    end_time.map(|end| clamped_duration(session_id, lifecycle.start_time, end));

                let result = sqlx::query(
                    r#"UPDATE sessions SET
                         nm = ?, model_id = ?, last_activity = MAX(last_activity, ?),
                         end_ts = COALESCE(?, end_ts), dur = COALESCE(?, dur),
                         active = (COALESCE(?, end_ts) IS NULL), help_requested = ?,
                         admin_assisted = ?, assisting_admin_id = ?, assisting_admin_name = ?,
                         total_tokens = ?, resp_times = json(?), max_resp_ms = ?,
                         avg_resp_ms = ?, modified_at = ?
                       WHERE id = ?"#,
                )
                .bind(&doc.name)
                .bind(&doc.model_id)
                .bind(&doc.last_activity)
                .bind(&doc.end_time)
                .bind(duration)
                .bind(&doc.end_time)
                .bind(doc.help_requested)
                .bind(doc.admin_assisted)
                .bind(&doc.assisting_admin_id)
                .bind(&doc.assisting_admin_name)
                .bind(doc.total_tokens)
                .bind(&doc.response_times)
                .bind(doc.max_response_ms)
                .bind(doc.avg_response_ms)
                .bind(&doc.modified_at)
                .bind(session_id)
                .execute(writer)
                .await
                .map_err(map_sqlx)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::SessionNotFound);
                }
                Ok(lifecycle.active)
            })
            .await?;

        if end_time.is_some() {
            self.counters.session_ended(was_active, "UpdateSession");
        }
        tracing::debug!(session_id, "session updated");
        Ok(())
    }

    async fn add_message(&self, session_id: &str, message: &Message) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        let document = MessageDocument::seal(message, &self.codec)?.to_json()?;
        let document = document.as_str();
        let timestamp = format_datetime(&message.timestamp);
        let timestamp = timestamp.as_str();
        let modified_at = format_datetime(&Utc::now());
        let modified_at = modified_at.as_str();
        let writer = &self.pool.writer;

        // Single statement: concurrent appends never lose each other.
        let result = self
            .retry
            .run("AddMessage", MESSAGE_ADD_TIMEOUT, move || async move {
                sqlx::query(
                    r#"UPDATE sessions SET
                         msgs = json_insert(msgs, '$[#]', json(?)),
                         last_activity = MAX(last_activity, ?),
                         modified_at = ?
                       WHERE id = ?"#,
                )
                .bind(document)
                .bind(timestamp)
                .bind(modified_at)
                .bind(session_id)
                .execute(writer)
                .await
                .map_err(map_sqlx)
            })
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound);
        }

        tracing::debug!(session_id, sender = %message.sender, "message appended");
        Ok(())
    }

    async fn end_session(&self, session_id: &str, end_time: DateTime<Utc>) -> Result<(), StoreError> {
        validate_session_id(session_id)?;
        let writer = &self.pool.writer;
        let end_ts = format_datetime(&end_time);
        let end_ts = end_ts.as_str();

        let was_active = self
            .retry
            .run("EndSession", SESSION_END_TIMEOUT, move || async move {
                let lifecycle = load_lifecycle(writer, session_id)
                    .await?
                    .ok_or(StoreError::SessionNotFound)?;
                let duration = clamped_duration(session_id, lifecycle.start_time, end_time);

                let result = sqlx::query(
                    "UPDATE sessions SET end_ts = ?, dur = ?, active = 0, modified_at = ? WHERE id = ?",
                )
                .bind(end_ts)
                .bind(duration)
                .bind(format_datetime(&Utc::now()))
                .bind(session_id)
                .execute(writer)
                .await
                .map_err(map_sqlx)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::SessionNotFound);
                }
                Ok(lifecycle.active)
            })
            .await?;

        self.counters.session_ended(was_active, "EndSession");
        tracing::debug!(session_id, end_time = %end_time, "session ended");
        Ok(())
    }
}
