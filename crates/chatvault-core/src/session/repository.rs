//! Session repository trait definitions.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition). Implementations
//! live in chatvault-infra (e.g. `SqliteSessionStore`).

use chatvault_types::error::StoreError;
use chatvault_types::metrics::{Metrics, TokenUsage};
use chatvault_types::session::{Message, Session, SessionListOptions, SessionMetadata};
use chrono::{DateTime, Utc};

/// Lifecycle writes and full reads of session documents.
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails with `DuplicateSession` if the id is taken.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load a session with every message body decrypted.
    fn get_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Session, StoreError>> + Send;

    /// Replace the mutable scalar fields of an existing session.
    ///
    /// The transcript is left untouched; use `add_message` to extend it.
    /// An update without an end time never reopens an ended session, and a
    /// supplied end time is measured against the stored start time.
    fn update_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Atomically append one message and advance `last_activity`.
    ///
    /// Callers supply non-decreasing timestamps; `last_activity` never moves
    /// backwards if they do not.
    fn add_message(
        &self,
        session_id: &str,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Mark a session ended at `end_time`. Repeat calls overwrite the end time.
    fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// Filtered, sorted and paginated session listings.
pub trait SessionQuery: Send + Sync {
    fn list_sessions_with_options(
        &self,
        options: &SessionListOptions,
    ) -> impl std::future::Future<Output = Result<Vec<SessionMetadata>, StoreError>> + Send;

    /// One user's sessions, most recent first. `limit == 0` means unbounded.
    fn list_user_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SessionMetadata>, StoreError>> + Send {
        async move {
            if user_id.is_empty() {
                return Err(StoreError::InvalidUserId);
            }
            let options = SessionListOptions::for_user(user_id).with_limit(limit);
            self.list_sessions_with_options(&options).await
        }
    }

    /// Every session, most recent first. `limit == 0` means unbounded.
    fn list_all_sessions(
        &self,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SessionMetadata>, StoreError>> + Send {
        async move {
            let options = SessionListOptions::default().with_limit(limit);
            self.list_sessions_with_options(&options).await
        }
    }
}

/// Aggregates over sessions whose start time falls in `[start, end)`.
pub trait SessionMetrics: Send + Sync {
    fn session_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Metrics, StoreError>> + Send;

    fn token_usage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<TokenUsage, StoreError>> + Send;
}

/// Identity checks applied before a session is written.
pub fn validate_session(session: &Session) -> Result<(), StoreError> {
    validate_session_id(&session.id)?;
    if session.user_id.is_empty() {
        return Err(StoreError::InvalidUserId);
    }
    Ok(())
}

pub fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    if session_id.is_empty() {
        return Err(StoreError::InvalidSessionId);
    }
    Ok(())
}
