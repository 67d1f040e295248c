//! Mapping between domain sessions and their stored row/document form.
//!
//! A session row holds scalar columns plus two JSON columns: `msgs` (array of
//! message documents, content encrypted at rest) and `resp_times` (array of
//! response times in milliseconds).

use std::collections::HashMap;
use std::time::Duration;

use chatvault_types::error::StoreError;
use chatvault_types::session::{Message, Sender, Session, SessionMetadata};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::crypto::EncryptionCodec;

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 (nanoseconds, `Z` suffix) so text order is time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid datetime '{s}': {e}")))
}

fn parse_optional_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(parse_datetime).transpose()
}

/// Map a driver error onto the store taxonomy.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    StoreError::backend(err.to_string())
}

/// Like [`map_sqlx`], but a primary-key collision becomes `DuplicateSession`.
pub(crate) fn map_insert_error(err: sqlx::Error, session_id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.message().contains("UNIQUE constraint failed") =>
        {
            StoreError::DuplicateSession(session_id.to_string())
        }
        _ => map_sqlx(err),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn duration_ms(d: &Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Message documents
// ---------------------------------------------------------------------------

/// Stored shape of one transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MessageDocument {
    pub content: String,
    pub ts: String,
    pub sender: Sender,
    #[serde(rename = "fileId", default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
}

impl MessageDocument {
    /// Encrypt the content of `message` for storage.
    pub fn seal(message: &Message, codec: &EncryptionCodec) -> Result<Self, StoreError> {
        Ok(Self {
            content: codec.encrypt(&message.content)?,
            ts: format_datetime(&message.timestamp),
            sender: message.sender,
            file_id: message.file_id.clone(),
            file_url: message.file_url.clone(),
            meta: message.metadata.clone(),
        })
    }

    /// Decrypt back into a domain message.
    pub fn open(self, codec: &EncryptionCodec) -> Result<Message, StoreError> {
        Ok(Message {
            content: codec.decrypt(&self.content)?,
            timestamp: parse_datetime(&self.ts)?,
            sender: self.sender,
            file_id: self.file_id,
            file_url: self.file_url,
            metadata: self.meta,
        })
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode message: {e}")))
    }
}

/// Encrypt and serialize a whole transcript as a JSON array.
pub(crate) fn encode_messages(
    messages: &[Message],
    codec: &EncryptionCodec,
) -> Result<String, StoreError> {
    let documents = messages
        .iter()
        .map(|m| MessageDocument::seal(m, codec))
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string(&documents)
        .map_err(|e| StoreError::Corrupt(format!("failed to encode messages: {e}")))
}

fn decode_messages(raw: &str, codec: &EncryptionCodec) -> Result<Vec<Message>, StoreError> {
    let documents: Vec<MessageDocument> = serde_json::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("invalid message array: {e}")))?;
    documents.into_iter().map(|d| d.open(codec)).collect()
}

/// Parse the `resp_times` column (milliseconds).
pub(crate) fn decode_response_ms(raw: &str) -> Result<Vec<u64>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("invalid response times: {e}")))
}

// ---------------------------------------------------------------------------
// Outgoing row
// ---------------------------------------------------------------------------

/// Every column written by create/update, already encoded for binding.
pub(crate) struct SessionDocument {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub model_id: String,
    pub start_time: String,
    pub last_activity: String,
    pub end_time: Option<String>,
    pub duration_secs: i64,
    pub active: bool,
    pub help_requested: bool,
    pub admin_assisted: bool,
    pub assisting_admin_id: Option<String>,
    pub assisting_admin_name: Option<String>,
    pub total_tokens: i64,
    pub response_times: String,
    pub max_response_ms: i64,
    pub avg_response_ms: i64,
    pub messages: String,
    pub modified_at: String,
}

impl SessionDocument {
    /// Encode `session`. `is_active` is derived from `end_time`.
    pub fn from_session(session: &Session, codec: &EncryptionCodec) -> Result<Self, StoreError> {
        let response_ms: Vec<u64> = session.response_times.iter().map(duration_ms).collect();
        let response_times = serde_json::to_string(&response_ms)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode response times: {e}")))?;

        let duration_secs = session.duration_secs().unwrap_or(0);

        Ok(Self {
            id: session.id.clone(),
            user_id: session.user_id.clone(),
            name: session.name.clone(),
            model_id: session.model_id.clone(),
            start_time: format_datetime(&session.start_time),
            last_activity: format_datetime(&session.last_activity),
            end_time: session.end_time.as_ref().map(format_datetime),
            duration_secs,
            active: session.end_time.is_none(),
            help_requested: session.help_requested,
            admin_assisted: session.admin_assisted,
            assisting_admin_id: session.assisting_admin_id.clone(),
            assisting_admin_name: session.assisting_admin_name.clone(),
            total_tokens: to_i64(session.total_tokens),
            response_times,
            max_response_ms: to_i64(duration_ms(&session.max_response_time())),
            avg_response_ms: to_i64(duration_ms(&session.avg_response_time())),
            messages: encode_messages(&session.messages, codec)?,
            modified_at: format_datetime(&Utc::now()),
        })
    }
}

// ---------------------------------------------------------------------------
// Incoming rows
// ---------------------------------------------------------------------------

/// Full session row, as read by `get_session`.
pub(crate) struct SessionRow {
    id: String,
    uid: String,
    nm: String,
    model_id: String,
    ts: String,
    last_activity: String,
    end_ts: Option<String>,
    help_requested: bool,
    admin_assisted: bool,
    assisting_admin_id: Option<String>,
    assisting_admin_name: Option<String>,
    total_tokens: i64,
    resp_times: String,
    msgs: String,
}

impl SessionRow {
    pub fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            uid: row.try_get("uid")?,
            nm: row.try_get("nm")?,
            model_id: row.try_get("model_id")?,
            ts: row.try_get("ts")?,
            last_activity: row.try_get("last_activity")?,
            end_ts: row.try_get("end_ts")?,
            help_requested: row.try_get("help_requested")?,
            admin_assisted: row.try_get("admin_assisted")?,
            assisting_admin_id: row.try_get("assisting_admin_id")?,
            assisting_admin_name: row.try_get("assisting_admin_name")?,
            total_tokens: row.try_get("total_tokens")?,
            resp_times: row.try_get("resp_times")?,
            msgs: row.try_get("msgs")?,
        })
    }

    /// Decode and decrypt. Any undecryptable message fails the whole read.
    pub fn into_session(self, codec: &EncryptionCodec) -> Result<Session, StoreError> {
        let end_time = parse_optional_datetime(self.end_ts.as_deref())?;
        let response_times = decode_response_ms(&self.resp_times)?
            .into_iter()
            .map(Duration::from_millis)
            .collect();

        Ok(Session {
            id: self.id,
            user_id: self.uid,
            name: self.nm,
            model_id: self.model_id,
            messages: decode_messages(&self.msgs, codec)?,
            start_time: parse_datetime(&self.ts)?,
            last_activity: parse_datetime(&self.last_activity)?,
            end_time,
            is_active: end_time.is_none(),
            help_requested: self.help_requested,
            admin_assisted: self.admin_assisted,
            assisting_admin_id: self.assisting_admin_id,
            assisting_admin_name: self.assisting_admin_name,
            total_tokens: to_u64(self.total_tokens),
            response_times,
        })
    }
}

/// Listing projection; message bodies are never loaded.
pub(crate) struct MetadataRow {
    id: String,
    uid: String,
    nm: String,
    model_id: String,
    ts: String,
    end_ts: Option<String>,
    last_activity: String,
    last_message_time: String,
    message_count: i64,
    admin_assisted: bool,
    total_tokens: i64,
    max_resp_ms: i64,
    avg_resp_ms: i64,
}

impl MetadataRow {
    pub fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            uid: row.try_get("uid")?,
            nm: row.try_get("nm")?,
            model_id: row.try_get("model_id")?,
            ts: row.try_get("ts")?,
            end_ts: row.try_get("end_ts")?,
            last_activity: row.try_get("last_activity")?,
            last_message_time: row.try_get("last_message_time")?,
            message_count: row.try_get("message_count")?,
            admin_assisted: row.try_get("admin_assisted")?,
            total_tokens: row.try_get("total_tokens")?,
            max_resp_ms: row.try_get("max_resp_ms")?,
            avg_resp_ms: row.try_get("avg_resp_ms")?,
        })
    }

    pub fn into_metadata(self) -> Result<SessionMetadata, StoreError> {
        Ok(SessionMetadata {
            id: self.id,
            user_id: self.uid,
            name: self.nm,
            model_id: self.model_id,
            start_time: parse_datetime(&self.ts)?,
            end_time: parse_optional_datetime(self.end_ts.as_deref())?,
            last_activity: parse_datetime(&self.last_activity)?,
            last_message_time: parse_datetime(&self.last_message_time)?,
            message_count: to_u64(self.message_count),
            admin_assisted: self.admin_assisted,
            total_tokens: to_u64(self.total_tokens),
            max_response_ms: to_u64(self.max_resp_ms),
            avg_response_ms: to_u64(self.avg_resp_ms),
        })
    }
}
