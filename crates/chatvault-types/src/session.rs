//! Chat session and message types for chatvault.
//!
//! A [`Session`] is one conversation between a user and the assistant,
//! owned in memory by the serving layer and persisted by the session store.
//! [`SessionMetadata`] is the lightweight projection returned by list queries,
//! and [`SessionListOptions`] describes a filtered/sorted/paginated listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    Admin,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
            Sender::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "ai" => Ok(Sender::Ai),
            "admin" => Ok(Sender::Admin),
            other => Err(format!("invalid message sender: '{other}'")),
        }
    }
}

/// One transcript entry.
///
/// `content` is plaintext here; the store encrypts it at rest when an
/// encryption key is configured and decrypts it transparently on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// A plain text message with no attachment or metadata.
    pub fn new(sender: Sender, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            timestamp,
            sender,
            file_id: None,
            file_url: None,
            metadata: HashMap::new(),
        }
    }
}

/// A conversation and its lifecycle state.
///
/// `id` is assigned by the caller and must be globally unique. `is_active`
/// is stored alongside `end_time` but always mirrors it: a session with an
/// end time is inactive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub model_id: String,
    /// Transcript in insertion order. Callers append in non-decreasing
    /// timestamp order; the store never re-sorts.
    #[serde(default)]
    pub messages: Vec<Message>,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub help_requested: bool,
    pub admin_assisted: bool,
    pub assisting_admin_id: Option<String>,
    pub assisting_admin_name: Option<String>,
    pub total_tokens: u64,
    #[serde(default)]
    pub response_times: Vec<Duration>,
}

impl Session {
    /// A fresh, active session with no messages.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: String::new(),
            model_id: String::new(),
            messages: Vec::new(),
            start_time,
            last_activity: start_time,
            end_time: None,
            is_active: true,
            help_requested: false,
            admin_assisted: false,
            assisting_admin_id: None,
            assisting_admin_name: None,
            total_tokens: 0,
            response_times: Vec::new(),
        }
    }

    /// Whole seconds between start and end, clamped at zero.
    ///
    /// `None` while the session is still open.
    pub fn duration_secs(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_seconds().max(0))
    }

    /// Longest recorded response time.
    pub fn max_response_time(&self) -> Duration {
        self.response_times.iter().copied().max().unwrap_or_default()
    }

    /// Mean of the recorded response times (zero when none are recorded).
    pub fn avg_response_time(&self) -> Duration {
        if self.response_times.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.response_times.iter().sum();
        total / self.response_times.len() as u32
    }
}

/// Summary row returned by list queries. Never carries message bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub model_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    /// Timestamp of the last message, or `start_time` for an empty transcript.
    pub last_message_time: DateTime<Utc>,
    pub message_count: u64,
    pub admin_assisted: bool,
    pub total_tokens: u64,
    pub max_response_ms: u64,
    pub avg_response_ms: u64,
}

impl SessionMetadata {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Logical sort keys accepted by [`SessionListOptions::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    /// `"ts"`
    #[default]
    StartTime,
    /// `"endTs"`
    EndTime,
    /// `"message_count"`
    MessageCount,
    /// `"totalTokens"`
    TotalTokens,
    /// `"uid"`
    UserId,
}

impl SortField {
    /// Resolve a logical name. Unknown or empty names sort by start time.
    pub fn from_logical(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn as_logical(&self) -> &'static str {
        match self {
            SortField::StartTime => "ts",
            SortField::EndTime => "endTs",
            SortField::MessageCount => "message_count",
            SortField::TotalTokens => "totalTokens",
            SortField::UserId => "uid",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_logical())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ts" => Ok(SortField::StartTime),
            "endTs" => Ok(SortField::EndTime),
            "message_count" => Ok(SortField::MessageCount),
            "totalTokens" => Ok(SortField::TotalTokens),
            "uid" => Ok(SortField::UserId),
            other => Err(format!("invalid sort field: '{other}'")),
        }
    }
}

/// Sort direction. Listing defaults to most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("invalid sort order: '{other}'")),
        }
    }
}

/// Filter, sort and pagination for session listings.
///
/// Populated filters combine conjunctively. `limit == 0` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionListOptions {
    /// Exact match on user id.
    pub user_id: Option<String>,
    pub admin_assisted: Option<bool>,
    /// `Some(true)` keeps sessions with no end time, `Some(false)` ended ones.
    pub active: Option<bool>,
    /// Inclusive lower bound on `start_time`.
    pub start_time_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `start_time`.
    pub start_time_to: Option<DateTime<Utc>>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl SessionListOptions {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn sorted(mut self, sort_by: SortField, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_sender_roundtrip() {
        for sender in [Sender::User, Sender::Ai, Sender::Admin] {
            let parsed: Sender = sender.to_string().parse().unwrap();
            assert_eq!(parsed, sender);
        }
        assert!("robot".parse::<Sender>().is_err());
    }

    #[test]
    fn test_sender_serde_lowercase() {
        let json = serde_json::to_string(&Sender::Ai).unwrap();
        assert_eq!(json, "\"ai\"");
    }

    #[test]
    fn test_new_session_is_active() {
        let session = Session::new("s-1", "u-1", at(0));
        assert!(session.is_active);
        assert!(session.end_time.is_none());
        assert_eq!(session.last_activity, session.start_time);
        assert_eq!(session.duration_secs(), None);
    }

    #[test]
    fn test_duration_secs_clamps_negative() {
        let mut session = Session::new("s-1", "u-1", at(100));
        session.end_time = Some(at(160));
        assert_eq!(session.duration_secs(), Some(60));

        session.end_time = Some(at(40));
        assert_eq!(session.duration_secs(), Some(0));
    }

    #[test]
    fn test_response_time_summary() {
        let mut session = Session::new("s-1", "u-1", at(0));
        assert_eq!(session.max_response_time(), Duration::ZERO);
        assert_eq!(session.avg_response_time(), Duration::ZERO);

        session.response_times = vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(200),
        ];
        assert_eq!(session.max_response_time(), Duration::from_millis(300));
        assert_eq!(session.avg_response_time(), Duration::from_millis(200));
    }

    #[test]
    fn test_sort_field_logical_names() {
        assert_eq!(SortField::from_logical("ts"), SortField::StartTime);
        assert_eq!(SortField::from_logical("endTs"), SortField::EndTime);
        assert_eq!(SortField::from_logical("message_count"), SortField::MessageCount);
        assert_eq!(SortField::from_logical("totalTokens"), SortField::TotalTokens);
        assert_eq!(SortField::from_logical("uid"), SortField::UserId);
        assert_eq!(SortField::from_logical(""), SortField::StartTime);
        assert_eq!(SortField::from_logical("bogus"), SortField::StartTime);
    }

    #[test]
    fn test_list_options_default_is_most_recent_first() {
        let opts = SessionListOptions::default();
        assert_eq!(opts.sort_by, SortField::StartTime);
        assert_eq!(opts.sort_order, SortOrder::Desc);
        assert_eq!(opts.limit, 0);
        assert!(opts.user_id.is_none());
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
