//! Aggregate statistics over the sessions started inside a time window.

use serde::{Deserialize, Serialize};

/// Snapshot of session activity for `[start, end)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_sessions: u64,
    /// Sessions with no end time recorded.
    pub active_sessions: u64,
    /// Time-weighted mean of simultaneously open sessions across the window.
    pub avg_concurrent: f64,
    pub max_concurrent: u64,
    pub total_tokens: u64,
    pub avg_tokens_per_session: f64,
    /// Mean over every recorded response time, in milliseconds.
    pub avg_response_ms: u64,
    pub max_response_ms: u64,
    pub admin_assisted_count: u64,
}

/// Token consumption for `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub session_count: u64,
    pub avg_tokens_per_session: f64,
}

impl TokenUsage {
    pub fn new(total_tokens: u64, session_count: u64) -> Self {
        let avg_tokens_per_session = if session_count == 0 {
            0.0
        } else {
            total_tokens as f64 / session_count as f64
        };
        Self {
            total_tokens,
            session_count,
            avg_tokens_per_session,
        }
    }
}
