//! SQLite document store.
//!
//! One row per session with the transcript held in a JSON column. Split
//! read/write pools in WAL mode; every statement runs under the retry executor
//! with a per-operation deadline.

use std::time::Duration;

mod document;
pub mod indexes;
pub mod metrics;
pub mod pool;
pub mod query;
pub mod session;

/// Deadline for create, get and update.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const MESSAGE_ADD_TIMEOUT: Duration = Duration::from_secs(5);
pub const SESSION_END_TIMEOUT: Duration = Duration::from_secs(5);
pub const LIST_TIMEOUT: Duration = Duration::from_secs(30);
pub const METRICS_TIMEOUT: Duration = Duration::from_secs(30);
pub const INDEX_TIMEOUT: Duration = Duration::from_secs(30);
