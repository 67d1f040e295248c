//! Shared domain types for chatvault.
//!
//! Sessions, messages, list options, metrics, configuration and the error
//! taxonomy shared by the core and infrastructure crates.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod metrics;
pub mod session;
