//! Business logic and repository trait definitions for chatvault.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, the retry executor every store call runs under, and the
//! pure aggregation used for metrics. It depends only on `chatvault-types` --
//! never on `chatvault-infra` or any database/IO crate.

pub mod metrics;
pub mod retry;
pub mod session;
