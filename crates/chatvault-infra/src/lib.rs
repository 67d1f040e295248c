//! Infrastructure layer for chatvault.
//!
//! Implements the repository traits defined in `chatvault-core`: the SQLite
//! document store (session store, query engine, metrics aggregator, index
//! manager), AES-GCM field encryption, lifecycle counters, and configuration
//! loading.

pub mod config;
pub mod counters;
pub mod crypto;
pub mod sqlite;
pub mod vault;

pub use vault::ChatVault;
