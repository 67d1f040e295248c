//! CLI command definitions for the `chatvault` binary.
//!
//! Uses clap derive macros. Every command honours the global `--json` flag.

pub mod indexes;
pub mod metrics;
pub mod session;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

/// Inspect and maintain the encrypted chat session store.
#[derive(Parser, Debug)]
#[command(name = "chatvault", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory holding config.toml and the session database.
    #[arg(long, global = true, env = "CHATVAULT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create any missing session indexes, then list them.
    Indexes,

    /// List sessions with filters, sorting and pagination.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one session with its decrypted transcript.
    Show {
        /// Session id.
        session_id: String,
    },

    /// Aggregate metrics for sessions started in a time window.
    Metrics(WindowArgs),

    /// Token usage for sessions started in a time window.
    Tokens(WindowArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only sessions of this user.
    #[arg(long)]
    pub user: Option<String>,

    /// Filter on whether an admin assisted (true/false).
    #[arg(long)]
    pub admin_assisted: Option<bool>,

    /// Only sessions that have not ended.
    #[arg(long, conflicts_with = "ended")]
    pub active: bool,

    /// Only sessions that have ended.
    #[arg(long)]
    pub ended: bool,

    /// Earliest start time, inclusive (RFC 3339).
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,

    /// Latest start time, inclusive (RFC 3339).
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,

    /// Sort key: ts, endTs, message_count, totalTokens or uid.
    #[arg(long, default_value = "ts")]
    pub sort: String,

    /// Sort direction: asc or desc.
    #[arg(long, default_value = "desc")]
    pub order: String,

    /// Maximum number of sessions (0 = no limit).
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Number of sessions to skip.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Window start, inclusive (RFC 3339). Defaults to `--hours` before the end.
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,

    /// Window end, exclusive (RFC 3339). Defaults to now.
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,

    /// Window length in hours when `--from` is omitted.
    #[arg(long, default_value_t = 24)]
    pub hours: u32,
}

impl WindowArgs {
    /// Resolve to a concrete `[start, end)` window relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.to.unwrap_or(now);
        let start = self
            .from
            .unwrap_or_else(|| end - chrono::Duration::hours(i64::from(self.hours)));
        (start, end)
    }
}
