//! chatvault CLI entry point.
//!
//! Binary name: `chatvault`
//!
//! Parses CLI arguments, initializes tracing and the store, then dispatches to
//! the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chatvault_infra=debug,chatvault_core=debug",
        _ => "trace",
    };
    chatvault_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init(cli.data_dir.clone()).await?;
    tracing::debug!(
        data_dir = %state.data_dir.display(),
        max_attempts = state.config.retry.max_attempts,
        "store opened"
    );

    // Ctrl+C aborts any in-flight retry wait.
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let result = match &cli.command {
        Commands::Indexes => cli::indexes::ensure_indexes(&state, cli.json).await,
        Commands::List(args) => cli::session::list_sessions(&state, args, cli.json).await,
        Commands::Show { session_id } => {
            cli::session::show_session(&state, session_id, cli.json).await
        }
        Commands::Metrics(window) => cli::metrics::show_metrics(&state, window, cli.json).await,
        Commands::Tokens(window) => cli::metrics::show_token_usage(&state, window, cli.json).await,
    };

    state.vault.close().await;
    chatvault_observe::shutdown_tracing();
    result
}
