//! Reporting commands: metrics and token usage over a time window.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;

use chatvault_core::session::repository::SessionMetrics;

use super::WindowArgs;
use crate::state::AppState;

fn print_window(start: DateTime<Utc>, end: DateTime<Utc>) {
    println!(
        "  {} {} → {}",
        style("Window:").dim(),
        start.format("%Y-%m-%d %H:%M UTC"),
        end.format("%Y-%m-%d %H:%M UTC")
    );
}

/// # Examples
///
/// ```bash
/// chatvault metrics --hours 168
/// chatvault metrics --from 2024-05-01T00:00:00Z --to 2024-06-01T00:00:00Z --json
/// ```
pub async fn show_metrics(state: &AppState, window: &WindowArgs, json: bool) -> Result<()> {
    let (start, end) = window.resolve(Utc::now());
    let metrics = state
        .vault
        .metrics
        .session_metrics(start, end)
        .await
        .context("failed to compute session metrics")?;

    if json {
        let report = serde_json::json!({
            "start": start,
            "end": end,
            "metrics": metrics,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    print_window(start, end);
    println!();
    println!("  {}", style("── Sessions ──").dim());
    println!("  Total:           {}", style(metrics.total_sessions).bold());
    println!("  Active:          {}", style(metrics.active_sessions).green());
    println!("  Admin assisted:  {}", style(metrics.admin_assisted_count).yellow());
    println!("  Avg concurrent:  {:.2}", metrics.avg_concurrent);
    println!("  Max concurrent:  {}", metrics.max_concurrent);
    println!();
    println!("  {}", style("── Usage ──").dim());
    println!("  Tokens:          {}", style(metrics.total_tokens).bold());
    println!("  Tokens/session:  {:.1}", metrics.avg_tokens_per_session);
    println!("  Avg response:    {}ms", metrics.avg_response_ms);
    println!("  Max response:    {}ms", metrics.max_response_ms);
    println!();

    Ok(())
}

pub async fn show_token_usage(state: &AppState, window: &WindowArgs, json: bool) -> Result<()> {
    let (start, end) = window.resolve(Utc::now());
    let usage = state
        .vault
        .metrics
        .token_usage(start, end)
        .await
        .context("failed to compute token usage")?;

    if json {
        let report = serde_json::json!({
            "start": start,
            "end": end,
            "usage": usage,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    print_window(start, end);
    println!();
    println!("  Tokens:          {}", style(usage.total_tokens).bold());
    println!("  Sessions:        {}", usage.session_count);
    println!("  Tokens/session:  {:.1}", usage.avg_tokens_per_session);
    println!();

    Ok(())
}
