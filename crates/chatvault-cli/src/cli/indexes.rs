//! `chatvault indexes`: create missing session indexes and report them.

use anyhow::{Context, Result};
use console::style;

use chatvault_infra::sqlite::indexes::index_names;

use crate::state::AppState;

pub async fn ensure_indexes(state: &AppState, json: bool) -> Result<()> {
    state
        .vault
        .indexes
        .ensure_indexes()
        .await
        .context("failed to create session indexes")?;

    let present = state
        .vault
        .indexes
        .list_indexes()
        .await
        .context("failed to list session indexes")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&present)?);
        return Ok(());
    }

    println!();
    for name in index_names() {
        let mark = if present.iter().any(|p| p == name) {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {mark} {name}");
    }
    println!();

    Ok(())
}
