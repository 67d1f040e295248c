//! Session browsing commands: list and show.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use chatvault_core::session::repository::{SessionQuery, SessionStore};
use chatvault_types::session::{Sender, SessionListOptions, SortField, SortOrder};

use super::ListArgs;
use crate::state::AppState;

impl ListArgs {
    /// Translate command-line flags into store list options.
    ///
    /// Unknown sort keys fall back to start time.
    pub fn to_options(&self) -> Result<SessionListOptions> {
        let sort_order: SortOrder = self
            .order
            .parse()
            .map_err(anyhow::Error::msg)
            .context("--order must be 'asc' or 'desc'")?;

        let active = match (self.active, self.ended) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        Ok(SessionListOptions {
            user_id: self.user.clone(),
            admin_assisted: self.admin_assisted,
            active,
            start_time_from: self.from,
            start_time_to: self.to,
            sort_by: SortField::from_logical(&self.sort),
            sort_order,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// List sessions as a table (or JSON).
///
/// # Examples
///
/// ```bash
/// chatvault list --user u-42 --sort message_count --limit 10
/// chatvault list --admin-assisted true --ended --json
/// ```
pub async fn list_sessions(state: &AppState, args: &ListArgs, json: bool) -> Result<()> {
    let options = args.to_options()?;
    let sessions = state
        .vault
        .query
        .list_sessions_with_options(&options)
        .await
        .context("failed to list sessions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!("  {} No sessions match.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("User").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Duration").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Tokens").fg(Color::White),
        Cell::new("Admin").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for session in &sessions {
        let duration = match session.end_time {
            Some(ended) => format_duration(ended - session.start_time),
            None => "ongoing".to_string(),
        };
        let status_cell = if session.is_active() {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("ended").fg(Color::DarkGrey)
        };
        let admin = if session.admin_assisted { "yes" } else { "" };

        table.add_row(vec![
            Cell::new(&session.id).fg(Color::Cyan),
            Cell::new(&session.user_id).fg(Color::White),
            Cell::new(session.start_time.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(duration).fg(Color::DarkGrey),
            Cell::new(session.message_count.to_string()),
            Cell::new(session.total_tokens.to_string()),
            Cell::new(admin).fg(Color::Yellow),
            status_cell,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{} (sorted by {} {})",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" },
        options.sort_by,
        options.sort_order
    );
    println!();

    Ok(())
}

/// Print one session and its decrypted transcript.
///
/// # Examples
///
/// ```bash
/// chatvault show 0192f0c4-5b1e-7c41-9a55-0d1f4f1f5a10
/// ```
pub async fn show_session(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    let session = state
        .vault
        .sessions
        .get_session(session_id)
        .await
        .with_context(|| format!("failed to load session '{session_id}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    let title = if session.name.is_empty() {
        "(untitled)"
    } else {
        session.name.as_str()
    };

    println!();
    println!("  {} {}", style(title).cyan().bold(), style(&session.id).dim());
    println!();
    println!("  User:      {}", session.user_id);
    if !session.model_id.is_empty() {
        println!("  Model:     {}", session.model_id);
    }
    println!(
        "  Started:   {}",
        session.start_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    match session.end_time {
        Some(ended) => println!(
            "  Ended:     {} ({})",
            ended.format("%Y-%m-%d %H:%M:%S UTC"),
            format_duration(ended - session.start_time)
        ),
        None => println!("  Status:    {}", style("active").green()),
    }
    println!("  Tokens:    {}", session.total_tokens);
    if !session.response_times.is_empty() {
        println!(
            "  Response:  avg {}ms / max {}ms",
            session.avg_response_time().as_millis(),
            session.max_response_time().as_millis()
        );
    }
    if session.admin_assisted {
        let admin = session
            .assisting_admin_name
            .as_deref()
            .or(session.assisting_admin_id.as_deref())
            .unwrap_or("unknown");
        println!("  Admin:     {}", style(admin).yellow());
    }
    println!();
    println!("  {}", style("── Transcript ──").dim());
    println!();

    if session.messages.is_empty() {
        println!("  {}", style("(no messages)").dim());
    }
    for message in &session.messages {
        let label = match message.sender {
            Sender::User => style("user").blue().bold(),
            Sender::Ai => style("ai").magenta().bold(),
            Sender::Admin => style("admin").yellow().bold(),
        };
        println!("  {} {}", label, style(message.timestamp.format("%H:%M:%S")).dim());
        println!("  {}", message.content);
        if let Some(url) = &message.file_url {
            println!("  {} {}", style("attachment:").dim(), url);
        }
        println!();
    }

    Ok(())
}

fn format_duration(duration: chrono::TimeDelta) -> String {
    let total_secs = duration.num_seconds().max(0);
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", total_secs)
    }
}
