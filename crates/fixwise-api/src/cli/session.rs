//! Session CLI commands: ask, history, sessions, delete.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use fixwise_infra::engine::SessionBackend;
use fixwise_types::reply::{AgentReply, InboundImage};
use fixwise_types::session::{ImageRef, SessionId, SessionMode, Sender, Turn};

use crate::state::AppState;

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

async fn read_image(path: &Path) -> Result<InboundImage> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image '{}'", path.display()))?;
    let reference = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(InboundImage::new(ImageRef::new(reference), data))
}

fn mode_label(mode: SessionMode) -> console::StyledObject<&'static str> {
    match mode {
        SessionMode::Discovery => style("discovery").yellow(),
        SessionMode::Guidance => style("guidance").green(),
    }
}

fn print_reply(reply: &AgentReply) {
    println!();
    for line in reply.text.lines() {
        println!("  {line}");
    }
    println!();
    if reply.resolved {
        println!("  {} Repair resolved", style("✓").green().bold());
    } else {
        println!("  {} {}", style("mode:").dim(), mode_label(reply.mode));
    }
    println!();
}

/// Send one turn to a session and print the reply.
///
/// ```bash
/// fixwise ask kitchen "my blender base is cracked" --image blender.jpg
/// ```
pub async fn ask(
    state: &AppState,
    session: &str,
    text: Option<&str>,
    image: Option<&Path>,
    out: Output,
) -> Result<()> {
    let image = match image {
        Some(path) => Some(read_image(path).await?),
        None => None,
    };

    let reply = state
        .manager
        .handle_message(&SessionId::from(session), text, image.as_ref())
        .await?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else if !out.quiet {
        print_reply(&reply);
    }
    Ok(())
}

fn sender_cell(turn: &Turn) -> Cell {
    match turn.sender {
        Sender::User => Cell::new("you").fg(Color::Cyan),
        Sender::Agent => Cell::new("fixwise").fg(Color::Green),
    }
}

/// Print a session's history as a table.
pub async fn history(state: &AppState, session: &str, out: Output) -> Result<()> {
    let turns = state.manager.get_history(&SessionId::from(session)).await?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("Message").fg(Color::White),
        Cell::new("Image").fg(Color::White),
    ]);

    for turn in &turns {
        let image = turn
            .image
            .as_ref()
            .map(|i| i.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(turn.created_at.format("%Y-%m-%d %H:%M:%S").to_string()).fg(Color::DarkGrey),
            sender_cell(turn),
            Cell::new(&turn.text),
            Cell::new(image).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  History for '{}'", style(session).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} turn{}",
        style(turns.len()).bold(),
        if turns.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// List stored sessions.
pub async fn list_sessions(state: &AppState, limit: u32, out: Output) -> Result<()> {
    let summaries = match state.manager.store() {
        SessionBackend::Sqlite(store) => store.list(limit).await?,
        SessionBackend::Memory(_) => Vec::new(),
    };

    if out.json {
        let rows: Vec<serde_json::Value> = summaries
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "mode": s.mode,
                    "turn_count": s.turn_count,
                    "created_at": s.created_at,
                    "last_activity_at": s.last_activity_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    if summaries.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("fixwise ask <session> \"what's broken\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Mode").fg(Color::White),
        Cell::new("Turns").fg(Color::White),
        Cell::new("Last active").fg(Color::White),
    ]);
    for s in &summaries {
        let mode = match s.mode {
            SessionMode::Discovery => Cell::new("discovery").fg(Color::Yellow),
            SessionMode::Guidance => Cell::new("guidance").fg(Color::Green),
        };
        table.add_row(vec![
            Cell::new(s.id.as_str()).fg(Color::Cyan),
            mode,
            Cell::new(s.turn_count.to_string()),
            Cell::new(s.last_activity_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Delete a session.
pub async fn delete(state: &AppState, session: &str, out: Output) -> Result<()> {
    state.manager.delete_session(&SessionId::from(session)).await?;

    if out.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "id": session, "deleted": true }))?
        );
    } else if !out.quiet {
        println!();
        println!("  {} Deleted session '{}'", style("✓").green().bold(), session);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixwise_types::config::EngineConfig;

    fn offline_state() -> AppState {
        let config = EngineConfig {
            adapters: Vec::new(),
            ..EngineConfig::default()
        };
        AppState::from_parts(config, SessionBackend::memory(), std::env::temp_dir()).unwrap()
    }

    const QUIET: Output = Output {
        json: false,
        quiet: true,
    };

    #[tokio::test]
    async fn ask_then_history_then_delete() {
        let state = offline_state();
        ask(&state, "cli-1", Some("my lamp flickers"), None, QUIET)
            .await
            .unwrap();

        let turns = state.manager.get_history(&SessionId::from("cli-1")).await.unwrap();
        assert_eq!(turns.len(), 2);
        history(&state, "cli-1", QUIET).await.unwrap();

        delete(&state, "cli-1", QUIET).await.unwrap();
        assert!(history(&state, "cli-1", QUIET).await.is_err());
    }

    #[tokio::test]
    async fn ask_reads_the_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toaster.jpg");
        tokio::fs::write(&path, b"not really a jpeg").await.unwrap();

        let state = offline_state();
        ask(&state, "cli-2", None, Some(&path), QUIET).await.unwrap();

        let turns = state.manager.get_history(&SessionId::from("cli-2")).await.unwrap();
        assert_eq!(turns[0].image, Some(ImageRef::new("toaster.jpg")));
    }

    #[tokio::test]
    async fn missing_image_file_is_an_error() {
        let state = offline_state();
        let err = ask(&state, "cli-3", None, Some(Path::new("/nonexistent/x.jpg")), QUIET)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read image"));
    }
}
