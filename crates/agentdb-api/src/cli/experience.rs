//! Experience commands: store, show, query, recent, delete, clear.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use agentdb_types::experience::{ExperienceRecord, NewExperience, ScoredExperience};

use crate::state::AppState;

/// Arguments of `agentdb store`, already split from clap.
pub struct StoreArgs {
    pub agent: String,
    pub state_vector: String,
    pub next_state_vector: String,
    pub action: String,
    pub reward: f64,
    pub done: bool,
    pub id: Option<String>,
    pub metadata: Vec<String>,
}

/// Parse a comma separated vector such as `"0.1, -2,3e-2"`.
pub fn parse_vector(input: &str) -> Result<Vec<f32>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("invalid vector component '{s}'"))
        })
        .collect()
}

/// Parse repeated `key=value` flags into a map. Later keys win.
pub fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("metadata '{entry}' must be key=value");
        };
        if key.trim().is_empty() {
            bail!("metadata '{entry}' has an empty key");
        }
        metadata.insert(key.trim().to_string(), value.to_string());
    }
    Ok(metadata)
}

pub fn store_experience(state: &AppState, args: StoreArgs, json: bool) -> Result<()> {
    let experience = NewExperience {
        id: args.id,
        state_vector: parse_vector(&args.state_vector)?,
        next_state_vector: parse_vector(&args.next_state_vector)?,
        action: args.action,
        reward: args.reward,
        done: args.done,
        metadata: parse_metadata(&args.metadata)?,
        timestamp: None,
    };

    let record = state.db.store_experience(&args.agent, experience)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Stored experience {} for agent {}",
        style("✓").green().bold(),
        style(&record.id).cyan(),
        style(&record.agent_id).bold()
    );
    println!();
    Ok(())
}

pub fn show_experience(state: &AppState, id: &str, json: bool) -> Result<()> {
    let record = state.db.get_experience(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&record.id).cyan().bold());
    println!("  Agent:      {}", record.agent_id);
    println!("  Action:     {}", record.action);
    println!("  Reward:     {}", format_reward(record.reward));
    println!("  Done:       {}", record.done);
    println!("  Time:       {}", format_timestamp(record.timestamp));
    println!("  State:      {}", format_vector(&record.state_vector));
    println!("  Next state: {}", format_vector(&record.next_state_vector));
    if !record.metadata.is_empty() {
        println!("  {}", style("── Metadata ──").dim());
        for (key, value) in &record.metadata {
            println!("  {key}: {value}");
        }
    }
    println!();
    Ok(())
}

pub fn query_similar(
    state: &AppState,
    vector: &str,
    k: usize,
    next_state: bool,
    json: bool,
) -> Result<()> {
    let query = parse_vector(vector)?;
    let hits = if next_state {
        state.db.query_similar_next_state(&query, k)?
    } else {
        state.db.query_similar_scored(&query, k)?
    };

    if json {
        let rows: Vec<_> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "distance": hit.distance,
                    "experience": hit.record,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if hits.is_empty() {
        print_empty("No experiences stored yet.");
        return Ok(());
    }

    println!();
    println!("{}", scored_table(&hits));
    println!();
    Ok(())
}

pub fn recent(state: &AppState, n: usize, json: bool) -> Result<()> {
    let records = state.db.recent(n)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        print_empty("No experiences stored yet.");
        return Ok(());
    }

    println!();
    println!("{}", record_table(&records));
    println!();
    Ok(())
}

pub fn delete_experience(state: &AppState, id: &str, json: bool) -> Result<()> {
    let removed = state.db.delete_experience(id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "deleted": removed.id }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Deleted experience {}",
        style("✓").green().bold(),
        style(&removed.id).cyan()
    );
    println!();
    Ok(())
}

pub fn clear(state: &AppState, force: bool, json: bool) -> Result<()> {
    if !force {
        println!();
        println!(
            "  {} This removes every experience. Re-run with {} to confirm.",
            style("!").yellow().bold(),
            style("agentdb clear --force").yellow()
        );
        println!();
        return Ok(());
    }

    let removed = state.db.clear()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "cleared": removed }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Cleared {} experiences",
        style("✓").green().bold(),
        style(removed).bold()
    );
    println!();
    Ok(())
}

pub(crate) fn record_table(records: &[ExperienceRecord]) -> Table {
    let mut table = new_table(vec!["ID", "Agent", "Action", "Reward", "Done", "Time"]);
    for record in records {
        table.add_row(vec![
            Cell::new(short_id(&record.id)),
            Cell::new(&record.agent_id),
            Cell::new(&record.action),
            reward_cell(record.reward),
            Cell::new(if record.done { "yes" } else { "" }),
            Cell::new(format_timestamp(record.timestamp)),
        ]);
    }
    table
}

fn scored_table(hits: &[ScoredExperience]) -> Table {
    let mut table = new_table(vec!["#", "Distance", "ID", "Agent", "Action", "Reward"]);
    for (rank, hit) in hits.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:.4}", hit.distance)),
            Cell::new(short_id(&hit.record.id)),
            Cell::new(&hit.record.agent_id),
            Cell::new(&hit.record.action),
            reward_cell(hit.record.reward),
        ]);
    }
    table
}

pub(crate) fn new_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .into_iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

pub(crate) fn reward_cell(reward: f64) -> Cell {
    let cell = Cell::new(format!("{reward:.4}"));
    if reward > 0.0 {
        cell.fg(Color::Green)
    } else if reward < 0.0 {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

pub(crate) fn print_empty(message: &str) {
    println!();
    println!(
        "  {} {message} Add one with: {}",
        style("i").blue().bold(),
        style("agentdb store").yellow()
    );
    println!();
}

fn format_reward(reward: f64) -> String {
    let text = format!("{reward:.4}");
    if reward > 0.0 {
        style(text).green().to_string()
    } else if reward < 0.0 {
        style(text).red().to_string()
    } else {
        text
    }
}

fn format_vector(vector: &[f32]) -> String {
    const SHOWN: usize = 6;
    let head: Vec<String> = vector.iter().take(SHOWN).map(|v| format!("{v:.3}")).collect();
    if vector.len() > SHOWN {
        format!("[{}, ... ({} dims)]", head.join(", "), vector.len())
    } else {
        format!("[{}]", head.join(", "))
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// UUIDs are long; show the first 8 chars.
fn short_id(id: &str) -> String {
    if id.chars().count() > 12 {
        id.chars().take(8).collect()
    } else {
        id.to_string()
    }
}
