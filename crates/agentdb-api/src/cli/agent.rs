//! Per-agent views: one agent's experiences, and reward summaries.

use anyhow::Result;
use comfy_table::Cell;
use console::style;

use agentdb_types::stats::AgentSummary;

use crate::cli::experience::{new_table, print_empty, record_table, reward_cell};
use crate::state::AppState;

pub fn show_agent(state: &AppState, agent_id: &str, json: bool) -> Result<()> {
    let records = state.db.get_agent_experiences(agent_id)?;
    let summary = state.db.agent_summary(agent_id)?;

    if json {
        let out = serde_json::json!({
            "agent_id": agent_id,
            "summary": summary,
            "experiences": records,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let Some(summary) = summary else {
        println!();
        println!(
            "  {} No experiences for agent '{}'",
            style("i").blue().bold(),
            agent_id
        );
        println!();
        return Ok(());
    };

    println!();
    println!("  {}", style(&summary.agent_id).cyan().bold());
    println!("  Experiences: {}", style(summary.experience_count).bold());
    println!("  Mean reward: {:.4}", summary.mean_reward);
    println!("  Total reward: {:.4}", summary.total_reward);
    println!("  Episodes:    {}", summary.episodes_completed);
    println!();
    println!("{}", record_table(&records));
    println!();
    Ok(())
}

pub fn list_agents(state: &AppState, json: bool) -> Result<()> {
    let summaries = state.db.agent_summaries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        print_empty("No agents yet.");
        return Ok(());
    }

    println!();
    println!("{}", summary_table(&summaries));
    println!();
    Ok(())
}

fn summary_table(summaries: &[AgentSummary]) -> comfy_table::Table {
    let mut table = new_table(vec![
        "Agent",
        "Experiences",
        "Mean Reward",
        "Total Reward",
        "Episodes",
    ]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(&summary.agent_id),
            Cell::new(summary.experience_count),
            reward_cell(summary.mean_reward),
            Cell::new(format!("{:.4}", summary.total_reward)),
            Cell::new(summary.episodes_completed),
        ]);
    }
    table
}
