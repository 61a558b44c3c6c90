//! AgentDB command-line entry point.
//!
//! Binary name: `agentdb`
//!
//! Parses CLI arguments, sets up tracing, opens the database from its
//! snapshot, then dispatches to the command handler. Mutating commands
//! write the snapshot back before exit.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use agentdb_infra::filesystem::resolve_data_dir;
use agentdb_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use agentdb_types::config::StoreConfig;
use cli::experience::StoreArgs;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = filter_for_verbosity(cli.verbose, cli.quiet);
    init_tracing(filter, cli.otel).map_err(|e| anyhow::anyhow!(e))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need the database
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "agentdb", &mut std::io::stdout());
        return Ok(());
    }

    // Init writes the config that opening the database would read
    if let Commands::Init {
        db_name,
        dim,
        metric,
        index,
        next_state_index,
        force,
    } = &cli.command
    {
        let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
        let mut config = StoreConfig::new(db_name.clone(), *dim);
        config.metric = *metric;
        config.index = *index;
        config.index_next_state = *next_state_index;
        return cli::status::init(&data_dir, config, *force, cli.json).await;
    }

    let state = AppState::init(cli.data_dir.clone()).await?;
    let json = cli.json;
    let mutates = cli.command.is_mutation();

    match cli.command {
        Commands::Store {
            agent,
            state_vector,
            next_state_vector,
            action,
            reward,
            done,
            id,
            metadata,
        } => {
            let args = StoreArgs {
                agent,
                state_vector,
                next_state_vector,
                action,
                reward,
                done,
                id,
                metadata,
            };
            cli::experience::store_experience(&state, args, json)?;
        }

        Commands::Show { id } => {
            cli::experience::show_experience(&state, &id, json)?;
        }

        Commands::Query { vector, k, next_state } => {
            cli::experience::query_similar(&state, &vector, k, next_state, json)?;
        }

        Commands::Agent { agent } => {
            cli::agent::show_agent(&state, &agent, json)?;
        }

        Commands::Agents => {
            cli::agent::list_agents(&state, json)?;
        }

        Commands::Recent { n } => {
            cli::experience::recent(&state, n, json)?;
        }

        Commands::Stats => {
            cli::status::stats(&state, json)?;
        }

        Commands::Delete { id } => {
            cli::experience::delete_experience(&state, &id, json)?;
        }

        Commands::Clear { force } => {
            cli::experience::clear(&state, force, json)?;
        }

        Commands::Info => {
            cli::status::info(&state, json)?;
        }

        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    if mutates {
        state.persist().await?;
    }

    state.db.close();
    Ok(())
}
