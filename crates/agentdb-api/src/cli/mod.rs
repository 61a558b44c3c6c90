//! CLI command definitions for the `agentdb` binary.
//!
//! Uses clap derive macros for argument parsing. Every command loads the
//! snapshot for the configured database, runs one operation and, for
//! mutations, writes the snapshot back.

pub mod agent;
pub mod experience;
pub mod status;

use std::path::PathBuf;

use agentdb_types::config::{DistanceMetric, IndexKind};
use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Experience-replay store for reinforcement-learning agents.
#[derive(Parser)]
#[command(name = "agentdb", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to $AGENTDB_DATA_DIR or ~/.agentdb).
    #[arg(long, global = true, env = "AGENTDB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write agentdb.toml for a new database.
    Init {
        /// Database name; also names the snapshot file.
        #[arg(long, default_value = "agentdb")]
        db_name: String,

        /// Vector dimension every experience must use.
        #[arg(long, default_value = "128")]
        dim: usize,

        /// Distance metric (cosine, euclidean, dot_product).
        #[arg(long, default_value = "cosine")]
        metric: DistanceMetric,

        /// Similarity index (exact, hnsw).
        #[arg(long, default_value = "exact")]
        index: IndexKind,

        /// Also index next-state vectors.
        #[arg(long)]
        next_state_index: bool,

        /// Overwrite an existing agentdb.toml.
        #[arg(long)]
        force: bool,
    },

    /// Store one experience for an agent.
    Store {
        /// Agent that produced the experience.
        agent: String,

        /// State vector, comma separated (e.g. "0.1,0.2,0.3").
        #[arg(long = "state", allow_hyphen_values = true)]
        state_vector: String,

        /// Next-state vector, comma separated.
        #[arg(long = "next-state", allow_hyphen_values = true)]
        next_state_vector: String,

        /// Action taken.
        #[arg(short, long)]
        action: String,

        /// Reward received.
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        reward: f64,

        /// Mark the experience as ending its episode.
        #[arg(long)]
        done: bool,

        /// Explicit experience ID (generated when omitted).
        #[arg(long)]
        id: Option<String>,

        /// Metadata entry as key=value; repeatable.
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },

    /// Show one experience by ID.
    Show {
        /// Experience ID.
        id: String,
    },

    /// Find experiences with the most similar state vectors.
    Query {
        /// Query vector, comma separated.
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// Number of results.
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// Search next-state vectors instead (requires index_next_state).
        #[arg(long)]
        next_state: bool,
    },

    /// List the experiences and reward summary of one agent.
    Agent {
        /// Agent ID.
        agent: String,
    },

    /// Reward summary for every agent.
    Agents,

    /// The most recent experiences, oldest first.
    Recent {
        /// Number of experiences to show.
        #[arg(short, long, default_value = "10")]
        n: usize,
    },

    /// Show store statistics.
    Stats,

    /// Delete one experience by ID.
    #[command(alias = "rm")]
    Delete {
        /// Experience ID.
        id: String,
    },

    /// Remove every experience.
    Clear {
        /// Required to confirm the wipe.
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and file locations.
    Info,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Commands {
    /// Whether the command changes the store and needs a snapshot write.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Commands::Store { .. } | Commands::Delete { .. } | Commands::Clear { force: true }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_store_with_negative_reward() {
        let cli = Cli::try_parse_from([
            "agentdb",
            "store",
            "a1",
            "--state",
            "-1,0.5",
            "--next-state",
            "0,1",
            "--action",
            "left",
            "--reward",
            "-0.3",
            "--meta",
            "env=grid",
            "--done",
        ])
        .unwrap();

        match cli.command {
            Commands::Store {
                agent,
                state_vector,
                reward,
                done,
                metadata,
                ..
            } => {
                assert_eq!(agent, "a1");
                assert_eq!(state_vector, "-1,0.5");
                assert!((reward + 0.3).abs() < 1e-12);
                assert!(done);
                assert_eq!(metadata, vec!["env=grid"]);
            }
            _ => panic!("expected store command"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["agentdb", "stats", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.command.is_mutation());
    }

    #[test]
    fn clear_without_force_is_not_a_mutation() {
        let cli = Cli::try_parse_from(["agentdb", "clear"]).unwrap();
        assert!(!cli.command.is_mutation());
        let cli = Cli::try_parse_from(["agentdb", "clear", "--force"]).unwrap();
        assert!(cli.command.is_mutation());
    }

    #[test]
    fn parses_init_options() {
        let cli = Cli::try_parse_from([
            "agentdb",
            "init",
            "--db-name",
            "replay",
            "--dim",
            "8",
            "--metric",
            "l2",
            "--index",
            "hnsw",
        ])
        .unwrap();
        match cli.command {
            Commands::Init {
                db_name,
                dim,
                metric,
                index,
                next_state_index,
                force,
            } => {
                assert_eq!(db_name, "replay");
                assert_eq!(dim, 8);
                assert_eq!(metric, DistanceMetric::Euclidean);
                assert_eq!(index, IndexKind::Hnsw);
                assert!(!next_state_index);
                assert!(!force);
            }
            _ => panic!("expected init command"),
        }
        assert!(Cli::try_parse_from(["agentdb", "init", "--index", "ivf"]).is_err());
    }
}
