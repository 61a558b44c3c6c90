//! Infrastructure layer for AgentDB.
//!
//! Everything that touches the filesystem lives here: `agentdb.toml`
//! loading, data directory layout, SHA-256 content digests and JSON
//! snapshot persistence for `agentdb_core::db::AgentDb`.

pub mod config;
pub mod filesystem;
pub mod hash;
pub mod snapshot;
