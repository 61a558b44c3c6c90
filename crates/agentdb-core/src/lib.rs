//! Core logic for AgentDB.
//!
//! This crate holds the in-memory experience store and its similarity
//! indexes, plus the `AgentDb` facade that external bindings call. It depends
//! only on `agentdb-types` -- never on `agentdb-infra` or any file I/O.

pub mod db;
pub mod index;
pub mod store;
