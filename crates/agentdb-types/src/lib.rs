//! Shared domain types for AgentDB.
//!
//! This crate contains the types passed between the AgentDB layers:
//! experience records, store configuration, statistics, lifecycle state,
//! snapshots, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod error;
pub mod experience;
pub mod snapshot;
pub mod state;
pub mod stats;
