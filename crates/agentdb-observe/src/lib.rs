//! Observability setup for AgentDB: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
