//! ANTAQ SQL Agent Library
//!
//! Governed natural-language-to-SQL core for the ANTAQ waterway cargo
//! statistics. A language model proposes SQL; nothing reaches the analytical
//! engine until it has been normalized, classified and bounded by the
//! validator.
//!
//! # Modules
//!
//! - `validation`: keyword classifier, port-filter normalizer, row-limit enforcer and verdicts
//! - `agent`: per-turn state machine with a bounded generate/validate retry loop
//! - `schema_cache`: per-thread cache of the dataset schema text
//! - `conversation_store`: per-thread chat history
//! - `llm`: prompt assembly and SQL extraction for chat models
//! - `formatting`: text rendering of results and SQL
//! - `config`: TOML and environment configuration
//! - `error_handling`: shared error type
//! - `telemetry`: tracing subscriber setup

pub mod agent;
pub mod config;
pub mod conversation_store;
pub mod error_handling;
pub mod formatting;
pub mod llm;
pub mod schema_cache;
pub mod telemetry;
pub mod validation;

// Re-export the main types for convenience
pub use agent::{
    AgentStep, Collaborators, ConversationState, SqlAgent, TurnFailure, TurnOutcome, TurnStatus,
};
pub use config::AgentConfig;
pub use error_handling::{AgentError, AgentResult};
pub use validation::{SqlValidator, ValidationVerdict};
