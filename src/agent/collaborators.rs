//! External collaborator seams of the orchestrator
//!
//! The orchestrator only talks to the outside world through these traits so
//! that LLM providers, the analytical engine and the example index can be
//! swapped or mocked.

use super::state::{QaExample, Row};
use crate::conversation_store::ChatMessage;
use crate::error_handling::AgentResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Everything the generator may use to write the next candidate
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub examples: &'a [QaExample],
    pub history: &'a [ChatMessage],
    /// SQL produced by the previous attempt of this turn
    pub previous_sql: Option<&'a str>,
    /// Validation error of the previous attempt of this turn
    pub previous_error: Option<&'a str>,
    /// 1-based attempt number
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Inputs for narrating query results
#[derive(Debug, Clone, Copy)]
pub struct AnswerContext<'a> {
    pub question: &'a str,
    pub sql: &'a str,
    pub rows: &'a [Row],
    pub history: &'a [ChatMessage],
}

/// Produces candidate SQL. Called up to `max_attempts` times per turn.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, context: &GenerationContext<'_>) -> AgentResult<String>;
}

/// Runs sanitized SQL against the analytical engine
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> AgentResult<Vec<Row>>;
}

/// Supplies the text description of the available tables and columns
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn dataset_schema(&self) -> AgentResult<String>;
}

/// Finds question/SQL pairs similar to the question
#[async_trait]
pub trait ExampleRetriever: Send + Sync {
    async fn retrieve(&self, question: &str, top_k: usize) -> AgentResult<Vec<QaExample>>;
}

/// Turns query results into a natural-language answer
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, context: &AnswerContext<'_>) -> AgentResult<String>;
}

/// Resolves commodity codes (`cdmercadoria`) to their referential names.
/// Codes without a name are simply absent from the returned map.
#[async_trait]
pub trait CommodityNameLookup: Send + Sync {
    async fn commodity_names(&self, codes: &[String]) -> AgentResult<HashMap<String, String>>;
}

/// Schema provider over a fixed text, for tests and offline use
#[derive(Debug, Clone)]
pub struct StaticSchemaProvider {
    schema: String,
}

impl StaticSchemaProvider {
    pub fn new<S: Into<String>>(schema: S) -> Self {
        Self {
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn dataset_schema(&self) -> AgentResult<String> {
        Ok(self.schema.clone())
    }
}
