//! Per-turn conversation state, steps and terminal outcomes

use crate::conversation_store::ChatMessage;
use crate::validation::ValidationVerdict;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One result row, column order preserved
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A question/SQL pair used as a few-shot example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaExample {
    pub question: String,
    pub sql: String,
}

/// States of the turn state machine. `Terminate` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStep {
    LoadSchema,
    RetrieveExamples,
    GenerateSql,
    ValidateSql,
    ExecuteSql,
    GenerateFinalAnswer,
    Terminate,
}

impl fmt::Display for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadSchema => "load_schema",
            Self::RetrieveExamples => "retrieve_examples",
            Self::GenerateSql => "generate_sql",
            Self::ValidateSql => "validate_sql",
            Self::ExecuteSql => "execute_sql",
            Self::GenerateFinalAnswer => "generate_final_answer",
            Self::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

/// State owned by the orchestrator for a single question-answering turn
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub turn_id: Uuid,
    pub thread_id: String,
    pub question: String,
    /// Prior user questions and assistant answers of the thread
    pub history: Vec<ChatMessage>,
    pub dataset_schema: Option<Arc<str>>,
    pub retrieved_examples: Vec<QaExample>,
    pub generated_sql: Option<String>,
    pub validated_sql: Option<String>,
    pub sql_error: Option<String>,
    pub last_verdict: Option<ValidationVerdict>,
    pub query_results: Option<Vec<Row>>,
    pub row_count: Option<usize>,
    pub final_answer: Option<String>,
    attempt_count: u32,
    max_attempts: u32,
}

impl ConversationState {
    pub fn new<T: Into<String>, Q: Into<String>>(
        thread_id: T,
        question: Q,
        max_attempts: u32,
    ) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            question: question.into(),
            history: Vec::new(),
            dataset_schema: None,
            retrieved_examples: Vec::new(),
            generated_sql: None,
            validated_sql: None,
            sql_error: None,
            last_verdict: None,
            query_results: None,
            row_count: None,
            final_answer: None,
            attempt_count: 0,
            max_attempts,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Only the generation step calls this
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempt_count += 1;
        self.attempt_count
    }
}

/// Why a turn ended without an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnFailure {
    #[error("empty question")]
    EmptyQuestion,

    #[error("schema unavailable: {detail}")]
    SchemaUnavailable { detail: String },

    #[error("SQL generation failed: {detail}")]
    GenerationFailed { detail: String },

    #[error("no valid SQL after {attempts} attempts: {last_error}")]
    GenerationExhausted { attempts: u32, last_error: String },

    #[error("no SQL was generated")]
    NothingGenerated,

    #[error("query execution failed: {detail}")]
    ExecutionFailed { sql: String, detail: String },

    #[error("{stage} timed out after {timeout_ms}ms")]
    Timeout { stage: AgentStep, timeout_ms: u64 },
}

impl TurnFailure {
    /// Generic text shown to the end user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyQuestion => "Por favor, digite uma pergunta.",
            Self::SchemaUnavailable { .. } => {
                "Não foi possível carregar a estrutura dos dados. Tente novamente mais tarde."
            }
            Self::GenerationFailed { .. }
            | Self::GenerationExhausted { .. }
            | Self::NothingGenerated => {
                "Não consegui gerar uma consulta válida para sua pergunta. Tente reformulá-la ou tente novamente mais tarde."
            }
            Self::ExecutionFailed { .. } => {
                "Desculpe, ocorreu um erro ao executar a consulta. Tente novamente em instantes."
            }
            Self::Timeout { .. } => {
                "A consulta demorou mais do que o esperado. Tente novamente em instantes."
            }
        }
    }

    /// Technical detail for a debug view
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Answered,
    Failed(TurnFailure),
}

/// Final state of a turn plus the steps it went through
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub path: Vec<AgentStep>,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self.status, TurnStatus::Answered)
    }

    pub fn failure(&self) -> Option<&TurnFailure> {
        match &self.status {
            TurnStatus::Answered => None,
            TurnStatus::Failed(failure) => Some(failure),
        }
    }

    /// Text to show the user: the answer, or the failure's generic message
    pub fn user_message(&self) -> &str {
        match &self.status {
            TurnStatus::Answered => self.state.final_answer.as_deref().unwrap_or_default(),
            TurnStatus::Failed(failure) => failure.user_message(),
        }
    }

    /// How many times a step was entered
    pub fn visits(&self, step: AgentStep) -> usize {
        self.path.iter().filter(|s| **s == step).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_only_advance_through_begin_attempt() {
        let mut state = ConversationState::new("t1", "quantas toneladas?", 3);
        assert_eq!(state.attempt_count(), 0);
        assert_eq!(state.begin_attempt(), 1);
        assert_eq!(state.begin_attempt(), 2);
        assert_eq!(state.max_attempts(), 3);
    }

    #[test]
    fn test_failure_messages() {
        let failure = TurnFailure::Timeout {
            stage: AgentStep::ExecuteSql,
            timeout_ms: 2000,
        };
        assert_eq!(failure.detail(), "execute_sql timed out after 2000ms");
        assert!(failure.user_message().contains("demorou"));

        let failure = TurnFailure::ExecutionFailed {
            sql: "SELECT 1".to_string(),
            detail: "quota exceeded".to_string(),
        };
        assert!(failure.detail().contains("quota exceeded"));
        assert!(!failure.user_message().contains("quota"));
    }
}
