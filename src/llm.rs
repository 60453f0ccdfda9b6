//! Language-model backed generator and answer synthesizer
//!
//! Providers plug in through [`LlmClient`]; everything here is prompt
//! assembly and response parsing.

use crate::agent::{AnswerContext, AnswerSynthesizer, GenerationContext, QaExample, SqlGenerator};
use crate::conversation_store::{ChatMessage, Role};
use crate::error_handling::AgentResult;
use crate::formatting::format_results_for_llm;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Examples included in the system prompt
const MAX_PROMPT_EXAMPLES: usize = 5;
/// Shorter assistant messages are status chatter and stay out of the prompt
const MIN_ASSISTANT_HISTORY_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion provider
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[LlmMessage]) -> AgentResult<String>;
}

/// Pull the SQL out of a model reply
///
/// Prefers a ```sql fence, then any fence, then the whole reply. A fence
/// without a closing marker runs to the end of the reply.
pub fn extract_sql_from_response(response: &str) -> String {
    let body = if let Some(start) = response.find("```sql") {
        fenced_body(&response[start + "```sql".len()..])
    } else if let Some(start) = response.find("```") {
        fenced_body(&response[start + "```".len()..])
    } else {
        response
    };
    body.trim().to_string()
}

fn fenced_body(rest: &str) -> &str {
    match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// [`SqlGenerator`] that prompts a chat model with schema, examples and history
pub struct LlmSqlGenerator {
    client: Arc<dyn LlmClient>,
    view: String,
}

impl LlmSqlGenerator {
    /// `view` is the fully qualified view queries should read from
    pub fn new<S: Into<String>>(client: Arc<dyn LlmClient>, view: S) -> Self {
        Self {
            client,
            view: view.into(),
        }
    }

    pub fn build_messages(&self, context: &GenerationContext<'_>) -> Vec<LlmMessage> {
        let mut messages = vec![LlmMessage::system(system_prompt(
            &self.view,
            context.schema,
            context.examples,
        ))];

        messages.extend(history_messages(context.history));

        let mut request = format!(
            "Based on the schema and examples provided, generate a SQL query to answer the following question:\n\n\
             Question: {}\n\n\
             Return the SQL query in a code block like this:\n\n```sql\nSELECT ...\n```",
            context.question
        );

        if let (Some(sql), Some(error)) = (context.previous_sql, context.previous_error) {
            request.push_str(&format!(
                "\n\nAttempt {} of {}. The previous query was rejected.\n\
                 Previous query:\n```sql\n{}\n```\nError: {}\nFix the problem and return a single SELECT query.",
                context.attempt, context.max_attempts, sql, error
            ));
        }

        messages.push(LlmMessage::user(request));
        messages
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, context: &GenerationContext<'_>) -> AgentResult<String> {
        let messages = self.build_messages(context);
        let reply = self.client.complete(&messages).await?;
        let sql = extract_sql_from_response(&reply);
        debug!(attempt = context.attempt, chars = sql.len(), "extracted SQL from model reply");
        Ok(sql)
    }
}

fn system_prompt(view: &str, schema: &str, examples: &[QaExample]) -> String {
    let examples_text = if examples.is_empty() {
        "No examples provided.".to_string()
    } else {
        examples
            .iter()
            .take(MAX_PROMPT_EXAMPLES)
            .enumerate()
            .map(|(i, ex)| format!("Example {}:\nQuestion: {}\nSQL: {}\n", i + 1, ex.question, ex.sql))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an expert data analyst for ANTAQ (Brazilian National Waterway Transportation Agency).\n\n\
         Write a single read-only BigQuery SELECT (or WITH) query against `{view}`.\n\
         Never modify data. Filter by year or month whenever the question names a period.\n\
         Use earlier questions of this conversation to resolve follow-ups such as \"e em fevereiro?\".\n\n\
         ## SCHEMA\n\n{schema}\n\n## EXAMPLES\n\n{examples_text}"
    )
}

fn history_messages(history: &[ChatMessage]) -> impl Iterator<Item = LlmMessage> + '_ {
    history.iter().filter_map(|message| match message.role {
        Role::User => Some(LlmMessage::user(message.content.clone())),
        Role::Assistant if message.content.chars().count() > MIN_ASSISTANT_HISTORY_CHARS => {
            Some(LlmMessage::assistant(message.content.clone()))
        }
        Role::Assistant => None,
    })
}

/// [`AnswerSynthesizer`] that asks a chat model to narrate the results
pub struct LlmAnswerSynthesizer {
    client: Arc<dyn LlmClient>,
}

impl LlmAnswerSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn build_prompt(context: &AnswerContext<'_>) -> String {
        format!(
            "Based on the query results, provide a clear, natural language answer in Portuguese.\n\n\
             **Question:** {}\n\n**Query Executed:**\n```sql\n{}\n```\n\n**Results:**\n{}\n\n\
             Use ponto para milhares e vírgula para decimais. Comece com uma resposta direta e \
             apresente rankings em formato de lista. If there are no results, explain why.",
            context.question,
            context.sql,
            format_results_for_llm(context.rows)
        )
    }
}

#[async_trait]
impl AnswerSynthesizer for LlmAnswerSynthesizer {
    async fn synthesize(&self, context: &AnswerContext<'_>) -> AgentResult<String> {
        let prompt = Self::build_prompt(context);
        self.client.complete(&[LlmMessage::user(prompt)]).await
    }
}
