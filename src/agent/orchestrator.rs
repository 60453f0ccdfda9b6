//! Turn orchestration
//!
//! A turn loads the schema, retrieves examples, then loops between generation
//! and validation until a candidate passes or attempts run out. A passing
//! candidate is executed and narrated.
//!
//! Each turn is a sequential state machine over [`AgentStep`]. The attempt
//! counter advances only inside the generation step, so the retry edge out of
//! validation is bounded by `max_attempts`. Execution failures and timeouts
//! end the turn; they never re-enter generation.

use super::collaborators::{
    AnswerContext, AnswerSynthesizer, CommodityNameLookup, ExampleRetriever, GenerationContext,
    QueryExecutor, SchemaProvider, SqlGenerator,
};
use super::input::sanitize_question;
use super::routing::{route_after_validation, ValidationRoute};
use super::state::{AgentStep, ConversationState, Row, TurnFailure, TurnOutcome, TurnStatus};
use crate::config::{AgentConfig, LoopConfig};
use crate::conversation_store::{ChatMessage, ConversationStore};
use crate::error_handling::AgentResult;
use crate::formatting::{collect_commodity_codes, enrich_commodity_names};
use crate::schema_cache::SchemaCache;
use crate::validation::{SqlValidator, ValidationVerdict};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// External collaborators injected into the agent
pub struct Collaborators {
    pub schema: Arc<dyn SchemaProvider>,
    pub generator: Arc<dyn SqlGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub answerer: Arc<dyn AnswerSynthesizer>,
    pub examples: Option<Arc<dyn ExampleRetriever>>,
    /// Resolves commodity codes to names before the answer step
    pub commodity_names: Option<Arc<dyn CommodityNameLookup>>,
    pub store: Arc<dyn ConversationStore>,
}

/// Governed natural-language-to-SQL agent. Holds no per-turn state, so one
/// instance can serve concurrent turns on different threads.
pub struct SqlAgent {
    validator: SqlValidator,
    schema_cache: SchemaCache,
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
    answerer: Arc<dyn AnswerSynthesizer>,
    examples: Option<Arc<dyn ExampleRetriever>>,
    commodity_names: Option<Arc<dyn CommodityNameLookup>>,
    store: Arc<dyn ConversationStore>,
    loop_config: LoopConfig,
    max_question_chars: usize,
}

impl SqlAgent {
    pub fn new(collaborators: Collaborators, config: &AgentConfig) -> Self {
        Self {
            validator: SqlValidator::from_config(&config.validator),
            schema_cache: SchemaCache::new(collaborators.schema),
            generator: collaborators.generator,
            executor: collaborators.executor,
            answerer: collaborators.answerer,
            examples: collaborators.examples,
            commodity_names: collaborators.commodity_names,
            store: collaborators.store,
            loop_config: config.agent.clone(),
            max_question_chars: config.input.max_question_chars,
        }
    }

    pub fn validator(&self) -> &SqlValidator {
        &self.validator
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// Answer one question with the configured attempt ceiling
    pub async fn run_turn(&self, thread_id: &str, question: &str) -> TurnOutcome {
        self.run_turn_with_attempts(thread_id, question, self.loop_config.max_attempts)
            .await
    }

    /// Answer one question. Never fails: every failure ends up in the outcome.
    /// A ceiling of zero is raised to one, since generation always runs once.
    pub async fn run_turn_with_attempts(
        &self,
        thread_id: &str,
        question: &str,
        max_attempts: u32,
    ) -> TurnOutcome {
        let question = sanitize_question(question, self.max_question_chars);
        let state = ConversationState::new(thread_id, question, max_attempts.max(1));
        let span = info_span!("turn", thread_id, turn_id = %state.turn_id);
        self.drive(state).instrument(span).await
    }

    async fn drive(&self, mut state: ConversationState) -> TurnOutcome {
        if state.question.is_empty() {
            warn!("empty question, turn not started");
            return TurnOutcome {
                state,
                path: vec![AgentStep::Terminate],
                status: TurnStatus::Failed(TurnFailure::EmptyQuestion),
            };
        }

        state.history = match self.store.load(&state.thread_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "could not load conversation history");
                Vec::new()
            }
        };

        let mut path = Vec::new();
        let mut failure = None;
        let mut step = AgentStep::LoadSchema;

        loop {
            path.push(step);
            debug!(%step, attempt = state.attempt_count(), "entering step");

            let next = match step {
                AgentStep::LoadSchema => self.load_schema(&mut state).await,
                AgentStep::RetrieveExamples => Ok(self.retrieve_examples(&mut state).await),
                AgentStep::GenerateSql => self.generate_sql(&mut state).await,
                AgentStep::ValidateSql => self.validate_sql(&mut state),
                AgentStep::ExecuteSql => self.execute_sql(&mut state).await,
                AgentStep::GenerateFinalAnswer => self.generate_final_answer(&mut state).await,
                AgentStep::Terminate => break,
            };

            step = match next {
                Ok(next) => next,
                Err(reason) => {
                    failure = Some(reason);
                    AgentStep::Terminate
                }
            };
        }

        let status = match failure {
            None => TurnStatus::Answered,
            Some(reason) => TurnStatus::Failed(reason),
        };

        match &status {
            TurnStatus::Answered => info!(
                attempts = state.attempt_count(),
                row_count = state.row_count.unwrap_or_default(),
                "turn answered"
            ),
            TurnStatus::Failed(reason) => warn!(
                attempts = state.attempt_count(),
                reason = %reason,
                "turn failed"
            ),
        }

        self.persist_history(&mut state, &status).await;

        TurnOutcome {
            state,
            path,
            status,
        }
    }

    async fn load_schema(&self, state: &mut ConversationState) -> Result<AgentStep, TurnFailure> {
        let loaded = bounded(
            AgentStep::LoadSchema,
            self.loop_config.lookup_timeout(),
            self.schema_cache.get_or_load(&state.thread_id),
        )
        .await?;

        match loaded {
            Ok(schema) => {
                state.dataset_schema = Some(schema);
                Ok(AgentStep::RetrieveExamples)
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "failed to load dataset schema");
                Err(TurnFailure::SchemaUnavailable {
                    detail: e.to_string(),
                })
            }
        }
    }

    async fn retrieve_examples(&self, state: &mut ConversationState) -> AgentStep {
        let Some(retriever) = &self.examples else {
            return AgentStep::GenerateSql;
        };

        let retrieved = bounded(
            AgentStep::RetrieveExamples,
            self.loop_config.lookup_timeout(),
            retriever.retrieve(&state.question, self.loop_config.examples_top_k),
        )
        .await;

        match retrieved {
            Ok(Ok(examples)) => {
                debug!(count = examples.len(), "retrieved similar examples");
                state.retrieved_examples = examples;
            }
            Ok(Err(e)) => warn!(error = %e, "example retrieval failed, continuing without examples"),
            Err(reason) => warn!(%reason, "example retrieval failed, continuing without examples"),
        }

        AgentStep::GenerateSql
    }

    async fn generate_sql(&self, state: &mut ConversationState) -> Result<AgentStep, TurnFailure> {
        let attempt = state.begin_attempt();
        let max_attempts = state.max_attempts();

        let generated = {
            let context = GenerationContext {
                question: &state.question,
                schema: state.dataset_schema.as_deref().unwrap_or_default(),
                examples: &state.retrieved_examples,
                history: &state.history,
                previous_sql: state.generated_sql.as_deref(),
                previous_error: state.sql_error.as_deref(),
                attempt,
                max_attempts,
            };
            bounded(
                AgentStep::GenerateSql,
                self.loop_config.generation_timeout(),
                self.generator.generate(&context),
            )
            .await?
        };

        match generated {
            Ok(sql) => {
                debug!(attempt, max_attempts, "generated candidate SQL");
                state.generated_sql = Some(sql);
                Ok(AgentStep::ValidateSql)
            }
            Err(e) => {
                error!(attempt, error = %e, code = e.error_code(), "SQL generation failed");
                Err(TurnFailure::GenerationFailed {
                    detail: e.to_string(),
                })
            }
        }
    }

    fn validate_sql(&self, state: &mut ConversationState) -> Result<AgentStep, TurnFailure> {
        let candidate = state
            .generated_sql
            .as_deref()
            .map(str::trim)
            .filter(|sql| !sql.is_empty());

        let verdict = match candidate {
            Some(sql) => self.validator.validate(sql),
            None => ValidationVerdict::no_query(),
        };

        for warning in verdict.warnings() {
            debug!(%warning, "validation warning");
        }

        let route = route_after_validation(&verdict, state.attempt_count(), state.max_attempts());
        state.sql_error = verdict.error_summary();
        state.validated_sql = None;
        state.last_verdict = Some(verdict);

        match route {
            ValidationRoute::Execute { sql } => {
                state.validated_sql = Some(sql);
                Ok(AgentStep::ExecuteSql)
            }
            ValidationRoute::Retry => {
                warn!(
                    attempt = state.attempt_count(),
                    max_attempts = state.max_attempts(),
                    error = state.sql_error.as_deref().unwrap_or_default(),
                    "candidate rejected, generating again"
                );
                Ok(AgentStep::GenerateSql)
            }
            ValidationRoute::Exhausted => Err(TurnFailure::GenerationExhausted {
                attempts: state.attempt_count(),
                last_error: state.sql_error.clone().unwrap_or_default(),
            }),
            ValidationRoute::Stop => Err(TurnFailure::NothingGenerated),
        }
    }

    async fn execute_sql(&self, state: &mut ConversationState) -> Result<AgentStep, TurnFailure> {
        let Some(sql) = state.validated_sql.clone() else {
            return Err(TurnFailure::NothingGenerated);
        };

        let executed = bounded(
            AgentStep::ExecuteSql,
            self.loop_config.execution_timeout(),
            self.executor.execute(&sql),
        )
        .await?;

        match executed {
            Ok(rows) => {
                info!(row_count = rows.len(), "query executed");
                state.row_count = Some(rows.len());
                state.query_results = Some(rows);
                Ok(AgentStep::GenerateFinalAnswer)
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "query execution failed");
                state.query_results = None;
                state.row_count = Some(0);
                Err(TurnFailure::ExecutionFailed {
                    sql,
                    detail: e.to_string(),
                })
            }
        }
    }

    async fn generate_final_answer(
        &self,
        state: &mut ConversationState,
    ) -> Result<AgentStep, TurnFailure> {
        let enriched = self
            .enrich_rows(state.query_results.as_deref().unwrap_or_default())
            .await;

        let answer = {
            let rows = match &enriched {
                Some(rows) => rows.as_slice(),
                None => state.query_results.as_deref().unwrap_or_default(),
            };
            let sql = state.validated_sql.as_deref().unwrap_or_default();
            let context = AnswerContext {
                question: &state.question,
                sql,
                rows,
                history: &state.history,
            };

            let synthesized = bounded(
                AgentStep::GenerateFinalAnswer,
                self.loop_config.answer_timeout(),
                self.answerer.synthesize(&context),
            )
            .await?;

            match synthesized {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => {
                    warn!("answer synthesizer returned blank text, using fallback");
                    fallback_answer(rows.len(), sql)
                }
                Err(e) => {
                    warn!(error = %e, "answer synthesis failed, using fallback");
                    fallback_answer(rows.len(), sql)
                }
            }
        };

        state.final_answer = Some(answer);
        Ok(AgentStep::Terminate)
    }

    /// Rows with commodity names added, or `None` when nothing was resolved
    async fn enrich_rows(&self, rows: &[Row]) -> Option<Vec<Row>> {
        let lookup = self.commodity_names.as_ref()?;
        let codes = collect_commodity_codes(rows);
        if codes.is_empty() {
            return None;
        }

        let resolved = bounded(
            AgentStep::GenerateFinalAnswer,
            self.loop_config.lookup_timeout(),
            lookup.commodity_names(&codes),
        )
        .await;

        match resolved {
            Ok(Ok(names)) => {
                debug!(codes = codes.len(), resolved = names.len(), "resolved commodity names");
                Some(enrich_commodity_names(rows, &names))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "commodity name lookup failed, answering with codes");
                None
            }
            Err(reason) => {
                warn!(%reason, "commodity name lookup failed, answering with codes");
                None
            }
        }
    }

    async fn persist_history(&self, state: &mut ConversationState, status: &TurnStatus) {
        let reply = match status {
            TurnStatus::Answered => state.final_answer.clone().unwrap_or_default(),
            TurnStatus::Failed(reason) => reason.user_message().to_string(),
        };
        state.history.push(ChatMessage::user(state.question.clone()));
        state.history.push(ChatMessage::assistant(reply));

        let saved = bounded(
            AgentStep::Terminate,
            self.loop_config.lookup_timeout(),
            self.store.save(&state.thread_id, &state.history),
        )
        .await;

        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "could not save conversation history"),
            Err(reason) => warn!(%reason, "could not save conversation history"),
        }
    }
}

/// Answer used when the synthesizer gives nothing usable
pub fn fallback_answer(row_count: usize, sql: &str) -> String {
    if row_count > 0 {
        format!(
            "Query executada com sucesso. {} registros encontrados.",
            row_count
        )
    } else if !sql.is_empty() {
        "Query executada mas não retornou resultados.".to_string()
    } else {
        "Não foi possível processar sua solicitação. Tente reformular sua pergunta.".to_string()
    }
}

/// Await a collaborator call, turning expiry into a terminal failure
async fn bounded<T, F>(stage: AgentStep, limit: Duration, call: F) -> Result<AgentResult<T>, TurnFailure>
where
    F: Future<Output = AgentResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| TurnFailure::Timeout {
            stage,
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_answers() {
        assert_eq!(
            fallback_answer(3, "SELECT 1"),
            "Query executada com sucesso. 3 registros encontrados."
        );
        assert_eq!(
            fallback_answer(0, "SELECT 1"),
            "Query executada mas não retornou resultados."
        );
        assert!(fallback_answer(0, "").starts_with("Não foi possível"));
    }

    #[tokio::test]
    async fn test_bounded_reports_stage_on_timeout() {
        let result: Result<AgentResult<()>, TurnFailure> = bounded(
            AgentStep::ExecuteSql,
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert_eq!(
            result.unwrap_err(),
            TurnFailure::Timeout {
                stage: AgentStep::ExecuteSql,
                timeout_ms: 10
            }
        );
    }
}
