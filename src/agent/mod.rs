//! Question-answering agent over the ANTAQ dataset

pub mod collaborators;
pub mod input;
pub mod orchestrator;
pub mod routing;
pub mod state;

pub use collaborators::{
    AnswerContext, AnswerSynthesizer, CommodityNameLookup, ExampleRetriever, GenerationContext,
    QueryExecutor, SchemaProvider, SqlGenerator, StaticSchemaProvider,
};
pub use input::sanitize_question;
pub use orchestrator::{fallback_answer, Collaborators, SqlAgent};
pub use routing::{route_after_validation, ValidationRoute};
pub use state::{
    AgentStep, ConversationState, QaExample, Row, TurnFailure, TurnOutcome, TurnStatus,
};
