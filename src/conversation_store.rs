//! Conversation history persistence keyed by thread id

use crate::error_handling::AgentResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Messages kept per thread by the in-memory store
pub const DEFAULT_HISTORY_LIMIT: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One user-visible message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Loads and saves the history of a conversation thread
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// History of the thread, empty when unknown
    async fn load(&self, thread_id: &str) -> AgentResult<Vec<ChatMessage>>;

    /// Replace the stored history of the thread
    async fn save(&self, thread_id: &str, history: &[ChatMessage]) -> AgentResult<()>;
}

/// Process-local store. Keeps the most recent messages of each thread.
#[derive(Debug)]
pub struct InMemoryConversationStore {
    threads: DashMap<String, Vec<ChatMessage>>,
    max_messages: usize,
}

impl InMemoryConversationStore {
    pub fn new(max_messages: usize) -> Self {
        Self {
            threads: DashMap::new(),
            max_messages,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn clear(&self, thread_id: &str) {
        self.threads.remove(thread_id);
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, thread_id: &str) -> AgentResult<Vec<ChatMessage>> {
        Ok(self
            .threads
            .get(thread_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, thread_id: &str, history: &[ChatMessage]) -> AgentResult<()> {
        let skip = history.len().saturating_sub(self.max_messages);
        self.threads
            .insert(thread_id.to_string(), history[skip..].to_vec());
        Ok(())
    }
}
