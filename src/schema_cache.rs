//! Per-thread cache of the dataset schema text
//!
//! The schema is computed once per conversation thread and read many times.
//! Concurrent first loads may both hit the provider; the first insert wins and
//! the result is identical either way.

use crate::agent::SchemaProvider;
use crate::error_handling::AgentResult;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

pub struct SchemaCache {
    provider: Arc<dyn SchemaProvider>,
    entries: DashMap<String, Arc<str>>,
}

impl SchemaCache {
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
        }
    }

    /// Cached schema for the thread, loading it on first use
    pub async fn get_or_load(&self, thread_id: &str) -> AgentResult<Arc<str>> {
        let cached = self.entries.get(thread_id).map(|entry| Arc::clone(entry.value()));
        if let Some(schema) = cached {
            debug!(thread_id, "schema already cached");
            return Ok(schema);
        }

        let loaded: Arc<str> = Arc::from(self.provider.dataset_schema().await?);
        debug!(thread_id, bytes = loaded.len(), "schema loaded");

        let entry = self
            .entries
            .entry(thread_id.to_string())
            .or_insert(loaded);
        Ok(Arc::clone(entry.value()))
    }

    pub fn invalidate(&self, thread_id: &str) {
        self.entries.remove(thread_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::AgentError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl SchemaProvider for CountingProvider {
        async fn dataset_schema(&self) -> AgentResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AgentError::schema("dictionary unavailable"));
            }
            Ok("## Tabela: v_carga_metodologia_oficial".to_string())
        }
    }

    #[tokio::test]
    async fn test_schema_loaded_once_per_thread() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let cache = SchemaCache::new(provider.clone());

        let first = cache.get_or_load("t1").await.unwrap();
        let second = cache.get_or_load("t1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        cache.get_or_load("t2").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);

        cache.invalidate("t1");
        cache.get_or_load("t1").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let cache = SchemaCache::new(provider.clone());

        assert!(cache.get_or_load("t1").await.is_err());
        assert!(cache.get_or_load("t1").await.is_err());
        assert!(cache.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
