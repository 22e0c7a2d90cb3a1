//! Append-only interaction memory
//!
//! The memory store records what the agent observed and what it did, in
//! order, over a pluggable persistence backend. Search is plain substring
//! matching over record content; nothing here ranks semantically.

pub mod backend;

pub use backend::{InMemoryBackend, JsonlBackend};

use sdk::collaborators::MemoryBackend;
use sdk::errors::AgentError;
use sdk::types::{MemoryRecord, RecordKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Append-only log of agent inputs and outputs with recall and search
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryStore {
    /// Create a store over the given backend
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    /// Create a store over an unbounded in-process backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Append an input record and return it
    pub async fn add_input(
        &self,
        content: impl Into<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<MemoryRecord> {
        let record = MemoryRecord::input(content, metadata);
        debug!("Appending input record {}", record.id);
        self.backend.append(record.clone()).await?;
        Ok(record)
    }

    /// Append an output record and return it
    pub async fn add_output(
        &self,
        content: impl Into<String>,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<MemoryRecord> {
        let record = MemoryRecord::output(content, metadata);
        debug!("Appending output record {}", record.id);
        self.backend.append(record.clone()).await?;
        Ok(record)
    }

    /// The last `n` records in append order
    pub async fn get_recent(&self, n: usize) -> Result<Vec<MemoryRecord>> {
        let all = self.backend.read_all().await?;
        let skip = all.len().saturating_sub(n);
        Ok(all.into_iter().skip(skip).collect())
    }

    /// Records whose content contains `query`, case-insensitively,
    /// in append order
    pub async fn search(&self, query: &str) -> Result<Vec<MemoryRecord>> {
        let needle = query.to_lowercase();
        let all = self.backend.read_all().await?;
        Ok(all
            .into_iter()
            .filter(|r| r.content.to_lowercase().contains(&needle))
            .collect())
    }

    /// Irreversibly drop every record. Never called by the runtime itself.
    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    /// Render the last `n` records as prompt context for the planner
    pub async fn recent_context(&self, n: usize) -> Result<String> {
        let recent = self.get_recent(n).await?;
        let mut lines = Vec::with_capacity(recent.len());
        for record in recent {
            let kind = match record.kind {
                RecordKind::Input => "observed",
                RecordKind::Output => "did",
            };
            lines.push(format!("[{}] {}", kind, record.content));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> serde_json::Map<String, Value> {
        serde_json::Map::new()
    }

    #[tokio::test]
    async fn test_get_recent_returns_tail_in_order() {
        let store = MemoryStore::in_memory();
        for i in 0..7 {
            store.add_input(format!("event {}", i), meta()).await.unwrap();
        }

        let recent = store.get_recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "event 4");
        assert_eq!(recent[2].content, "event 6");

        // Asking for more than exists returns everything
        assert_eq!(store.get_recent(100).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_search_matches_substring_case_insensitive() {
        let store = MemoryStore::in_memory();
        store.add_input("Bought ETH at 3000", meta()).await.unwrap();
        store.add_output("sold eth at 3100", meta()).await.unwrap();
        store.add_input("checked balance", meta()).await.unwrap();

        let hits = store.search("ETH").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.content.to_lowercase().contains("eth")));

        assert!(store.search("doge").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_is_explicit_and_total() {
        let store = MemoryStore::in_memory();
        store.add_input("something", meta()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_context_labels_directions() {
        let store = MemoryStore::in_memory();
        store.add_input("price alert", meta()).await.unwrap();
        store.add_output("placed order", meta()).await.unwrap();

        let context = store.recent_context(5).await.unwrap();
        assert!(context.contains("[observed] price alert"));
        assert!(context.contains("[did] placed order"));
    }
}
