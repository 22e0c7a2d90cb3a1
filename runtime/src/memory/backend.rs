//! Memory persistence backends
//!
//! Two implementations of the `MemoryBackend` collaborator trait with
//! identical ordering semantics: an in-process ring and a JSONL file.
//! Both serialize appends through an async mutex so concurrent trigger
//! callbacks never lose or tear records.

use async_trait::async_trait;
use sdk::collaborators::MemoryBackend;
use sdk::errors::AgentError;
use sdk::types::MemoryRecord;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// In-process backend
///
/// Retention is bounded by `max_records`: once the cap is reached, the
/// oldest record is evicted on each append. A cap of zero disables
/// eviction entirely.
pub struct InMemoryBackend {
    records: Mutex<VecDeque<MemoryRecord>>,
    max_records: usize,
}

impl InMemoryBackend {
    /// Create an unbounded in-process backend
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a backend that retains at most `max_records` records
    pub fn with_capacity(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn append(&self, record: MemoryRecord) -> Result<(), AgentError> {
        let mut records = self.records.lock().await;
        if self.max_records > 0 && records.len() >= self.max_records {
            if let Some(evicted) = records.pop_front() {
                debug!("Evicting oldest memory record {}", evicted.id);
            }
        }
        records.push_back(record);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<MemoryRecord>, AgentError> {
        let records = self.records.lock().await;
        Ok(records.iter().cloned().collect())
    }

    async fn clear(&self) -> Result<(), AgentError> {
        let mut records = self.records.lock().await;
        records.clear();
        Ok(())
    }
}

/// File-backed backend: one JSON record per line, append-only
///
/// The file lock is held for the full serialize-and-write of each record,
/// so concurrent appends interleave at record granularity only.
pub struct JsonlBackend {
    path: PathBuf,
    file_lock: Mutex<()>,
}

impl JsonlBackend {
    /// Open (or create) a JSONL backend at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Create the file eagerly so read_all on a fresh store succeeds
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MemoryBackend for JsonlBackend {
    async fn append(&self, record: MemoryRecord) -> Result<(), AgentError> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| AgentError::Collaborator(format!("failed to serialize record: {}", e)))?;
        line.push('\n');

        let _guard = self.file_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<MemoryRecord>, AgentError> {
        let _guard = self.file_lock.lock().await;
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: MemoryRecord = serde_json::from_str(line).map_err(|e| {
                AgentError::Collaborator(format!(
                    "corrupt memory record at {:?}:{}: {}",
                    self.path,
                    idx + 1,
                    e
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    async fn clear(&self) -> Result<(), AgentError> {
        let _guard = self.file_lock.lock().await;
        tokio::fs::write(&self.path, b"").await?;
        Ok(())
    }
}
