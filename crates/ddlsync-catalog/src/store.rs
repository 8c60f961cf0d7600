//! Artifact store trait and in-memory implementation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ddlsync_core::Artifact;
use tokio::sync::RwLock;

/// Errors raised by an artifact store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Store IO error: {0}")]
    Io(String),

    #[error("Store serialization error: {0}")]
    Serialize(String),
}

/// Durable artifact records, keyed by artifact key
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Look up a previously saved artifact
    async fn find_by_key(&self, key: &str) -> Result<Option<Artifact>, StoreError>;

    /// Insert or replace an artifact; assigns a surrogate id on first save
    async fn save(&self, artifact: Artifact) -> Result<Artifact, StoreError>;

    /// Remove an artifact record
    async fn delete(&self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Every stored artifact, ordered by key
    async fn all(&self) -> Result<Vec<Artifact>, StoreError>;
}

/// In-memory artifact store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    artifacts: Arc<RwLock<BTreeMap<String, Artifact>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given artifacts
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let artifacts: BTreeMap<String, Artifact> =
            artifacts.into_iter().map(|a| (a.key.clone(), a)).collect();
        let max_id = artifacts.values().filter_map(|a| a.id).max().unwrap_or(0);

        Self {
            artifacts: Arc::new(RwLock::new(artifacts)),
            next_id: Arc::new(AtomicU64::new(max_id)),
        }
    }

    /// Number of stored artifacts
    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Artifact>, StoreError> {
        Ok(self.artifacts.read().await.get(key).cloned())
    }

    async fn save(&self, mut artifact: Artifact) -> Result<Artifact, StoreError> {
        let mut artifacts = self.artifacts.write().await;

        if artifact.id.is_none() {
            artifact.id = match artifacts.get(&artifact.key).and_then(|a| a.id) {
                Some(id) => Some(id),
                None => Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            };
        }

        artifacts.insert(artifact.key.clone(), artifact.clone());
        Ok(artifact)
    }

    async fn delete(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.artifacts
            .write()
            .await
            .remove(&artifact.key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(artifact.key.clone()))
    }

    async fn all(&self) -> Result<Vec<Artifact>, StoreError> {
        Ok(self.artifacts.read().await.values().cloned().collect())
    }
}
