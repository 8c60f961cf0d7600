//! JSON-file backed store and target snapshot

use std::path::{Path, PathBuf};

use ddlsync_core::Artifact;

use crate::mock::{MockTarget, TargetState};
use crate::store::{ArtifactStore, MemoryStore, StoreError};

/// Artifact store persisted as a JSON array, rewritten on every change
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open a store file; a missing file is an empty store
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let artifacts: Vec<Artifact> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialize(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        };

        tracing::debug!(path = %path.display(), artifacts = artifacts.len(), "opened artifact store");
        Ok(Self {
            path,
            inner: MemoryStore::from_artifacts(artifacts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let artifacts = self.inner.all().await?;
        let json = serde_json::to_vec_pretty(&artifacts)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FileStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Artifact>, StoreError> {
        self.inner.find_by_key(key).await
    }

    async fn save(&self, artifact: Artifact) -> Result<Artifact, StoreError> {
        let saved = self.inner.save(artifact).await?;
        self.persist().await?;
        Ok(saved)
    }

    async fn delete(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.inner.delete(artifact).await?;
        self.persist().await
    }

    async fn all(&self) -> Result<Vec<Artifact>, StoreError> {
        self.inner.all().await
    }
}

/// A mock target's content kept in a JSON file between runs
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the snapshot into a fresh target; a missing file is an empty target
    pub async fn load(&self) -> Result<MockTarget, StoreError> {
        let state = match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice::<TargetState>(&bytes)
                .map_err(|e| StoreError::Serialize(format!("{}: {}", self.path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TargetState::default(),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", self.path.display(), e))),
        };
        Ok(MockTarget::from_state(state))
    }

    /// Write the target's current content back
    pub async fn save(&self, target: &MockTarget) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&target.snapshot().await)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", self.path.display(), e)))
    }
}
