//! Live-system probe and executor trait

use ddlsync_core::{ArtifactKind, TableDefinition};

use crate::intent::DdlIntent;

/// A probe or intent failed on the target system
///
/// Expected conditions ("does not exist", "is empty") are probe *results*;
/// this error is reserved for failed statements and lost connectivity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SqlError(pub String);

impl SqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Trait for targets that can be probed and changed
///
/// Implementations may open a short-lived connection per call; there is no
/// transaction spanning calls.
#[async_trait::async_trait]
pub trait LiveSystem: Send + Sync {
    /// Get the target name (e.g., "Mock", "Snapshot")
    fn name(&self) -> &'static str;

    /// Whether an object of this kind and name exists
    async fn exists(&self, kind: ArtifactKind, name: &str) -> Result<bool, SqlError>;

    /// Rows held by a table, or objects held by a schema
    ///
    /// Views and jobs hold nothing and report 0.
    async fn row_count(&self, kind: ArtifactKind, name: &str) -> Result<u64, SqlError>;

    /// Current shape of a table, `None` if it does not exist
    async fn describe(&self, name: &str) -> Result<Option<TableDefinition>, SqlError>;

    /// Apply one intent
    async fn apply(&self, intent: &DdlIntent) -> Result<(), SqlError>;
}
