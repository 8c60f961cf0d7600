//! Per-artifact outcomes
//!
//! Status codes are stable strings; they appear in persisted reports.
//! Add new codes, never rename existing ones.

use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, ArtifactKind, LifecycleState, Phase};

/// What happened to one artifact in one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    /// Object created on the target
    Created,

    /// Object altered in place or dropped and recreated
    Updated,

    /// Object dropped from the target
    Deleted,

    /// Nothing to do; the target already matches
    Satisfied,

    /// A create/alter/drop intent failed when applied
    Failed,

    /// A drop was refused because the object holds data
    FailedDelete,

    /// An update was refused because it would discard data
    FailedUpdate,

    /// The item never converged within the pass bound
    Undepleted,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::Satisfied => "SATISFIED",
            Self::Failed => "FAILED",
            Self::FailedDelete => "FAILED_DELETE",
            Self::FailedUpdate => "FAILED_UPDATE",
            Self::Undepleted => "UNDEPLETED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted | Self::Satisfied)
    }

    /// Refusals of a destructive action
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::FailedDelete | Self::FailedUpdate)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempted completion of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Artifact key
    pub key: String,

    /// Artifact name
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ArtifactKind,

    pub phase: Phase,

    /// Lifecycle state after the attempt
    pub state: LifecycleState,

    pub status: OutcomeStatus,

    pub success: bool,

    /// Human-readable detail (error text for failures)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    /// Create an outcome for an artifact
    pub fn new(artifact: &Artifact, phase: Phase, status: OutcomeStatus) -> Self {
        Self {
            key: artifact.key.clone(),
            name: artifact.name.clone(),
            kind: artifact.kind,
            phase,
            state: artifact.lifecycle,
            status,
            success: status.is_success(),
            message: None,
        }
    }

    /// Set the message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_stability() {
        assert_eq!(OutcomeStatus::FailedDelete.as_str(), "FAILED_DELETE");
        assert_eq!(OutcomeStatus::Satisfied.as_str(), "SATISFIED");
        assert_eq!(
            serde_json::to_string(&OutcomeStatus::FailedUpdate).unwrap(),
            "\"FAILED_UPDATE\""
        );
    }

    #[test]
    fn refusals_are_failures() {
        assert!(OutcomeStatus::FailedDelete.is_refusal());
        assert!(!OutcomeStatus::FailedDelete.is_success());
        assert!(!OutcomeStatus::Failed.is_refusal());
        assert!(OutcomeStatus::Satisfied.is_success());
    }
}
