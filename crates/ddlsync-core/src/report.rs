//! Run report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};

use crate::outcome::{Outcome, OutcomeStatus};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of recorded outcomes
    pub total: usize,

    /// Outcomes that succeeded (including no-ops)
    pub succeeded: usize,

    /// Outcomes that failed, refusals included
    pub failed: usize,

    /// Destructive actions refused
    pub refused: usize,

    /// Artifacts that never converged
    pub unresolved: usize,

    /// Run-level errors
    pub errors: usize,
}

/// Reconciliation run report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    pub summary: RunSummary,

    /// Every attempted completion, in the order it happened
    pub outcomes: Vec<Outcome>,

    /// Keys of artifacts that never converged
    pub unresolved: Vec<String>,

    /// Run-level, non artifact-scoped problems
    pub errors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RunReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: RunSummary::default(),
            outcomes: Vec::new(),
            unresolved: Vec::new(),
            errors: Vec::new(),
            metadata: None,
        }
    }

    /// Build a report from accumulated results
    pub fn from_parts(outcomes: Vec<Outcome>, unresolved: Vec<String>, errors: Vec<String>) -> Self {
        let summary = RunSummary {
            total: outcomes.len(),
            succeeded: outcomes.iter().filter(|o| o.success).count(),
            failed: outcomes.iter().filter(|o| !o.success).count(),
            refused: outcomes.iter().filter(|o| o.status.is_refusal()).count(),
            unresolved: unresolved.len(),
            errors: errors.len(),
        };

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary,
            outcomes,
            unresolved,
            errors,
            metadata: None,
        }
    }

    /// Whether anything failed, was refused, or stayed unresolved
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0 || self.summary.unresolved > 0 || self.summary.errors > 0
    }

    /// Outcomes with the given status
    pub fn outcomes_with(&self, status: OutcomeStatus) -> Vec<&Outcome> {
        self.outcomes.iter().filter(|o| o.status == status).collect()
    }

    /// Last recorded outcome for an artifact key
    pub fn last_outcome(&self, key: &str) -> Option<&Outcome> {
        self.outcomes.iter().rev().find(|o| o.key == key)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
