//! ddlsync Core
//!
//! Core domain model shared by every ddlsync crate.
//! Outcome status codes and the report layout are part of the public API.

pub mod artifact;
pub mod definition;
pub mod outcome;
pub mod report;
pub mod config;

pub use artifact::{Artifact, ArtifactKind, Dependency, LifecycleState, Phase, content_hash};
pub use definition::{
    ColumnDefinition, Definition, ForeignKey, IndexDefinition, JobDefinition, JobParameter,
    ParseError, SchemaDefinition, TableConstraints, TableDefinition, ViewDefinition,
};
pub use outcome::{Outcome, OutcomeStatus};
pub use report::{RunReport, RunSummary, ReportVersion};
pub use config::{Config, ConfigError, EmptyUpdatePolicy, ReconcileConfig, SafetyConfig};
