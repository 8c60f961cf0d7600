//! Per-kind synchronizers
//!
//! A synchronizer is the capability record of one artifact kind: how its
//! definition files are parsed, whether its objects hold data, and how an
//! existing object is carried over to a new definition. The lifecycle state
//! machine itself is shared by every kind and lives in [`complete_lifecycle`].
//!
//! ## Lifecycle
//!
//! | phase  | object missing | exists, empty            | exists, holds data |
//! |--------|----------------|--------------------------|--------------------|
//! | CREATE | create         | update path              | satisfied          |
//! | UPDATE | create         | [`UpdateStrategy`]       | alter in place     |
//! | DROP   | satisfied      | drop                     | refused            |

mod job;
mod schema;
mod table;
mod topology;
mod view;

pub use job::JobSynchronizer;
pub use schema::SchemaSynchronizer;
pub use table::TableSynchronizer;
pub use topology::TopologyWrapper;
pub use view::ViewSynchronizer;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ddlsync_catalog::{ArtifactStore, DdlIntent, LiveSystem, SqlError, StoreError};
use ddlsync_core::{
    Artifact, ArtifactKind, Config, EmptyUpdatePolicy, LifecycleState, OutcomeStatus, ParseError,
    Phase,
};

use crate::callback::ResultRecorder;

/// Errors raised while completing one artifact
///
/// These never leave the depleter; they become recorded outcomes.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("SQL error: {0}")]
    Sql(#[from] SqlError),

    #[error("Refused to {action} {kind} [{name}]: {reason}")]
    DestructiveActionRefused {
        action: Phase,
        kind: ArtifactKind,
        name: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A dependency has not been completed in this phase yet
    #[error("{kind} [{name}] is waiting for {dependency}")]
    Blocked {
        kind: ArtifactKind,
        name: String,
        dependency: String,
    },

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl SyncError {
    /// Outcome status recorded for this error in `phase`
    pub fn status(&self, phase: Phase) -> OutcomeStatus {
        match (self, phase) {
            (Self::DestructiveActionRefused { .. }, Phase::Drop) => OutcomeStatus::FailedDelete,
            (Self::DestructiveActionRefused { .. }, _) => OutcomeStatus::FailedUpdate,
            _ => OutcomeStatus::Failed,
        }
    }

    /// Whether the artifact is only waiting and has not failed
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// How an existing object that holds no data is carried to a new definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Follow `reconcile.empty_update`: recreate or alter
    RecreateWhenEmpty,

    /// Always drop and recreate
    AlwaysRecreate,

    /// Always alter in place
    AlwaysAlter,
}

/// Result of completing one artifact for one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: OutcomeStatus,

    /// Lifecycle state the artifact moves to
    pub state: LifecycleState,

    pub message: Option<String>,
}

impl Completion {
    pub fn new(status: OutcomeStatus, state: LifecycleState) -> Self {
        Self {
            status,
            state,
            message: None,
        }
    }

    /// Nothing to do; the artifact keeps `state`
    pub fn satisfied(state: LifecycleState, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Satisfied,
            state,
            message: Some(message.into()),
        }
    }
}

/// Everything an attempt needs besides the artifact
pub struct SyncContext {
    pub target: Arc<dyn LiveSystem>,

    pub store: Arc<dyn ArtifactStore>,

    pub config: Arc<Config>,

    pub recorder: ResultRecorder,

    /// (phase, kind, name) completed so far in this run
    resolved: HashSet<(Phase, ArtifactKind, String)>,
}

impl SyncContext {
    pub fn new(target: Arc<dyn LiveSystem>, store: Arc<dyn ArtifactStore>, config: Arc<Config>) -> Self {
        Self {
            target,
            store,
            config,
            recorder: ResultRecorder::new(),
            resolved: HashSet::new(),
        }
    }

    /// Mark an artifact as completed for `phase`
    pub fn resolve(&mut self, phase: Phase, kind: ArtifactKind, name: &str) {
        self.resolved.insert((phase, kind, name.to_string()));
    }

    pub fn is_resolved(&self, phase: Phase, kind: ArtifactKind, name: &str) -> bool {
        self.resolved.contains(&(phase, kind, name.to_string()))
    }
}

/// Capability record of one artifact kind
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Kind handled by this synchronizer
    fn kind(&self) -> ArtifactKind;

    /// Cross-kind order; lower runs first on create and update, last on drop
    fn priority(&self) -> u32;

    /// Definition file extension, without the dot
    fn file_extension(&self) -> &'static str {
        self.kind().extension()
    }

    fn is_accepted(&self, kind: ArtifactKind) -> bool {
        kind == self.kind()
    }

    /// Whether live objects of this kind can hold data worth protecting
    fn holds_data(&self) -> bool;

    fn update_strategy(&self) -> UpdateStrategy;

    /// Parse one definition file into artifacts
    fn parse(&self, location: &str, content: &[u8], config: &Config) -> Result<Vec<Artifact>, ParseError>;

    /// Intent creating the live object of `artifact`
    fn create_intent(&self, artifact: &Artifact) -> DdlIntent {
        DdlIntent::Create {
            kind: artifact.kind,
            name: artifact.name.clone(),
            definition: artifact.definition.clone(),
        }
    }

    /// Carry an existing live object over to the artifact's definition
    async fn alter(&self, artifact: &Artifact, ctx: &SyncContext) -> Result<OutcomeStatus, SyncError>;

    /// Run the lifecycle state machine for one phase
    async fn complete(&self, artifact: &Artifact, phase: Phase, ctx: &SyncContext) -> Result<Completion, SyncError> {
        complete_lifecycle(self, artifact, phase, ctx).await
    }

    /// Remove the record of a dropped artifact
    async fn cleanup(&self, artifact: &Artifact, ctx: &SyncContext) -> Result<(), SyncError> {
        ctx.store.delete(artifact).await?;
        Ok(())
    }
}

/// Shared lifecycle state machine
pub async fn complete_lifecycle<S: Synchronizer + ?Sized>(
    sync: &S,
    artifact: &Artifact,
    phase: Phase,
    ctx: &SyncContext,
) -> Result<Completion, SyncError> {
    let target = ctx.target.as_ref();
    let kind = artifact.kind;
    let name = artifact.name.as_str();

    match phase {
        Phase::Create => {
            match artifact.lifecycle {
                LifecycleState::New => {}
                LifecycleState::Modified => {
                    return Ok(Completion::satisfied(artifact.lifecycle, "pending update"));
                }
                state => return Ok(Completion::satisfied(state, "already created")),
            }

            if !target.exists(kind, name).await? {
                target.apply(&sync.create_intent(artifact)).await?;
                return Ok(Completion::new(OutcomeStatus::Created, LifecycleState::Created));
            }

            if sync.holds_data() && target.row_count(kind, name).await? > 0 {
                tracing::info!(%kind, name, "exists and holds data, leaving it untouched");
                return Ok(Completion::satisfied(LifecycleState::Created, "exists and holds data"));
            }

            let status = update_existing(sync, artifact, ctx, false).await?;
            Ok(Completion::new(status, LifecycleState::Created))
        }

        Phase::Update => {
            if artifact.lifecycle != LifecycleState::Modified {
                return Ok(Completion::satisfied(artifact.lifecycle, "unchanged"));
            }

            if !target.exists(kind, name).await? {
                target.apply(&sync.create_intent(artifact)).await?;
                return Ok(Completion::new(OutcomeStatus::Created, LifecycleState::Updated));
            }

            let populated = sync.holds_data() && target.row_count(kind, name).await? > 0;
            let status = update_existing(sync, artifact, ctx, populated).await?;
            Ok(Completion::new(status, LifecycleState::Updated))
        }

        Phase::Drop => {
            if !artifact.lifecycle.may_own_live_object() {
                tracing::info!(%kind, name, lifecycle = %artifact.lifecycle, "never applied, forgetting the record");
                return Ok(Completion {
                    status: OutcomeStatus::Deleted,
                    state: LifecycleState::Deleted,
                    message: Some("never applied, record forgotten".to_string()),
                });
            }

            if !target.exists(kind, name).await? {
                return Ok(Completion {
                    status: OutcomeStatus::Deleted,
                    state: LifecycleState::Deleted,
                    message: Some("already absent".to_string()),
                });
            }

            if sync.holds_data() {
                let rows = target.row_count(kind, name).await?;
                if rows > 0 {
                    return Err(SyncError::DestructiveActionRefused {
                        action: Phase::Drop,
                        kind,
                        name: name.to_string(),
                        reason: match kind {
                            ArtifactKind::Schema => format!("contains {} objects", rows),
                            _ => format!("holds {} rows", rows),
                        },
                    });
                }
            }

            target.apply(&DdlIntent::Drop { kind, name: name.to_string() }).await?;
            Ok(Completion::new(OutcomeStatus::Deleted, LifecycleState::Deleted))
        }
    }
}

/// Bring an existing object to the artifact's definition
async fn update_existing<S: Synchronizer + ?Sized>(
    sync: &S,
    artifact: &Artifact,
    ctx: &SyncContext,
    populated: bool,
) -> Result<OutcomeStatus, SyncError> {
    if populated {
        return sync.alter(artifact, ctx).await;
    }

    match sync.update_strategy() {
        UpdateStrategy::AlwaysAlter => sync.alter(artifact, ctx).await,
        UpdateStrategy::AlwaysRecreate => recreate(sync, artifact, ctx).await,
        UpdateStrategy::RecreateWhenEmpty => match ctx.config.reconcile.empty_update {
            EmptyUpdatePolicy::Recreate => recreate(sync, artifact, ctx).await,
            EmptyUpdatePolicy::Alter => sync.alter(artifact, ctx).await,
        },
    }
}

/// Drop the live object and create it again from the definition
pub(crate) async fn recreate<S: Synchronizer + ?Sized>(
    sync: &S,
    artifact: &Artifact,
    ctx: &SyncContext,
) -> Result<OutcomeStatus, SyncError> {
    tracing::debug!(kind = %artifact.kind, name = %artifact.name, "recreating");
    ctx.target
        .apply(&DdlIntent::Drop {
            kind: artifact.kind,
            name: artifact.name.clone(),
        })
        .await?;
    ctx.target.apply(&sync.create_intent(artifact)).await?;
    Ok(OutcomeStatus::Updated)
}

/// Serialize a definition part for content hashing
pub(crate) fn canonical_bytes<T: serde::Serialize>(location: &str, value: &T) -> Result<Vec<u8>, ParseError> {
    serde_json::to_vec(value).map_err(|e| ParseError::new(location, e.to_string()))
}
