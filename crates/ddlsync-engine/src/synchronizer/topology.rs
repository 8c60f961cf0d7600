//! Depletable wrapper around one artifact

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ddlsync_core::{Artifact, ArtifactKind, LifecycleState, Phase};

use super::{Completion, SyncContext, SyncError, Synchronizer};
use crate::depleter::Depletable;

/// An artifact paired with the synchronizer of its kind
///
/// An attempt is blocked until every dependency that takes part in the run
/// has completed the same phase (for CREATE and UPDATE), or until every
/// artifact depending on this one has been dropped (for DROP).
pub struct TopologyWrapper {
    pub artifact: Artifact,

    pub synchronizer: Arc<dyn Synchronizer>,

    /// (kind, name) of every artifact taking part in the run
    siblings: Arc<HashSet<(ArtifactKind, String)>>,

    /// (kind, name) of artifacts that must be dropped before this one
    dependents: Vec<(ArtifactKind, String)>,
}

impl TopologyWrapper {
    pub fn new(
        artifact: Artifact,
        synchronizer: Arc<dyn Synchronizer>,
        siblings: Arc<HashSet<(ArtifactKind, String)>>,
    ) -> Self {
        Self {
            artifact,
            synchronizer,
            siblings,
            dependents: Vec::new(),
        }
    }

    pub fn with_dependents(mut self, dependents: Vec<(ArtifactKind, String)>) -> Self {
        self.dependents = dependents;
        self
    }

    fn blocked(&self, dependency: ArtifactKind, name: &str) -> SyncError {
        SyncError::Blocked {
            kind: self.artifact.kind,
            name: self.artifact.name.clone(),
            dependency: format!("{} [{}]", dependency, name),
        }
    }

    /// Whether `phase` can change anything for the admitted lifecycle
    ///
    /// An artifact with nothing to do never waits, so a failing neighbour
    /// cannot hold it back.
    fn has_work(&self, phase: Phase) -> bool {
        match phase {
            Phase::Create => self.artifact.lifecycle == LifecycleState::New,
            Phase::Update => self.artifact.lifecycle == LifecycleState::Modified,
            Phase::Drop => self.artifact.lifecycle.may_own_live_object(),
        }
    }

    fn check_ready(&self, phase: Phase, ctx: &SyncContext) -> Result<(), SyncError> {
        match phase {
            Phase::Create | Phase::Update => {
                for dependency in &self.artifact.dependencies {
                    let in_run = self.siblings.contains(&(dependency.kind, dependency.name.clone()));
                    if in_run && !ctx.is_resolved(phase, dependency.kind, &dependency.name) {
                        return Err(self.blocked(dependency.kind, &dependency.name));
                    }
                }
            }
            Phase::Drop => {
                for (kind, name) in &self.dependents {
                    if !ctx.is_resolved(Phase::Drop, *kind, name) {
                        return Err(self.blocked(*kind, name));
                    }
                }
            }
        }
        Ok(())
    }

    async fn commit(&mut self, phase: Phase, completion: Completion, ctx: &mut SyncContext) -> Result<(), SyncError> {
        let mut artifact = self.artifact.clone();
        artifact.set_lifecycle(completion.state, None);

        ctx.recorder
            .register_success(&artifact, phase, completion.status, completion.message);
        if completion.state != LifecycleState::Deleted {
            artifact = ctx.store.save(artifact).await?;
        }

        ctx.resolve(phase, artifact.kind, &artifact.name);
        self.artifact = artifact;
        Ok(())
    }

    async fn fail(&self, phase: Phase, error: &SyncError, ctx: &mut SyncContext) {
        let mut artifact = self.artifact.clone();
        artifact.set_lifecycle(LifecycleState::Failed, Some(error.to_string()));

        ctx.recorder
            .register_failure(&artifact, phase, error.status(phase), error.to_string());
        if let Err(e) = ctx.store.save(artifact).await {
            ctx.recorder
                .add_error(format!("Failed to save artifact [{}]: {}", self.artifact.key, e));
        }
    }
}

#[async_trait]
impl Depletable for TopologyWrapper {
    type Context = SyncContext;
    type Error = SyncError;

    fn id(&self) -> String {
        self.artifact.key.clone()
    }

    async fn attempt(&mut self, phase: Phase, ctx: &mut SyncContext) -> Result<(), SyncError> {
        if self.has_work(phase) {
            self.check_ready(phase, ctx)?;
        }

        let result = match self.synchronizer.complete(&self.artifact, phase, ctx).await {
            Ok(completion) => self.commit(phase, completion, ctx).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            self.fail(phase, e, ctx).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depleter::deplete;
    use crate::synchronizer::TableSynchronizer;
    use ddlsync_catalog::{ArtifactStore, MemoryStore, MockTarget};
    use ddlsync_core::{ColumnDefinition, Config, Definition, ForeignKey, OutcomeStatus, TableDefinition};

    fn table(name: &str, references: Option<&str>) -> Artifact {
        let mut definition = TableDefinition::new(name, vec![ColumnDefinition::new("ID", "INTEGER")]);
        if let Some(referenced) = references {
            definition = definition.with_foreign_key(ForeignKey {
                name: format!("FK_{}", referenced),
                columns: vec!["ID".to_string()],
                referenced_table: referenced.to_string(),
                referenced_columns: vec!["ID".to_string()],
            });
        }
        let bytes = serde_json::to_vec(&definition).unwrap();
        TableSynchronizer::artifact(definition, &format!("/{}.table", name), &bytes, false)
    }

    #[tokio::test]
    async fn dependent_waits_for_its_dependency() {
        let target = MockTarget::new();
        let store = MemoryStore::new();
        let mut ctx = SyncContext::new(
            Arc::new(target.clone()),
            Arc::new(store.clone()),
            Arc::new(Config::default()),
        );

        let artifacts = vec![table("ORDERS", Some("CUSTOMERS")), table("CUSTOMERS", None)];
        let siblings: Arc<HashSet<_>> =
            Arc::new(artifacts.iter().map(|a| (a.kind, a.name.clone())).collect());
        let sync: Arc<dyn Synchronizer> = Arc::new(TableSynchronizer);
        let items: Vec<_> = artifacts
            .into_iter()
            .map(|a| TopologyWrapper::new(a, sync.clone(), siblings.clone()))
            .collect();

        let result = deplete(items, Phase::Create, &mut ctx, 3).await;

        assert!(result.is_complete());
        assert_eq!(result.passes, 2);
        // Waiting is not a failure and leaves no trace
        assert_eq!(ctx.recorder.outcomes().len(), 2);
        assert!(ctx.recorder.outcomes().iter().all(|o| o.status == OutcomeStatus::Created));
        // No create was attempted before its referenced table existed
        let created: Vec<String> = target.applied().await.iter().map(|i| i.name().to_string()).collect();
        assert_eq!(created, vec!["CUSTOMERS", "ORDERS"]);

        let saved = store.find_by_key("TABLE:/ORDERS.table").await.unwrap().unwrap();
        assert_eq!(saved.lifecycle, LifecycleState::Created);
    }

    #[tokio::test]
    async fn unchanged_dependent_does_not_wait_on_a_failing_update() {
        let target = MockTarget::new();
        target.fail_on("CUSTOMERS", "lock timeout").await;
        let store = MemoryStore::new();
        let mut ctx = SyncContext::new(
            Arc::new(target.clone()),
            Arc::new(store.clone()),
            Arc::new(Config::default()),
        );

        let mut customers = table("CUSTOMERS", None);
        customers.lifecycle = LifecycleState::Modified;
        let mut orders = table("ORDERS", Some("CUSTOMERS"));
        orders.lifecycle = LifecycleState::Created;
        let siblings: Arc<HashSet<_>> = Arc::new(
            [&customers, &orders].iter().map(|a| (a.kind, a.name.clone())).collect(),
        );
        let sync: Arc<dyn Synchronizer> = Arc::new(TableSynchronizer);
        let items = vec![
            TopologyWrapper::new(customers, sync.clone(), siblings.clone()),
            TopologyWrapper::new(orders, sync, siblings),
        ];

        let result = deplete(items, Phase::Update, &mut ctx, 3).await;

        assert_eq!(result.unresolved.len(), 1);
        assert_eq!(result.unresolved[0].artifact.name, "CUSTOMERS");
        let outcome = ctx.recorder.outcome("TABLE:/ORDERS.table", Phase::Update).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Satisfied);
        assert_eq!(outcome.state, LifecycleState::Created);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_saved() {
        let target = MockTarget::new();
        target.fail_on("CUSTOMERS", "permission denied").await;
        let store = MemoryStore::new();
        let mut ctx = SyncContext::new(
            Arc::new(target.clone()),
            Arc::new(store.clone()),
            Arc::new(Config::default()),
        );

        let artifact = table("CUSTOMERS", None);
        let siblings = Arc::new(HashSet::new());
        let mut item = TopologyWrapper::new(artifact, Arc::new(TableSynchronizer), siblings);

        let err = item.attempt(Phase::Create, &mut ctx).await.unwrap_err();

        assert!(err.to_string().contains("permission denied"));
        let outcome = ctx.recorder.outcome("TABLE:/CUSTOMERS.table", Phase::Create).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.state, LifecycleState::Failed);

        let saved = store.find_by_key("TABLE:/CUSTOMERS.table").await.unwrap().unwrap();
        assert_eq!(saved.lifecycle, LifecycleState::Failed);
        // The wrapper still holds the admitted state, so a retry creates
        assert_eq!(item.artifact.lifecycle, LifecycleState::New);
        assert!(matches!(item.artifact.definition, Definition::Table(_)));
    }
}
