//! Reconciliation run orchestration
//!
//! One run goes through:
//! 1. Loading: definitions that fail to parse are reported and left out
//! 2. Ordering: each kind is sorted dependencies first; a cycle ends the run
//!    before any record is saved
//! 3. Admission: each artifact is compared with its stored record
//! 4. DROP of orphans, kinds in reverse priority, dependents first
//! 5. CREATE then UPDATE, kinds in priority order
//! 6. Cleanup of the records of dropped orphans
//!
//! Every phase goes through the depleter, so an artifact that fails never
//! stops independent ones.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use ddlsync_catalog::{ArtifactStore, LiveSystem, StoreError};
use ddlsync_core::{Artifact, ArtifactKind, Config, LifecycleState, Phase, RunReport};
use ddlsync_graph::{sort, CyclicDependencyError, DependencyGraph, SortResult};

use crate::depleter::deplete;
use crate::loader::{DefinitionLoader, DefinitionSource};
use crate::registry::SynchronizerRegistry;
use crate::synchronizer::{SyncContext, Synchronizer, TopologyWrapper};

/// Reconciles definition sets against one target and one artifact store
///
/// Callers must not run two reconcilers against the same target at once.
pub struct Reconciler {
    registry: SynchronizerRegistry,
    loader: DefinitionLoader,
    config: Arc<Config>,
    target: Arc<dyn LiveSystem>,
    store: Arc<dyn ArtifactStore>,
}

impl Reconciler {
    /// Create a reconciler with the default synchronizers
    pub fn new(target: Arc<dyn LiveSystem>, store: Arc<dyn ArtifactStore>, config: Config) -> Self {
        let config = Arc::new(config);
        let registry = SynchronizerRegistry::with_defaults();
        Self {
            loader: DefinitionLoader::new(registry.clone(), config.clone()),
            registry,
            config,
            target,
            store,
        }
    }

    /// Replace the synchronizer registry
    pub fn with_registry(mut self, registry: SynchronizerRegistry) -> Self {
        self.loader = DefinitionLoader::new(registry.clone(), self.config.clone());
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn loader(&self) -> &DefinitionLoader {
        &self.loader
    }

    /// Dependency-first order of each kind, in priority order
    pub fn order(&self, artifacts: &[Artifact]) -> Result<Vec<(ArtifactKind, SortResult)>, CyclicDependencyError> {
        self.registry
            .in_priority()
            .iter()
            .map(|sync| {
                let by_name = by_name(artifacts.iter().filter(|a| sync.is_accepted(a.kind)));
                sort(&by_name).map(|result| (sync.kind(), result))
            })
            .collect()
    }

    /// Run one reconciliation over a complete definition set
    pub async fn run(&self, sources: &[DefinitionSource]) -> RunReport {
        let mut ctx = SyncContext::new(self.target.clone(), self.store.clone(), self.config.clone());
        tracing::info!(
            definitions = sources.len(),
            target = self.target.name(),
            "reconciliation started"
        );

        // Loading
        let mut unreadable = HashSet::new();
        let mut loaded = Vec::new();
        for source in sources {
            match self.loader.load(&source.location, &source.content) {
                Ok(artifacts) => loaded.extend(artifacts),
                Err(e) => {
                    ctx.recorder.add_error(e.to_string());
                    unreadable.insert(source.location.clone());
                }
            }
        }

        // Ordering, before anything is recorded in the store
        let loaded = dedupe(loaded, &mut ctx);
        let ordered = match self.order(&loaded) {
            Ok(ordered) => ordered,
            Err(e) => {
                ctx.recorder.add_error(e.to_string());
                return self.finish(ctx, sources.len());
            }
        };

        // Admission
        let current = match self.admit(loaded).await {
            Ok(current) => current,
            Err(e) => {
                ctx.recorder.add_error(format!("Admission failed: {}", e));
                return self.finish(ctx, sources.len());
            }
        };
        for (kind, result) in &ordered {
            if !result.external.is_empty() {
                tracing::debug!(%kind, external = ?result.external, "dependencies outside the definition set");
            }
        }

        let by_key: HashMap<String, Artifact> =
            current.into_iter().map(|a| (a.key.clone(), a)).collect();
        let siblings: Arc<HashSet<(ArtifactKind, String)>> =
            Arc::new(by_key.values().map(|a| (a.kind, a.name.clone())).collect());

        // Orphans
        let dropped = if self.config.reconcile.cleanup_orphans {
            let orphans = self.orphans(&by_key, &siblings, &unreadable, &mut ctx).await;
            self.drop_orphans(orphans, &mut ctx).await
        } else {
            Vec::new()
        };

        // Create and update
        for (kind, result) in ordered {
            let Some(sync) = self.registry.get(kind).cloned() else {
                continue;
            };
            let artifacts: Vec<Artifact> = by_key
                .values()
                .filter(|a| a.kind == kind)
                .cloned()
                .collect();
            let by_name = by_name(artifacts.iter());

            let items: Vec<TopologyWrapper> = result
                .ordered
                .iter()
                .filter_map(|name| by_name.get(name).cloned())
                .map(|artifact| TopologyWrapper::new(artifact, sync.clone(), siblings.clone()))
                .collect();

            let created = self.deplete_phase(items, Phase::Create, &mut ctx).await;
            self.deplete_phase(created, Phase::Update, &mut ctx).await;
        }

        // Cleanup
        for item in dropped {
            if let Err(e) = item.synchronizer.cleanup(&item.artifact, &ctx).await {
                ctx.recorder
                    .add_error(format!("Cleanup of [{}] failed: {}", item.artifact.key, e));
            }
        }

        let report = self.finish(ctx, sources.len());
        tracing::info!(
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            refused = report.summary.refused,
            unresolved = report.summary.unresolved,
            errors = report.summary.errors,
            "reconciliation finished"
        );
        report
    }

    /// Report of a run, with the settings it ran under
    fn finish(&self, ctx: SyncContext, definitions: usize) -> RunReport {
        let mut report = ctx.recorder.into_report();
        report.metadata = Some(serde_json::json!({
            "target": self.target.name(),
            "definitions": definitions,
            "max_passes": self.config.reconcile.max_passes,
            "empty_update": self.config.reconcile.empty_update,
            "cleanup_orphans": self.config.reconcile.cleanup_orphans,
        }));
        report
    }

    /// Compare loaded artifacts with their stored records and save them back
    async fn admit(&self, loaded: Vec<Artifact>) -> Result<Vec<Artifact>, StoreError> {
        let mut admitted = Vec::with_capacity(loaded.len());

        for mut artifact in loaded {
            let stored = self.store.find_by_key(&artifact.key).await?;
            artifact.lifecycle = match &stored {
                None => LifecycleState::New,
                Some(stored) if stored.content_hash == artifact.content_hash => match stored.lifecycle {
                    LifecycleState::Failed => LifecycleState::Modified,
                    LifecycleState::Deleted => LifecycleState::New,
                    kept => kept,
                },
                Some(stored) => match stored.lifecycle {
                    LifecycleState::New | LifecycleState::Deleted => LifecycleState::New,
                    _ => LifecycleState::Modified,
                },
            };
            artifact.id = stored.and_then(|s| s.id);

            tracing::debug!(key = %artifact.key, lifecycle = %artifact.lifecycle, "admitted");
            admitted.push(self.store.save(artifact).await?);
        }

        Ok(admitted)
    }

    /// Stored artifacts that are no longer declared
    ///
    /// Records of unreadable definitions are kept: a parse failure must
    /// never cause a drop. A record whose object is now declared under
    /// another key has moved; it is forgotten without touching the target.
    async fn orphans(
        &self,
        current: &HashMap<String, Artifact>,
        declared: &HashSet<(ArtifactKind, String)>,
        unreadable: &HashSet<String>,
        ctx: &mut SyncContext,
    ) -> Vec<Artifact> {
        let stored = match self.store.all().await {
            Ok(stored) => stored,
            Err(e) => {
                ctx.recorder.add_error(format!("Listing stored artifacts failed: {}", e));
                return Vec::new();
            }
        };

        let mut orphans = Vec::new();
        for artifact in stored {
            if current.contains_key(&artifact.key) || unreadable.contains(&artifact.location) {
                continue;
            }
            if declared.contains(&(artifact.kind, artifact.name.clone())) {
                tracing::info!(key = %artifact.key, "artifact moved, forgetting its old record");
                if let Err(e) = self.store.delete(&artifact).await {
                    ctx.recorder
                        .add_error(format!("Cleanup of [{}] failed: {}", artifact.key, e));
                }
                continue;
            }
            orphans.push(artifact);
        }

        if !orphans.is_empty() {
            tracing::info!(orphans = orphans.len(), "artifacts no longer declared");
        }
        orphans
    }

    /// DROP orphans, dependents before their dependencies
    async fn drop_orphans(&self, orphans: Vec<Artifact>, ctx: &mut SyncContext) -> Vec<TopologyWrapper> {
        if orphans.is_empty() {
            return Vec::new();
        }

        let graph = DependencyGraph::from_artifacts(orphans.iter());
        let identity: HashMap<&str, (ArtifactKind, String)> = orphans
            .iter()
            .map(|a| (a.key.as_str(), (a.kind, a.name.clone())))
            .collect();
        let dependents: HashMap<String, Vec<(ArtifactKind, String)>> = orphans
            .iter()
            .map(|a| {
                let children = graph
                    .children(&a.key)
                    .into_iter()
                    .filter_map(|child| identity.get(child.as_str()).cloned())
                    .collect();
                (a.key.clone(), children)
            })
            .collect();
        let siblings = Arc::new(HashSet::new());

        let mut dropped = Vec::new();
        for sync in self.registry.in_priority().into_iter().rev() {
            let of_kind: Vec<&Artifact> = orphans.iter().filter(|a| sync.is_accepted(a.kind)).collect();
            if of_kind.is_empty() {
                continue;
            }

            let by_name = by_name(of_kind.iter().copied());
            let mut names: Vec<String> = match sort(&by_name) {
                Ok(result) => result.ordered,
                Err(e) => {
                    tracing::warn!(error = %e, "orphans have no dependency order, dropping by key");
                    by_name.keys().cloned().collect()
                }
            };
            names.reverse();

            let items: Vec<TopologyWrapper> = names
                .iter()
                .filter_map(|name| by_name.get(name).cloned())
                .map(|artifact| {
                    let waits_for = dependents.get(&artifact.key).cloned().unwrap_or_default();
                    TopologyWrapper::new(artifact, sync.clone(), siblings.clone()).with_dependents(waits_for)
                })
                .collect();

            dropped.extend(self.deplete_phase(items, Phase::Drop, ctx).await);
        }

        dropped
    }

    /// Deplete one phase and mark what is left as undepleted
    async fn deplete_phase(&self, items: Vec<TopologyWrapper>, phase: Phase, ctx: &mut SyncContext) -> Vec<TopologyWrapper> {
        if items.is_empty() {
            return items;
        }

        let bound = self.config.reconcile.pass_bound(items.len());
        let depletion = deplete(items, phase, ctx, bound).await;
        tracing::info!(
            %phase,
            completed = depletion.completed.len(),
            unresolved = depletion.unresolved.len(),
            passes = depletion.passes,
            "phase done"
        );

        for item in depletion.unresolved {
            let reason = depletion.errors.get(&item.artifact.key).map(String::as_str);
            let mut artifact = item.artifact;
            ctx.recorder.register_undepleted(&artifact, phase, reason);

            artifact.set_lifecycle(LifecycleState::Failed, reason.map(str::to_string));
            if let Err(e) = self.store.save(artifact).await {
                ctx.recorder.add_error(format!("Failed to save artifact: {}", e));
            }
        }

        depletion.completed
    }
}

/// Drop later artifacts repeating a key, or a kind and name
fn dedupe(loaded: Vec<Artifact>, ctx: &mut SyncContext) -> Vec<Artifact> {
    let mut keys = HashSet::new();
    let mut names = HashSet::new();

    loaded
        .into_iter()
        .filter(|artifact| {
            if !keys.insert(artifact.key.clone()) {
                ctx.recorder
                    .add_error(format!("Duplicate artifact key [{}], later definition ignored", artifact.key));
                return false;
            }
            if !names.insert((artifact.kind, artifact.name.clone())) {
                ctx.recorder.add_error(format!(
                    "Duplicate {} [{}] at [{}], later definition ignored",
                    artifact.kind, artifact.name, artifact.location
                ));
                return false;
            }
            true
        })
        .collect()
}

/// Name-keyed map for the sorter
fn by_name<'a>(artifacts: impl Iterator<Item = &'a Artifact>) -> BTreeMap<String, Artifact> {
    artifacts.map(|a| (a.name.clone(), a.clone())).collect()
}
