//! Job synchronizer
//!
//! Jobs are registered with the target's scheduler. A changed job is
//! re-registered in place; disabled jobs stay registered.

use async_trait::async_trait;
use ddlsync_catalog::DdlIntent;
use ddlsync_core::{
    definition::parse_json, Artifact, ArtifactKind, Config, Definition, JobDefinition,
    OutcomeStatus, ParseError,
};

use super::{SyncContext, SyncError, Synchronizer, UpdateStrategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct JobSynchronizer;

#[async_trait]
impl Synchronizer for JobSynchronizer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Job
    }

    fn priority(&self) -> u32 {
        40
    }

    fn holds_data(&self) -> bool {
        false
    }

    fn update_strategy(&self) -> UpdateStrategy {
        UpdateStrategy::AlwaysAlter
    }

    fn parse(&self, location: &str, content: &[u8], _config: &Config) -> Result<Vec<Artifact>, ParseError> {
        let job: JobDefinition = parse_json(location, content)?;
        job.validate(location)?;

        let dependencies = job.dependencies.clone();
        let artifact = Artifact::new(job.name.clone(), location, content, Definition::Job(job))
            .with_dependencies(dependencies);
        Ok(vec![artifact])
    }

    async fn alter(&self, artifact: &Artifact, ctx: &SyncContext) -> Result<OutcomeStatus, SyncError> {
        ctx.target
            .apply(&DdlIntent::Alter {
                kind: ArtifactKind::Job,
                name: artifact.name.clone(),
                changes: Vec::new(),
                definition: artifact.definition.clone(),
            })
            .await?;
        Ok(OutcomeStatus::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlsync_catalog::{MemoryStore, MockTarget};
    use ddlsync_core::{LifecycleState, Phase};
    use std::sync::Arc;

    const JOB: &[u8] = br#"{
        "name": "nightly-cleanup",
        "group": "maintenance",
        "expression": "0 0 2 * * ?",
        "handler": "cleanup/run.js",
        "enabled": false,
        "parameters": [{"name": "days", "type": "INTEGER", "defaultValue": "30"}]
    }"#;

    #[test]
    fn parse_job() {
        let artifacts = JobSynchronizer.parse("/cleanup.job", JOB, &Config::default()).unwrap();

        assert_eq!(artifacts[0].name, "nightly-cleanup");
        match &artifacts[0].definition {
            Definition::Job(job) => {
                assert!(!job.enabled);
                assert_eq!(job.parameters[0].default_value.as_deref(), Some("30"));
            }
            other => panic!("unexpected definition {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_short_cron() {
        let json = br#"{"name": "j", "expression": "* * * * *", "handler": "h.js"}"#;
        assert!(JobSynchronizer.parse("/j.job", json, &Config::default()).is_err());
    }

    #[tokio::test]
    async fn update_reregisters_in_place() {
        let target = MockTarget::new();
        target.add_object(ArtifactKind::Job, "nightly-cleanup").await;
        let ctx = SyncContext::new(
            Arc::new(target.clone()),
            Arc::new(MemoryStore::new()),
            Arc::new(Config::default()),
        );
        let mut artifact = JobSynchronizer
            .parse("/cleanup.job", JOB, &Config::default())
            .unwrap()
            .remove(0);
        artifact.lifecycle = LifecycleState::Modified;

        let done = JobSynchronizer.complete(&artifact, Phase::Update, &ctx).await.unwrap();

        assert_eq!(done.status, OutcomeStatus::Updated);
        let verbs: Vec<_> = target.applied().await.iter().map(|i| i.verb()).collect();
        assert_eq!(verbs, vec!["alter"]);
    }
}
