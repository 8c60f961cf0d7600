//! View synchronizer

use async_trait::async_trait;
use ddlsync_core::{
    definition::parse_json, Artifact, ArtifactKind, Config, Definition, Dependency, OutcomeStatus,
    ParseError, ViewDefinition,
};

use super::{canonical_bytes, recreate, SyncContext, SyncError, Synchronizer, UpdateStrategy};

/// Views hold no data; any change is applied by recreating the view
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewSynchronizer;

impl ViewSynchronizer {
    fn validate(view: &ViewDefinition, location: &str) -> Result<(), ParseError> {
        if view.name.trim().is_empty() {
            return Err(ParseError::new(location, "view name is empty"));
        }
        if view.query.trim().is_empty() {
            return Err(ParseError::new(
                location,
                format!("view [{}] has no query", view.name),
            ));
        }
        Ok(())
    }

    pub(crate) fn artifact(view: ViewDefinition, location: &str, content: &[u8], contained: bool) -> Artifact {
        let mut dependencies = Vec::new();
        if let Some(schema) = &view.schema {
            dependencies.push(Dependency::new(schema.clone(), ArtifactKind::Schema));
        }
        dependencies.extend(view.dependencies.iter().cloned());

        let name = view.name.clone();
        let mut artifact = if contained {
            Artifact::contained(name, location, content, Definition::View(view))
        } else {
            Artifact::new(name, location, content, Definition::View(view))
        };
        for dependency in dependencies {
            artifact.add_dependency(dependency);
        }
        artifact
    }

    pub(crate) fn contained(mut view: ViewDefinition, schema: &str, location: &str) -> Result<Artifact, ParseError> {
        view.schema = Some(schema.to_string());
        Self::validate(&view, location)?;
        let bytes = canonical_bytes(location, &view)?;
        Ok(Self::artifact(view, location, &bytes, true))
    }
}

#[async_trait]
impl Synchronizer for ViewSynchronizer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::View
    }

    fn priority(&self) -> u32 {
        30
    }

    fn holds_data(&self) -> bool {
        false
    }

    fn update_strategy(&self) -> UpdateStrategy {
        UpdateStrategy::AlwaysRecreate
    }

    fn parse(&self, location: &str, content: &[u8], _config: &Config) -> Result<Vec<Artifact>, ParseError> {
        let view: ViewDefinition = parse_json(location, content)?;
        Self::validate(&view, location)?;
        Ok(vec![Self::artifact(view, location, content, false)])
    }

    async fn alter(&self, artifact: &Artifact, ctx: &SyncContext) -> Result<OutcomeStatus, SyncError> {
        recreate(self, artifact, ctx).await
    }
}
