//! Schema synchronizer
//!
//! A schema file declares the schema and the tables and views inside it.
//! Parsing yields one artifact for the schema and one per contained object;
//! contained objects refer to the schema by name.

use async_trait::async_trait;
use ddlsync_core::{
    definition::parse_json, Artifact, ArtifactKind, Config, Definition, OutcomeStatus, ParseError,
    SchemaDefinition,
};

use super::{canonical_bytes, SyncContext, SyncError, Synchronizer, TableSynchronizer, UpdateStrategy, ViewSynchronizer};

/// A schema holds its contained objects; a non-empty schema is never dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaSynchronizer;

#[async_trait]
impl Synchronizer for SchemaSynchronizer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Schema
    }

    fn priority(&self) -> u32 {
        10
    }

    fn holds_data(&self) -> bool {
        true
    }

    fn update_strategy(&self) -> UpdateStrategy {
        UpdateStrategy::RecreateWhenEmpty
    }

    fn parse(&self, location: &str, content: &[u8], config: &Config) -> Result<Vec<Artifact>, ParseError> {
        let mut schema: SchemaDefinition = parse_json(location, content)?;

        let name = schema
            .name
            .take()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| config.reconcile.default_schema.clone());
        let tables = std::mem::take(&mut schema.tables);
        let views = std::mem::take(&mut schema.views);
        schema.name = Some(name.clone());

        // Hashed without its contents, so a changed table leaves the schema unchanged
        let bytes = canonical_bytes(location, &schema)?;
        let mut artifacts = vec![Artifact::new(name.clone(), location, &bytes, Definition::Schema(schema))];

        for table in tables {
            artifacts.push(TableSynchronizer::contained(table, &name, location)?);
        }
        for view in views {
            artifacts.push(ViewSynchronizer::contained(view, &name, location)?);
        }

        let mut seen = std::collections::HashSet::new();
        for artifact in &artifacts {
            if !seen.insert(&artifact.key) {
                return Err(ParseError::new(
                    location,
                    format!("schema [{}] declares {} [{}] twice", name, artifact.kind, artifact.name),
                ));
            }
        }

        Ok(artifacts)
    }

    async fn alter(&self, artifact: &Artifact, _ctx: &SyncContext) -> Result<OutcomeStatus, SyncError> {
        tracing::debug!(name = %artifact.name, "schema has nothing to alter");
        Ok(OutcomeStatus::Satisfied)
    }
}
