//! Table synchronizer

use async_trait::async_trait;
use ddlsync_catalog::{DdlIntent, SqlError};
use ddlsync_core::{
    definition::parse_json, Artifact, ArtifactKind, Config, Definition, Dependency, OutcomeStatus,
    ParseError, Phase, TableDefinition,
};

use super::{canonical_bytes, SyncContext, SyncError, Synchronizer, UpdateStrategy};
use crate::alter::AlterPlan;

/// Tables hold rows: populated tables are only ever altered in place
#[derive(Debug, Clone, Copy, Default)]
pub struct TableSynchronizer;

impl TableSynchronizer {
    /// Build the artifact of a parsed table
    ///
    /// The table depends on its schema, on every table its foreign keys
    /// reference, and on whatever it declares.
    pub(crate) fn artifact(
        table: TableDefinition,
        location: &str,
        content: &[u8],
        contained: bool,
    ) -> Artifact {
        let mut dependencies = Vec::new();
        if let Some(schema) = &table.schema {
            dependencies.push(Dependency::new(schema.clone(), ArtifactKind::Schema));
        }
        for referenced in table.referenced_tables() {
            dependencies.push(Dependency::new(referenced, ArtifactKind::Table));
        }
        dependencies.extend(table.dependencies.iter().cloned());

        let name = table.name.clone();
        let mut artifact = if contained {
            Artifact::contained(name, location, content, Definition::Table(table))
        } else {
            Artifact::new(name, location, content, Definition::Table(table))
        };
        for dependency in dependencies {
            artifact.add_dependency(dependency);
        }
        artifact
    }

    /// Validate a table found inside a schema file and build its artifact
    pub(crate) fn contained(
        mut table: TableDefinition,
        schema: &str,
        location: &str,
    ) -> Result<Artifact, ParseError> {
        table.schema = Some(schema.to_string());
        table.validate(location)?;
        let bytes = canonical_bytes(location, &table)?;
        Ok(Self::artifact(table, location, &bytes, true))
    }
}

#[async_trait]
impl Synchronizer for TableSynchronizer {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Table
    }

    fn priority(&self) -> u32 {
        20
    }

    fn holds_data(&self) -> bool {
        true
    }

    fn update_strategy(&self) -> UpdateStrategy {
        UpdateStrategy::RecreateWhenEmpty
    }

    fn parse(&self, location: &str, content: &[u8], _config: &Config) -> Result<Vec<Artifact>, ParseError> {
        let table: TableDefinition = parse_json(location, content)?;
        table.validate(location)?;
        Ok(vec![Self::artifact(table, location, content, false)])
    }

    async fn alter(&self, artifact: &Artifact, ctx: &SyncContext) -> Result<OutcomeStatus, SyncError> {
        let desired = artifact.definition.as_table().ok_or_else(|| {
            SyncError::Unsupported(format!("artifact [{}] is not a table", artifact.key))
        })?;

        let live = ctx
            .target
            .describe(&artifact.name)
            .await?
            .ok_or_else(|| SyncError::Sql(SqlError::new(format!("table [{}] does not exist", artifact.name))))?;
        let populated = ctx.target.row_count(ArtifactKind::Table, &artifact.name).await? > 0;

        let plan = AlterPlan::compute(desired, &live, populated, &ctx.config.safety);
        if plan.is_refused() {
            return Err(SyncError::DestructiveActionRefused {
                action: Phase::Update,
                kind: ArtifactKind::Table,
                name: artifact.name.clone(),
                reason: plan.refusals.join("; "),
            });
        }
        if plan.changes.is_empty() {
            tracing::debug!(name = %artifact.name, "live table already matches");
            return Ok(OutcomeStatus::Satisfied);
        }

        tracing::info!(name = %artifact.name, changes = %plan.summary(), "altering table in place");
        ctx.target
            .apply(&DdlIntent::Alter {
                kind: ArtifactKind::Table,
                name: artifact.name.clone(),
                changes: plan.changes,
                definition: artifact.definition.clone(),
            })
            .await?;
        Ok(OutcomeStatus::Updated)
    }
}
