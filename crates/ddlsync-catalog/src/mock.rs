//! Mock live system for testing
//!
//! This target keeps its objects in memory and applies intents to them
//! without connecting to any database. It's useful for:
//! - Unit testing synchronizer state machines
//! - Integration testing whole reconciliation runs
//! - Dry runs against a snapshot of a real target
//! - Simulating failing statements and lost connectivity
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddlsync_catalog::{LiveSystem, MockTarget};
//!
//! let target = MockTarget::new();
//! target.add_table(TableDefinition::new("ORDERS", columns), 42).await;
//!
//! assert_eq!(target.row_count(ArtifactKind::Table, "ORDERS").await?, 42);
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Every intent on ORDERS fails
//! target.fail_on("ORDERS", "permission denied").await;
//!
//! // The first two intents on ORDERS fail, later ones succeed
//! target.fail_times("ORDERS", 2, "lock timeout").await;
//! ```
//!
//! Besides injected failures, the target enforces a few rules a real
//! database would: a table's foreign keys must reference existing tables,
//! a view's declared dependencies must exist, a table or view in a schema
//! needs that schema, and a schema can only be dropped when empty.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ddlsync_core::{ArtifactKind, Definition, TableDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::intent::{AlterChange, DdlIntent};
use crate::target::{LiveSystem, SqlError};

/// An object living on the mock target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveObject {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,

    pub name: String,

    /// Owning schema, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Rows held (tables only)
    #[serde(default)]
    pub rows: u64,

    /// Last applied definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<Definition>,
}

/// Serializable content of a mock target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Objects by "KIND:NAME"
    #[serde(default)]
    pub objects: BTreeMap<String, LiveObject>,
}

impl TargetState {
    fn object_key(kind: ArtifactKind, name: &str) -> String {
        format!("{}:{}", kind.tag(), name.to_uppercase())
    }

    pub fn get(&self, kind: ArtifactKind, name: &str) -> Option<&LiveObject> {
        self.objects.get(&Self::object_key(kind, name))
    }

    pub fn insert(&mut self, object: LiveObject) {
        self.objects.insert(Self::object_key(object.kind, &object.name), object);
    }

    fn get_mut(&mut self, kind: ArtifactKind, name: &str) -> Option<&mut LiveObject> {
        self.objects.get_mut(&Self::object_key(kind, name))
    }

    fn remove(&mut self, kind: ArtifactKind, name: &str) -> Option<LiveObject> {
        self.objects.remove(&Self::object_key(kind, name))
    }

    /// Objects whose owning schema is `schema`
    fn contained_in(&self, schema: &str) -> usize {
        self.objects
            .values()
            .filter(|o| o.schema.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(schema)))
            .count()
    }
}

#[derive(Debug, Clone)]
enum FailureMode {
    Always(String),
    Times(usize, String),
}

/// Mock live system for testing
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockTarget {
    state: Arc<RwLock<TargetState>>,

    /// Injected intent failures by object name (uppercase)
    failures: Arc<RwLock<HashMap<String, FailureMode>>>,

    /// Object names whose probes fail (uppercase)
    probe_failures: Arc<RwLock<HashMap<String, String>>>,

    /// Every successfully applied intent, in order
    applied: Arc<RwLock<Vec<DdlIntent>>>,
}

impl MockTarget {
    /// Create an empty target
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target from a snapshot
    pub fn from_state(state: TargetState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            ..Self::default()
        }
    }

    /// Copy of the current content
    pub async fn snapshot(&self) -> TargetState {
        self.state.read().await.clone()
    }

    /// Add an existing table with the given row count
    pub async fn add_table(&self, table: TableDefinition, rows: u64) {
        self.state.write().await.insert(LiveObject {
            kind: ArtifactKind::Table,
            name: table.name.clone(),
            schema: table.schema.clone(),
            rows,
            definition: Some(Definition::Table(table)),
        });
    }

    /// Add an existing object without a definition
    pub async fn add_object(&self, kind: ArtifactKind, name: &str) {
        self.state.write().await.insert(LiveObject {
            kind,
            name: name.to_string(),
            schema: None,
            rows: 0,
            definition: None,
        });
    }

    /// Change the row count of an existing table
    pub async fn set_rows(&self, name: &str, rows: u64) {
        if let Some(object) = self.state.write().await.get_mut(ArtifactKind::Table, name) {
            object.rows = rows;
        }
    }

    /// Make every intent on `name` fail
    pub async fn fail_on(&self, name: &str, message: &str) {
        self.failures
            .write()
            .await
            .insert(name.to_uppercase(), FailureMode::Always(message.to_string()));
    }

    /// Make the next `times` intents on `name` fail
    pub async fn fail_times(&self, name: &str, times: usize, message: &str) {
        if times == 0 {
            return;
        }
        self.failures
            .write()
            .await
            .insert(name.to_uppercase(), FailureMode::Times(times, message.to_string()));
    }

    /// Make probes on `name` fail, as if the connection dropped
    pub async fn fail_probe(&self, name: &str, message: &str) {
        self.probe_failures
            .write()
            .await
            .insert(name.to_uppercase(), message.to_string());
    }

    /// Remove all injected failures
    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
        self.probe_failures.write().await.clear();
    }

    /// Successfully applied intents, in order
    pub async fn applied(&self) -> Vec<DdlIntent> {
        self.applied.read().await.clone()
    }

    /// Number of successfully applied intents
    pub async fn ddl_count(&self) -> usize {
        self.applied.read().await.len()
    }

    /// Forget the applied-intent history
    pub async fn clear_applied(&self) {
        self.applied.write().await.clear();
    }

    /// Whether an object exists, without going through the probe
    pub async fn contains(&self, kind: ArtifactKind, name: &str) -> bool {
        self.state.read().await.get(kind, name).is_some()
    }

    async fn check_probe(&self, name: &str) -> Result<(), SqlError> {
        match self.probe_failures.read().await.get(&name.to_uppercase()) {
            Some(message) => Err(SqlError::new(message.clone())),
            None => Ok(()),
        }
    }

    async fn check_injected(&self, name: &str) -> Result<(), SqlError> {
        let mut failures = self.failures.write().await;
        let key = name.to_uppercase();

        let (result, exhausted) = match failures.get_mut(&key) {
            Some(FailureMode::Always(message)) => (Err(SqlError::new(message.clone())), false),
            Some(FailureMode::Times(remaining, message)) => {
                *remaining -= 1;
                (Err(SqlError::new(message.clone())), *remaining == 0)
            }
            None => (Ok(()), false),
        };

        if exhausted {
            failures.remove(&key);
        }
        result
    }

    fn create(state: &mut TargetState, kind: ArtifactKind, name: &str, definition: &Definition) -> Result<(), SqlError> {
        if state.get(kind, name).is_some() {
            return Err(SqlError::new(format!("{} [{}] already exists", kind, name)));
        }

        let schema = definition.schema().map(str::to_string);
        if let Some(schema) = &schema {
            if state.get(ArtifactKind::Schema, schema).is_none() {
                return Err(SqlError::new(format!("schema [{}] does not exist", schema)));
            }
        }

        match definition {
            Definition::Table(table) => {
                for referenced in table.referenced_tables() {
                    if state.get(ArtifactKind::Table, referenced).is_none() {
                        return Err(SqlError::new(format!(
                            "table [{}] references missing table [{}]",
                            name, referenced
                        )));
                    }
                }
            }
            Definition::View(view) => {
                for dependency in &view.dependencies {
                    if state.get(dependency.kind, &dependency.name).is_none() {
                        return Err(SqlError::new(format!(
                            "view [{}] reads from missing {} [{}]",
                            name, dependency.kind, dependency.name
                        )));
                    }
                }
            }
            Definition::Schema(_) | Definition::Job(_) => {}
        }

        state.insert(LiveObject {
            kind,
            name: name.to_string(),
            schema,
            rows: 0,
            definition: Some(definition.clone()),
        });
        Ok(())
    }

    fn alter(state: &mut TargetState, kind: ArtifactKind, name: &str, changes: &[AlterChange], definition: &Definition) -> Result<(), SqlError> {
        let object = state
            .get_mut(kind, name)
            .ok_or_else(|| SqlError::new(format!("{} [{}] does not exist", kind, name)))?;

        if kind != ArtifactKind::Table {
            object.definition = Some(definition.clone());
            return Ok(());
        }

        let mut table = match &object.definition {
            Some(Definition::Table(table)) => table.clone(),
            _ => TableDefinition::new(name, Vec::new()),
        };

        for change in changes {
            match change {
                AlterChange::AddColumn { column } => {
                    if table.find_column(&column.name).is_some() {
                        return Err(SqlError::new(format!("column [{}] already exists", column.name)));
                    }
                    if object.rows > 0 && !column.nullable && column.default_value.is_none() {
                        return Err(SqlError::new(format!(
                            "cannot add NOT NULL column [{}] without default to a non-empty table",
                            column.name
                        )));
                    }
                    table.columns.push(column.clone());
                }
                AlterChange::DropColumn { name: column } => {
                    let before = table.columns.len();
                    table.columns.retain(|c| !c.name.eq_ignore_ascii_case(column));
                    if table.columns.len() == before {
                        return Err(SqlError::new(format!("column [{}] does not exist", column)));
                    }
                }
                AlterChange::AlterColumn { column } => {
                    let existing = table
                        .columns
                        .iter_mut()
                        .find(|c| c.name.eq_ignore_ascii_case(&column.name))
                        .ok_or_else(|| SqlError::new(format!("column [{}] does not exist", column.name)))?;
                    *existing = column.clone();
                }
                AlterChange::AddIndex { index } => table.indexes.push(index.clone()),
                AlterChange::DropIndex { name: index } => table.indexes.retain(|i| &i.name != index),
                AlterChange::AddForeignKey { foreign_key } => {
                    table.constraints.foreign_keys.push(foreign_key.clone())
                }
                AlterChange::DropForeignKey { name: fk } => {
                    table.constraints.foreign_keys.retain(|f| &f.name != fk)
                }
            }
        }

        object.definition = Some(Definition::Table(table));
        Ok(())
    }

    fn drop_object(state: &mut TargetState, kind: ArtifactKind, name: &str) -> Result<(), SqlError> {
        if state.get(kind, name).is_none() {
            return Err(SqlError::new(format!("{} [{}] does not exist", kind, name)));
        }
        if kind == ArtifactKind::Schema && state.contained_in(name) > 0 {
            return Err(SqlError::new(format!("schema [{}] is not empty", name)));
        }
        state.remove(kind, name);
        Ok(())
    }
}

#[async_trait::async_trait]
impl LiveSystem for MockTarget {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn exists(&self, kind: ArtifactKind, name: &str) -> Result<bool, SqlError> {
        self.check_probe(name).await?;
        Ok(self.state.read().await.get(kind, name).is_some())
    }

    async fn row_count(&self, kind: ArtifactKind, name: &str) -> Result<u64, SqlError> {
        self.check_probe(name).await?;
        let state = self.state.read().await;

        match kind {
            ArtifactKind::Table => state
                .get(kind, name)
                .map(|o| o.rows)
                .ok_or_else(|| SqlError::new(format!("table [{}] does not exist", name))),
            ArtifactKind::Schema => Ok(state.contained_in(name) as u64),
            ArtifactKind::View | ArtifactKind::Job => Ok(0),
        }
    }

    async fn describe(&self, name: &str) -> Result<Option<TableDefinition>, SqlError> {
        self.check_probe(name).await?;
        let state = self.state.read().await;

        Ok(state.get(ArtifactKind::Table, name).map(|object| match &object.definition {
            Some(Definition::Table(table)) => table.clone(),
            _ => TableDefinition::new(object.name.clone(), Vec::new()),
        }))
    }

    async fn apply(&self, intent: &DdlIntent) -> Result<(), SqlError> {
        self.check_injected(intent.name()).await?;

        let mut state = self.state.write().await;
        match intent {
            DdlIntent::Create { kind, name, definition } => Self::create(&mut state, *kind, name, definition)?,
            DdlIntent::Alter { kind, name, changes, definition } => {
                Self::alter(&mut state, *kind, name, changes, definition)?
            }
            DdlIntent::Drop { kind, name } => Self::drop_object(&mut state, *kind, name)?,
        }
        drop(state);

        tracing::debug!(intent = %intent, "mock target applied intent");
        self.applied.write().await.push(intent.clone());
        Ok(())
    }
}
