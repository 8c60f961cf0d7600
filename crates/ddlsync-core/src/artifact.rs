//! Artifact identity, dependencies and lifecycle

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::definition::Definition;

/// Kind of declared structural object
///
/// The declaration order is also the cross-kind reconciliation priority:
/// containers first, then tables, then views, then jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Database schema (container of tables and views)
    Schema,

    /// Table holding rows
    Table,

    /// View over tables or other views
    View,

    /// Scheduled job definition
    Job,
}

impl ArtifactKind {
    /// All kinds in priority order
    pub const ALL: [ArtifactKind; 4] = [Self::Schema, Self::Table, Self::View, Self::Job];

    /// Uppercase tag used in keys (e.g. "TABLE")
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Schema => "SCHEMA",
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Job => "JOB",
        }
    }

    /// Definition file extension for this kind, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Table => "table",
            Self::View => "view",
            Self::Job => "job",
        }
    }

    /// Resolve a kind from a definition file extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(extension))
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown artifact type: {}", s))
    }
}

/// Reference from one artifact to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// Name of the referenced artifact
    pub name: String,

    /// Kind of the referenced artifact
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
}

impl Dependency {
    pub fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Position of an artifact in its create/update/drop life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    New,
    Created,
    Modified,
    Updated,
    Deleted,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Created => "CREATED",
            Self::Modified => "MODIFIED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the object has been applied to the target at some point
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }

    /// Whether a live object under this record may have been put there by
    /// a reconciliation run
    ///
    /// `NEW` and `DELETED` records never own a live object, so withdrawing
    /// them must not touch the target.
    pub fn may_own_live_object(&self) -> bool {
        !matches!(self, Self::New | Self::Deleted)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested reconciliation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Create,
    Update,
    /// Also known as DELETE for tables
    #[serde(alias = "DELETE")]
    Drop,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Drop => "DROP",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared structural object with identity, content and dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Surrogate identity assigned by the artifact store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Name, unique within its kind
    pub name: String,

    /// Artifact kind
    #[serde(rename = "type")]
    pub kind: ArtifactKind,

    /// Where the artifact was declared
    pub location: String,

    /// Stable identity: `KIND:location` or `KIND:location:name`
    pub key: String,

    /// Hex SHA-256 of the raw definition bytes
    pub content_hash: String,

    /// Ordered references to other artifacts
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Current lifecycle state
    pub lifecycle: LifecycleState,

    /// Last recorded error, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Parsed structural definition
    pub definition: Definition,
}

impl Artifact {
    /// Create a self-identifying artifact keyed by its location
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        content: &[u8],
        definition: Definition,
    ) -> Self {
        let location = location.into();
        let kind = definition.kind();
        Self {
            id: None,
            name: name.into(),
            kind,
            key: Self::location_key(kind, &location),
            location,
            content_hash: content_hash(content),
            dependencies: Vec::new(),
            lifecycle: LifecycleState::New,
            error: None,
            definition,
        }
    }

    /// Create an artifact that shares its location with siblings (e.g. a
    /// table declared inside a schema file) and is keyed by name as well
    pub fn contained(
        name: impl Into<String>,
        location: impl Into<String>,
        content: &[u8],
        definition: Definition,
    ) -> Self {
        let mut artifact = Self::new(name, location, content, definition);
        artifact.key = Self::contained_key(artifact.kind, &artifact.location, &artifact.name);
        artifact
    }

    /// Key for a self-identifying artifact
    pub fn location_key(kind: ArtifactKind, location: &str) -> String {
        format!("{}:{}", kind.tag(), location)
    }

    /// Key for an artifact contained in a multi-object definition
    pub fn contained_key(kind: ArtifactKind, location: &str, name: &str) -> String {
        format!("{}:{}:{}", kind.tag(), location, name)
    }

    /// Set dependencies
    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Add a dependency unless an identical one is already present
    pub fn add_dependency(&mut self, dependency: Dependency) {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    /// Move to a new lifecycle state, recording or clearing the error
    pub fn set_lifecycle(&mut self, lifecycle: LifecycleState, error: Option<String>) {
        self.lifecycle = lifecycle;
        self.error = error;
    }
}

/// Content-addressed hash of raw definition bytes
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Definition, ViewDefinition};

    fn view(name: &str) -> Definition {
        Definition::View(ViewDefinition {
            name: name.to_string(),
            schema: None,
            query: "SELECT 1".to_string(),
            dependencies: Vec::new(),
        })
    }

    #[test]
    fn key_format() {
        let artifact = Artifact::new("V1", "/app/v1.view", b"{}", view("V1"));
        assert_eq!(artifact.key, "VIEW:/app/v1.view");

        let contained = Artifact::contained("V1", "/app/main.schema", b"{}", view("V1"));
        assert_eq!(contained.key, "VIEW:/app/main.schema:V1");
    }

    #[test]
    fn hash_is_stable_for_identical_content() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn kind_lookup() {
        assert_eq!(ArtifactKind::from_extension("TABLE"), Some(ArtifactKind::Table));
        assert_eq!(ArtifactKind::from_extension("txt"), None);
        assert_eq!("view".parse::<ArtifactKind>(), Ok(ArtifactKind::View));
        assert!(ArtifactKind::Schema < ArtifactKind::Table);
        assert!(ArtifactKind::Table < ArtifactKind::View);
    }

    #[test]
    fn only_touched_records_own_live_objects() {
        assert!(!LifecycleState::New.may_own_live_object());
        assert!(!LifecycleState::Deleted.may_own_live_object());
        assert!(LifecycleState::Created.may_own_live_object());
        assert!(LifecycleState::Failed.may_own_live_object());
        assert!(!LifecycleState::Failed.is_applied());
    }

    #[test]
    fn phase_accepts_delete_alias() {
        let phase: Phase = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(phase, Phase::Drop);
    }

    #[test]
    fn dependencies_are_not_duplicated() {
        let mut artifact = Artifact::new("V1", "/v1.view", b"", view("V1"));
        artifact.add_dependency(Dependency::new("T1", ArtifactKind::Table));
        artifact.add_dependency(Dependency::new("T1", ArtifactKind::Table));
        assert_eq!(artifact.dependencies.len(), 1);
    }
}
