//! Abstract DDL intents
//!
//! The core decides *what* to do to a live object; turning an intent into
//! dialect-specific statements is the executor's business.

use ddlsync_core::{ArtifactKind, ColumnDefinition, Definition, ForeignKey, IndexDefinition};
use serde::{Deserialize, Serialize};

/// One in-place change of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum AlterChange {
    AddColumn { column: ColumnDefinition },
    DropColumn { name: String },
    /// Nullability or default changed, type unchanged
    AlterColumn { column: ColumnDefinition },
    AddIndex { index: IndexDefinition },
    DropIndex { name: String },
    AddForeignKey { foreign_key: ForeignKey },
    DropForeignKey { name: String },
}

impl std::fmt::Display for AlterChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddColumn { column } => write!(f, "add column {}", column.name),
            Self::DropColumn { name } => write!(f, "drop column {}", name),
            Self::AlterColumn { column } => write!(f, "alter column {}", column.name),
            Self::AddIndex { index } => write!(f, "add index {}", index.name),
            Self::DropIndex { name } => write!(f, "drop index {}", name),
            Self::AddForeignKey { foreign_key } => write!(f, "add foreign key {}", foreign_key.name),
            Self::DropForeignKey { name } => write!(f, "drop foreign key {}", name),
        }
    }
}

/// A create, alter or drop request for one live object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum DdlIntent {
    Create {
        kind: ArtifactKind,
        name: String,
        definition: Definition,
    },
    Alter {
        kind: ArtifactKind,
        name: String,
        changes: Vec<AlterChange>,
        /// Desired definition after the change
        definition: Definition,
    },
    Drop {
        kind: ArtifactKind,
        name: String,
    },
}

impl DdlIntent {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Create { kind, .. } | Self::Alter { kind, .. } | Self::Drop { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Create { name, .. } | Self::Alter { name, .. } | Self::Drop { name, .. } => name,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop { .. })
    }

    /// Short verb for logs ("create", "alter", "drop")
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Alter { .. } => "alter",
            Self::Drop { .. } => "drop",
        }
    }
}

impl std::fmt::Display for DdlIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [{}]", self.verb(), self.kind(), self.name())
    }
}
