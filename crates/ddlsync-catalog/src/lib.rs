//! Collaborator seams of the reconciliation core
//!
//! The core never talks to a database or a metadata repository directly.
//! It goes through two traits defined here:
//! - [`LiveSystem`]: existence / row-count / shape probes and an executor for
//!   abstract create / alter / drop intents
//! - [`ArtifactStore`]: durable artifact records keyed by artifact key
//!
//! ## Implementations
//!
//! - [`MockTarget`] / [`MemoryStore`]: in-memory doubles for tests
//! - [`SnapshotFile`] / [`FileStore`]: the same, persisted as JSON files
//!
//! ## Example
//!
//! ```rust,ignore
//! use ddlsync_catalog::{LiveSystem, MockTarget};
//! use ddlsync_core::ArtifactKind;
//!
//! let target = MockTarget::new();
//! target.add_table(table_definition, 10).await;
//! assert!(target.exists(ArtifactKind::Table, "ORDERS").await?);
//! ```

pub mod intent;
pub mod target;
pub mod store;
pub mod mock;
pub mod file;

pub use intent::{AlterChange, DdlIntent};
pub use target::{LiveSystem, SqlError};
pub use store::{ArtifactStore, MemoryStore, StoreError};
pub use mock::{LiveObject, MockTarget, TargetState};
pub use file::{FileStore, SnapshotFile};
