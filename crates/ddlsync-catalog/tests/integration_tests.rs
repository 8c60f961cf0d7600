//! Integration tests for the catalog seams
//!
//! These exercise the mock target and the file-backed implementations the
//! way the engine uses them: through the `LiveSystem` and `ArtifactStore`
//! traits only.
//!
//! ```bash
//! cargo test -p ddlsync-catalog --test integration_tests
//! ```

mod fixtures;

use ddlsync_catalog::{
    ArtifactStore, DdlIntent, FileStore, LiveSystem, MockTarget, SnapshotFile,
};
use ddlsync_core::{Artifact, ArtifactKind, Definition, LifecycleState};
use pretty_assertions::assert_eq;

fn create_table(table: ddlsync_core::TableDefinition) -> DdlIntent {
    DdlIntent::Create {
        kind: ArtifactKind::Table,
        name: table.name.clone(),
        definition: Definition::Table(table),
    }
}

// =============================================================================
// Mock Target Tests
// =============================================================================

#[tokio::test]
async fn test_mock_target_through_trait_object() {
    let target: Box<dyn LiveSystem> = Box::new(MockTarget::new());

    assert_eq!(target.name(), "Mock");
    assert!(!target.exists(ArtifactKind::Table, "CUSTOMERS").await.unwrap());
    assert!(target.describe("CUSTOMERS").await.unwrap().is_none());

    target.apply(&create_table(fixtures::customers_table())).await.unwrap();
    assert!(target.exists(ArtifactKind::Table, "CUSTOMERS").await.unwrap());
}

#[tokio::test]
async fn test_mock_target_clones_share_state() {
    let target = MockTarget::new();
    let handle = target.clone();

    target.apply(&create_table(fixtures::customers_table())).await.unwrap();
    handle.set_rows("CUSTOMERS", 12).await;

    assert_eq!(target.row_count(ArtifactKind::Table, "CUSTOMERS").await.unwrap(), 12);
    assert_eq!(handle.applied().await.len(), 1);
}

#[tokio::test]
async fn test_drop_removes_object() {
    let target = MockTarget::new();
    target.add_table(fixtures::customers_table(), 0).await;

    let drop = DdlIntent::Drop { kind: ArtifactKind::Table, name: "CUSTOMERS".to_string() };
    target.apply(&drop).await.unwrap();

    assert!(!target.contains(ArtifactKind::Table, "CUSTOMERS").await);
    assert!(target.apply(&drop).await.is_err());
}

// =============================================================================
// File-backed Tests
// =============================================================================

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let store = FileStore::open(&path).await.unwrap();
    assert_eq!(store.path(), path.as_path());
    let mut artifact = Artifact::new(
        "CUSTOMERS",
        "/customers.table",
        b"{}",
        Definition::Table(fixtures::customers_table()),
    );
    artifact.set_lifecycle(LifecycleState::Created, None);
    let saved = store.save(artifact).await.unwrap();
    assert_eq!(saved.id, Some(1));

    let reopened = FileStore::open(&path).await.unwrap();
    let loaded = reopened.find_by_key("TABLE:/customers.table").await.unwrap().unwrap();
    assert_eq!(loaded, saved);

    reopened.delete(&loaded).await.unwrap();
    let emptied = FileStore::open(&path).await.unwrap();
    assert!(emptied.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_files_are_empty() {
    let dir = tempfile::tempdir().unwrap();

    let store = FileStore::open(dir.path().join("none.json")).await.unwrap();
    assert!(store.all().await.unwrap().is_empty());

    let target = SnapshotFile::new(dir.path().join("none-target.json")).load().await.unwrap();
    assert_eq!(target.snapshot().await.objects.len(), 0);
}

#[tokio::test]
async fn test_snapshot_roundtrip_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = SnapshotFile::new(dir.path().join("target.json"));

    let target = MockTarget::new();
    target.add_table(fixtures::customers_table(), 40).await;
    target.apply(&create_table(fixtures::orders_table())).await.unwrap();
    snapshot.save(&target).await.unwrap();

    let restored = snapshot.load().await.unwrap();
    assert_eq!(restored.row_count(ArtifactKind::Table, "CUSTOMERS").await.unwrap(), 40);
    assert_eq!(
        restored.describe("ORDERS").await.unwrap(),
        Some(fixtures::orders_table())
    );
}

#[tokio::test]
async fn test_corrupt_store_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"[{ broken").unwrap();

    assert!(FileStore::open(&path).await.is_err());
}
