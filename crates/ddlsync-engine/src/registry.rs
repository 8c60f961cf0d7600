//! Type-indexed synchronizer registry

use std::collections::BTreeMap;
use std::sync::Arc;

use ddlsync_core::ArtifactKind;

use crate::synchronizer::{
    JobSynchronizer, SchemaSynchronizer, Synchronizer, TableSynchronizer, ViewSynchronizer,
};

/// Synchronizers keyed by the artifact kind they handle
#[derive(Clone, Default)]
pub struct SynchronizerRegistry {
    synchronizers: BTreeMap<ArtifactKind, Arc<dyn Synchronizer>>,
}

impl SynchronizerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the schema, table, view and job synchronizers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SchemaSynchronizer));
        registry.register(Arc::new(TableSynchronizer));
        registry.register(Arc::new(ViewSynchronizer));
        registry.register(Arc::new(JobSynchronizer));
        registry
    }

    /// Register a synchronizer, replacing any previous one for its kind
    pub fn register(&mut self, synchronizer: Arc<dyn Synchronizer>) {
        self.synchronizers.insert(synchronizer.kind(), synchronizer);
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Arc<dyn Synchronizer>> {
        self.synchronizers.get(&kind)
    }

    /// Synchronizer handling definition files with this extension
    pub fn by_extension(&self, extension: &str) -> Option<&Arc<dyn Synchronizer>> {
        self.synchronizers
            .values()
            .find(|s| s.file_extension().eq_ignore_ascii_case(extension))
    }

    /// Registered synchronizers, lowest priority value first
    pub fn in_priority(&self) -> Vec<Arc<dyn Synchronizer>> {
        let mut synchronizers: Vec<_> = self.synchronizers.values().cloned().collect();
        synchronizers.sort_by_key(|s| s.priority());
        synchronizers
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }
}

impl std::fmt::Debug for SynchronizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.synchronizers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priorities() {
        let registry = SynchronizerRegistry::with_defaults();

        let order: Vec<(ArtifactKind, u32)> = registry
            .in_priority()
            .iter()
            .map(|s| (s.kind(), s.priority()))
            .collect();
        assert_eq!(
            order,
            vec![
                (ArtifactKind::Schema, 10),
                (ArtifactKind::Table, 20),
                (ArtifactKind::View, 30),
                (ArtifactKind::Job, 40),
            ]
        );
    }

    #[test]
    fn lookup_by_extension() {
        let registry = SynchronizerRegistry::with_defaults();

        assert_eq!(registry.by_extension("TABLE").map(|s| s.kind()), Some(ArtifactKind::Table));
        assert!(registry.by_extension("txt").is_none());
        assert!(registry.get(ArtifactKind::Job).is_some_and(|s| s.is_accepted(ArtifactKind::Job)));
    }
}
