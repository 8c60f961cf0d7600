//! ddlsync engine - reconciliation core
//!
//! This crate implements the reconciliation of declared artifacts against a
//! live target:
//! - Topological depletion (fixed-point retry of a working set)
//! - Per-kind synchronizers and their lifecycle state machine
//! - Table alteration planning
//! - Result recording
//! - Run orchestration (admission, ordering, drop / create / update, cleanup)

pub mod depleter;
pub mod callback;
pub mod alter;
pub mod synchronizer;
pub mod registry;
pub mod loader;
pub mod reconciler;

pub use depleter::{deplete, Depletable, Depletion};
pub use callback::ResultRecorder;
pub use alter::AlterPlan;
pub use synchronizer::{
    complete_lifecycle, Completion, JobSynchronizer, SchemaSynchronizer, SyncContext, SyncError,
    Synchronizer, TableSynchronizer, TopologyWrapper, UpdateStrategy, ViewSynchronizer,
};
pub use registry::SynchronizerRegistry;
pub use loader::{DefinitionLoader, DefinitionSource};
pub use reconciler::Reconciler;
