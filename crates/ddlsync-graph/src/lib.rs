//! Artifact dependency graphs and ordering
//!
//! This crate handles:
//! - Topological sorting of an artifact set with cycle detection
//! - Passing through dependencies on artifacts outside the set
//! - Forward and reverse dependency queries (upstream / downstream)

pub mod dag;
pub mod sorter;

pub use dag::{DependencyGraph, NodeId};
pub use sorter::{sort, CyclicDependencyError, SortResult};
