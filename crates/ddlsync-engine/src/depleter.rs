//! Topological depletion
//!
//! Attempts every item of a working set, keeps the ones that failed, and
//! tries again as long as the previous pass completed at least one item.
//! No order has to be computed up front: an item whose prerequisite is not
//! there yet simply fails and gets another chance once something else has
//! succeeded. Item failures never escape this module; the return value tells
//! which items are stuck.

use std::collections::BTreeMap;
use std::fmt::Display;

use async_trait::async_trait;
use ddlsync_core::Phase;

/// An item that can be attempted for a phase
#[async_trait]
pub trait Depletable: Send {
    /// State shared by all attempts of a depletion
    type Context: Send;

    /// Failure reported by an attempt
    type Error: Display + Send;

    /// Identifier used when recording failures
    fn id(&self) -> String;

    /// Try to complete the item for `phase`
    async fn attempt(&mut self, phase: Phase, ctx: &mut Self::Context) -> Result<(), Self::Error>;
}

/// Result of a depletion
#[derive(Debug)]
pub struct Depletion<T> {
    /// Items that completed, in completion order
    pub completed: Vec<T>,

    /// Items that never completed
    pub unresolved: Vec<T>,

    /// Passes run
    pub passes: usize,

    /// Last failure message per unresolved item id
    pub errors: BTreeMap<String, String>,
}

impl<T> Depletion<T> {
    /// Whether every item completed
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Deplete `items` for `phase`
///
/// Runs at most `max_passes` passes (at least one). Stops early when the
/// working set is empty or a pass completes nothing.
pub async fn deplete<T: Depletable>(
    items: Vec<T>,
    phase: Phase,
    ctx: &mut T::Context,
    max_passes: usize,
) -> Depletion<T> {
    let mut working = items;
    let mut completed = Vec::with_capacity(working.len());
    let mut errors = BTreeMap::new();
    let mut passes = 0;
    let max_passes = max_passes.max(1);

    while !working.is_empty() {
        if passes == max_passes {
            tracing::warn!(
                %phase,
                passes,
                remaining = working.len(),
                "depletion stopped at the pass bound"
            );
            break;
        }
        passes += 1;

        let before = completed.len();
        let mut remaining = Vec::with_capacity(working.len());

        for mut item in std::mem::take(&mut working) {
            match item.attempt(phase, ctx).await {
                Ok(()) => {
                    errors.remove(&item.id());
                    completed.push(item);
                }
                Err(e) => {
                    tracing::debug!(%phase, pass = passes, item = %item.id(), error = %e, "attempt failed");
                    errors.insert(item.id(), e.to_string());
                    remaining.push(item);
                }
            }
        }

        working = remaining;
        let progressed = completed.len() - before;
        tracing::debug!(%phase, pass = passes, progressed, remaining = working.len(), "depletion pass done");

        if progressed == 0 {
            break;
        }
    }

    Depletion {
        completed,
        unresolved: working,
        passes,
        errors,
    }
}
