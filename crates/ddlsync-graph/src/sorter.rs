//! Dependency-first ordering of an artifact set
//!
//! Depth-first traversal driven by an explicit stack, with three marks per
//! artifact (unvisited / in progress / done). A dependency on an artifact that
//! is in progress closes a cycle. A dependency whose name is not in the input
//! (or names an artifact of another kind) is external: it is reported and
//! assumed to already exist.

use std::collections::{BTreeMap, HashMap};

use ddlsync_core::{Artifact, Dependency};

/// The dependency graph has no valid order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cyclic dependency detected between [{artifact}] and [{dependency}]")]
pub struct CyclicDependencyError {
    /// Artifact whose dependency closed the cycle
    pub artifact: String,

    /// The dependency that was already being visited
    pub dependency: String,
}

/// Result of a successful sort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortResult {
    /// Names in dependency-first order
    pub ordered: Vec<String>,

    /// Referenced names absent from the input, in first-seen order
    pub external: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Sort an artifact map (name -> artifact) dependencies first
///
/// Ordering among mutually independent artifacts follows the map's key order.
pub fn sort(input: &BTreeMap<String, Artifact>) -> Result<SortResult, CyclicDependencyError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(input.len());
    let mut result = SortResult::default();

    for root in input.keys() {
        if marks.contains_key(root.as_str()) {
            continue;
        }

        // (artifact name, index of the next dependency to look at)
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        marks.insert(root.as_str(), Mark::InProgress);

        while let Some(&(node, next)) = stack.last() {
            let dependencies = input
                .get(node)
                .map(|artifact| artifact.dependencies.as_slice())
                .unwrap_or_default();

            let Some(dependency) = dependencies.get(next) else {
                marks.insert(node, Mark::Done);
                result.ordered.push(node.to_string());
                stack.pop();
                continue;
            };

            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }

            match internal_name(input, dependency) {
                Some(name) => match marks.get(name) {
                    Some(Mark::InProgress) => {
                        return Err(CyclicDependencyError {
                            artifact: node.to_string(),
                            dependency: name.to_string(),
                        });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(name, Mark::InProgress);
                        stack.push((name, 0));
                    }
                },
                None => {
                    if !result.external.contains(&dependency.name) {
                        tracing::debug!(
                            artifact = node,
                            dependency = %dependency.name,
                            "dependency is outside the sorted set"
                        );
                        result.external.push(dependency.name.clone());
                    }
                }
            }
        }
    }

    Ok(result)
}

/// The input's own key for a dependency, if it points inside the set
fn internal_name<'a>(
    input: &'a BTreeMap<String, Artifact>,
    dependency: &Dependency,
) -> Option<&'a str> {
    input
        .get_key_value(dependency.name.as_str())
        .filter(|(_, artifact)| artifact.kind == dependency.kind)
        .map(|(name, _)| name.as_str())
}
