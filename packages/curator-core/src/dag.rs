//! Startup validation and ordering of stages by their data dependencies.

use crate::change::PayloadSet;
use crate::error::ConfigurationError;
use std::collections::VecDeque;
use tracing::debug;

/// The declared interface of a stage, as far as ordering is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNode {
    pub name: String,
    pub consumes: PayloadSet,
    pub produces: PayloadSet,
}

impl StageNode {
    pub fn new<S: Into<String>>(name: S, consumes: PayloadSet, produces: PayloadSet) -> Self {
        Self {
            name: name.into(),
            consumes,
            produces,
        }
    }
}

/// Validates `nodes` and computes the order in which they run.
///
/// Returns indices into `nodes`. `external` lists payload types that are fed
/// in from outside and need no producing stage.
///
/// Ordering rotates a queue (initially in registration order): the head is
/// placed when everything it consumes is available and no stage still in the
/// queue produces anything it consumes; otherwise it moves to the back. With
/// n stages an acyclic set is placed within n(n+1)/2 rotations, so running
/// past that bound means a cycle or a consumer nobody feeds.
pub fn execution_order(
    nodes: &[StageNode],
    external: PayloadSet,
) -> Result<Vec<usize>, ConfigurationError> {
    for node in nodes {
        if node.consumes.is_empty() {
            return Err(ConfigurationError::NoConsumedTypes {
                stage: node.name.clone(),
            });
        }
        let reserved = node.produces.intersection(PayloadSet::RESERVED);
        if !reserved.is_empty() {
            return Err(ConfigurationError::ReservedTypeProduced {
                stage: node.name.clone(),
                types: reserved,
            });
        }
    }

    let mut available = PayloadSet::RESERVED.union(external);
    let mut queue: VecDeque<usize> = (0..nodes.len()).collect();
    let mut order = Vec::with_capacity(nodes.len());
    let max_iterations = nodes.len() * (nodes.len() + 1) / 2;
    let mut iterations = 0;

    while iterations < max_iterations {
        let Some(index) = queue.pop_front() else {
            break;
        };
        iterations += 1;
        let node = &nodes[index];
        let satisfied = node.consumes.is_subset_of(available);
        let waiting_on_queued = queue
            .iter()
            .any(|other| nodes[*other].produces.intersects(node.consumes));
        if satisfied && !waiting_on_queued {
            debug!("Placing stage '{}' at position {}", node.name, order.len());
            available = available.union(node.produces);
            order.push(index);
        } else {
            queue.push_back(index);
        }
    }

    if queue.is_empty() {
        return Ok(order);
    }
    Err(diagnose(nodes, &queue, external))
}

/// Tells an unsatisfiable consumer apart from a cycle among the unplaced stages.
fn diagnose(nodes: &[StageNode], unplaced: &VecDeque<usize>, external: PayloadSet) -> ConfigurationError {
    let producible = nodes
        .iter()
        .fold(PayloadSet::RESERVED.union(external), |set, node| {
            set.union(node.produces)
        });
    for index in unplaced {
        let missing = nodes[*index].consumes.difference(producible);
        if !missing.is_empty() {
            return ConfigurationError::UnsatisfiedConsumer {
                stage: nodes[*index].name.clone(),
                missing,
            };
        }
    }
    let mut stages: Vec<String> = unplaced.iter().map(|i| nodes[*i].name.clone()).collect();
    stages.sort();
    ConfigurationError::DependencyCycle { stages }
}

/// Human readable plan, e.g. `links → backlink-count`.
pub fn execution_plan<'a, I: IntoIterator<Item = &'a str>>(names: I) -> String {
    names.into_iter().collect::<Vec<_>>().join(" → ")
}
