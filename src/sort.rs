//! Dependency-order computation.
//!
//! The engine hands the full component list to [`dependency_order`] and gets
//! back a start order, or an error for dangling references, duplicate names,
//! or cycles. Nothing else in the crate inspects the graph.

use std::collections::HashMap;

use crate::error::{ChassisError, Result};

/// One node of the dependency graph: a component name plus the names it
/// depends on, both in declaration order.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Component name.
    pub name: String,
    /// Names of the components this one depends on.
    pub depends: Vec<String>,
}

/// Computes a start order for `nodes` as indices into the input slice.
///
/// The order places every component after all of its dependencies; when
/// several components are startable, the one declared first goes first, so
/// the result is fully deterministic.
///
/// # Errors
///
/// - [`ChassisError::DuplicateName`] when a name is declared twice.
/// - [`ChassisError::UnknownDependency`] when a dependency references an
///   undeclared component; the message names both sides.
/// - [`ChassisError::DependencyCycle`] when no valid order exists; the
///   error lists every component left unplaceable.
pub fn dependency_order(nodes: &[GraphNode]) -> Result<Vec<usize>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.name.as_str(), i).is_some() {
            return Err(ChassisError::DuplicateName(node.name.clone()));
        }
    }
    for node in nodes {
        for depend in &node.depends {
            if !index.contains_key(depend.as_str()) {
                return Err(ChassisError::UnknownDependency {
                    component: node.name.clone(),
                    dependency: depend.clone(),
                });
            }
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut placed = vec![false; nodes.len()];
    while order.len() < nodes.len() {
        // Earliest-declared node whose dependencies are all placed.
        let next = nodes.iter().enumerate().position(|(i, node)| {
            !placed[i]
                && node
                    .depends
                    .iter()
                    .all(|depend| placed[index[depend.as_str()]])
        });
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let members = nodes
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !placed[*i])
                    .map(|(_, node)| node.name.clone())
                    .collect();
                return Err(ChassisError::DependencyCycle { members });
            }
        }
    }
    Ok(order)
}
