//! Resource registry types and the per-component resource projection.
//!
//! Every successful `start` produces a [`Resource`]; the engine accumulates
//! them in a [`ResourceMap`] keyed by component name. Before each component
//! starts, [`project`] computes the scoped view it receives: exactly the
//! registry entries it declared as dependencies, renamed through their
//! aliases and optionally narrowed to a `source` sub-field.
//!
//! Projection is strict: registry entries no dependency refers to are not
//! visible to the component. A component sees what it declared, nothing
//! more.

use crate::dependency::Dependency;

/// The value produced by a component's successful start.
///
/// JSON values keep resources introspectable, which is what makes `source`
/// sub-field selection possible. Components that own live handles (sockets,
/// pools, tasks) keep them internally and publish locators or settings as
/// their resource.
pub type Resource = serde_json::Value;

/// Registry mapping component names to their produced resources.
pub type ResourceMap = serde_json::Map<String, Resource>;

/// Projects the registry through a component's dependency list.
///
/// For each registry entry referenced by a dependency, the value is exposed
/// under the dependency's alias. When the dependency declares a `source`
/// field, only that sub-field of the resource is exposed; a missing
/// sub-field (or a resource that is not an object) silently yields no entry
/// rather than an error. Dependencies whose resource is not in the registry
/// are skipped — this is how a failed ignorable dependency appears to its
/// dependents.
///
/// ```
/// use chassis::{dep, project, ResourceMap};
/// use serde_json::json;
///
/// let mut registry = ResourceMap::new();
/// registry.insert("config".into(), json!({ "timeout": 100 }));
/// registry.insert("logger".into(), json!({ "level": "info" }));
///
/// let deps = [dep("config").aliased("cfg").source("timeout").resolve().unwrap()];
/// let view = project(&registry, &deps);
///
/// assert_eq!(view.get("cfg"), Some(&json!(100)));
/// assert_eq!(view.get("logger"), None); // not declared, not visible
/// ```
pub fn project(all: &ResourceMap, dependencies: &[Dependency]) -> ResourceMap {
    let mut view = ResourceMap::new();
    for (name, resource) in all {
        let Some(dependency) = dependencies.iter().find(|d| &d.component == name) else {
            continue;
        };
        match &dependency.source {
            Some(field) => {
                if let Some(inner) = resource.get(field) {
                    view.insert(dependency.alias.clone(), inner.clone());
                }
            }
            None => {
                view.insert(dependency.alias.clone(), resource.clone());
            }
        }
    }
    view
}
