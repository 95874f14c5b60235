//! Dependency references and their normalized form.
//!
//! A component declares what it needs either as a bare name (`"config"`) or
//! as a structured reference that can rename the resource
//! (`dep("config").aliased("cfg")`) or narrow it to a sub-field
//! (`dep("config").source("timeout")`). Both forms normalize into
//! [`Dependency`], the shape the engine and the resource projection work
//! with.

use serde::{Deserialize, Serialize};

use crate::error::{ChassisError, Result};

/// A normalized dependency on another component.
///
/// Produced from a [`DependencyRef`] by [`DependencyRef::resolve`]; the
/// alias always carries a value (it defaults to the referenced component's
/// name) and serializes as `"as"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Name of the referenced component.
    pub component: String,
    /// Key under which the resource is exposed to the dependent.
    #[serde(rename = "as")]
    pub alias: String,
    /// Sub-field to extract from the referenced resource instead of the
    /// whole value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A dependency reference as written at the declaration site.
///
/// Bare names convert via `From<&str>` / `From<String>`; the structured
/// form is built fluently:
///
/// ```
/// use chassis::dep;
///
/// let reference = dep("config").aliased("cfg").source("timeout");
/// let dependency = reference.resolve().unwrap();
/// assert_eq!(dependency.alias, "cfg");
/// assert_eq!(dependency.source.as_deref(), Some("timeout"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    component: String,
    alias: Option<String>,
    source: Option<String>,
}

impl DependencyRef {
    /// Creates a reference to the named component.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            alias: None,
            source: None,
        }
    }

    /// Exposes the resource to the dependent under a different key.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Extracts a sub-field of the referenced resource instead of the whole
    /// value.
    pub fn source(mut self, field: impl Into<String>) -> Self {
        self.source = Some(field.into());
        self
    }

    /// Normalizes this reference into a [`Dependency`].
    ///
    /// The alias defaults to the component name; empty aliases and sources
    /// are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Validation`] when the component name is
    /// empty.
    pub fn resolve(self) -> Result<Dependency> {
        if self.component.is_empty() {
            return Err(ChassisError::Validation(
                "'component' is required on a dependency reference".to_string(),
            ));
        }
        let alias = self
            .alias
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| self.component.clone());
        let source = self.source.filter(|s| !s.is_empty());
        Ok(Dependency {
            component: self.component,
            alias,
            source,
        })
    }
}

impl From<&str> for DependencyRef {
    fn from(component: &str) -> Self {
        DependencyRef::new(component)
    }
}

impl From<String> for DependencyRef {
    fn from(component: String) -> Self {
        DependencyRef::new(component)
    }
}

impl From<Dependency> for DependencyRef {
    fn from(dependency: Dependency) -> Self {
        Self {
            component: dependency.component,
            alias: Some(dependency.alias),
            source: dependency.source,
        }
    }
}

/// Shorthand for [`DependencyRef::new`].
pub fn dep(component: impl Into<String>) -> DependencyRef {
    DependencyRef::new(component)
}
