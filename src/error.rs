//! Error types for chassis.
//!
//! This module defines the error taxonomy used throughout the crate. Uses
//! `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Validation errors are raised before anything starts. Startup and runtime
//! failures are gated by the failing component's `mandatory` flag. Shutdown
//! failures are always reduced to observability events: releasing the rest
//! of the system matters more than any single failed `stop`.

use std::sync::Arc;

use thiserror::Error;

/// The primary error type for chassis operations.
///
/// Component-supplied causes are stored as `Arc<anyhow::Error>` so the enum
/// stays `Clone`; lifecycle events carry errors by value and are fanned out
/// to every subscriber.
#[derive(Error, Debug, Clone)]
pub enum ChassisError {
    /// Malformed dependency reference or builder misuse.
    #[error("validation error: {0}")]
    Validation(String),

    /// A component name was declared more than once.
    #[error("component '{0}' is declared more than once")]
    DuplicateName(String),

    /// A dependency references a component that is not declared.
    #[error("component '{component}' depends on '{dependency}', but '{dependency}' is not declared in the system")]
    UnknownDependency {
        /// The component carrying the dangling reference.
        component: String,
        /// The referenced name that does not exist.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected among components: {}", members.join(", "))]
    DependencyCycle {
        /// Components stuck in (or behind) the cycle, in declaration order.
        members: Vec<String>,
    },

    /// `start` was invoked while the system was not idle.
    #[error("system is already running")]
    AlreadyRunning,

    /// A component's `start` operation failed.
    #[error("component '{component}' failed to start: {cause}")]
    Startup {
        /// Name of the failing component.
        component: String,
        /// The error the component's `start` returned.
        cause: Arc<anyhow::Error>,
    },

    /// A started component reported a fatal runtime condition through its
    /// interrupt handle.
    #[error("component '{component}' failed at runtime: {cause}")]
    Runtime {
        /// Name of the failing component.
        component: String,
        /// The error passed to the interrupt handle.
        cause: Arc<anyhow::Error>,
    },

    /// A component's `stop` operation failed. Never aborts a stop walk.
    #[error("component '{component}' failed to stop: {cause}")]
    Shutdown {
        /// Name of the failing component.
        component: String,
        /// The error the component's `stop` returned.
        cause: Arc<anyhow::Error>,
    },
}

impl ChassisError {
    /// Returns the name of the component this error is about, if any.
    pub fn component(&self) -> Option<&str> {
        match self {
            ChassisError::Startup { component, .. }
            | ChassisError::Runtime { component, .. }
            | ChassisError::Shutdown { component, .. } => Some(component),
            ChassisError::UnknownDependency { component, .. } => Some(component),
            ChassisError::DuplicateName(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the component-supplied cause for startup/runtime/shutdown
    /// failures.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            ChassisError::Startup { cause, .. }
            | ChassisError::Runtime { cause, .. }
            | ChassisError::Shutdown { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Returns `true` for errors raised by graph validation, before any
    /// component was started.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChassisError::Validation(_)
                | ChassisError::DuplicateName(_)
                | ChassisError::UnknownDependency { .. }
                | ChassisError::DependencyCycle { .. }
        )
    }
}

/// A specialized `Result` type for chassis operations.
pub type Result<T> = std::result::Result<T, ChassisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = ChassisError::Validation("'component' is required".to_string());
        assert_eq!(err.to_string(), "validation error: 'component' is required");
    }

    #[test]
    fn test_unknown_dependency_names_both_components() {
        let err = ChassisError::UnknownDependency {
            component: "api".into(),
            dependency: "db".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("api"));
        assert!(msg.contains("db"));
    }

    #[test]
    fn test_cycle_display_lists_members() {
        let err = ChassisError::DependencyCycle {
            members: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle detected among components: a, b"
        );
    }

    #[test]
    fn test_startup_display_includes_cause() {
        let err = ChassisError::Startup {
            component: "db".into(),
            cause: Arc::new(anyhow::anyhow!("connection refused")),
        };
        assert_eq!(
            err.to_string(),
            "component 'db' failed to start: connection refused"
        );
        assert_eq!(err.component(), Some("db"));
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = ChassisError::Runtime {
            component: "worker".into(),
            cause: Arc::new(anyhow::anyhow!("poll loop died")),
        };
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn test_is_validation() {
        assert!(ChassisError::Validation("x".into()).is_validation());
        assert!(ChassisError::DuplicateName("x".into()).is_validation());
        assert!(!ChassisError::AlreadyRunning.is_validation());
        assert!(!ChassisError::Shutdown {
            component: "x".into(),
            cause: Arc::new(anyhow::anyhow!("boom")),
        }
        .is_validation());
    }
}
