//! Chassis — a dependency-ordered component lifecycle orchestrator.
//!
//! Declare named components with the resources they need from each other;
//! chassis starts them one at a time in an order consistent with their
//! dependencies, hands each one a projected view of its dependencies'
//! resources, and stops them in exact reverse order. Failure policy is per
//! component (mandatory or ignorable), and running components can request a
//! full restart or report a fatal runtime condition through engine-injected
//! handles.
//!
//! # Quick start
//!
//! ```
//! use chassis::{FnComponent, System};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut system = System::builder()
//!     .add("config", FnComponent::new(|_| async { Ok(json!({ "port": 8080 })) }))
//!     .add("server", FnComponent::new(|ctx| {
//!         let port = ctx.resource("config").and_then(|c| c.get("port")).cloned();
//!         async move { Ok(json!({ "listening": port })) }
//!     }))
//!     .depends_on(["config"])
//!     .build()
//!     .unwrap();
//!
//! let resources = system.start().await.unwrap();
//! assert_eq!(resources["server"]["listening"], 8080);
//! system.stop().await.unwrap();
//! # });
//! ```
//!
//! Everything is process-local and strictly sequential: there is no
//! parallel startup, no lifecycle state persisted across process restarts,
//! and no distributed coordination.

pub mod component;
pub mod dependency;
pub mod error;
pub mod events;
pub mod resources;
pub mod shutdown;
pub mod sort;
pub mod system;

pub use component::{Component, FnComponent, InterruptHandle, RestartHandle, StartContext};
pub use dependency::{dep, Dependency, DependencyRef};
pub use error::{ChassisError, Result};
pub use events::{EventBus, SystemEvent};
pub use resources::{project, Resource, ResourceMap};
pub use shutdown::{bounded_stop, run_until_shutdown, ShutdownConfig};
pub use system::{System, SystemBuilder, SystemState};
