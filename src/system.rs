//! The orchestration engine.
//!
//! A [`System`] owns a set of named, dependency-annotated components and
//! walks them through their lifecycle:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           System                             │
//! │                                                              │
//! │   Idle ──start──> Starting ──────────> Running               │
//! │    ▲                  │                   │                  │
//! │    │            start failure        stop/interrupt          │
//! │    │                  ▼                   ▼                  │
//! │    └───────────────Stopping <─────────────┘                  │
//! │                                                              │
//! │   start: walk components in dependency order, one at a time  │
//! │   stop:  walk the started subset in exact reverse order      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Startup is strictly sequential: the next component never begins before
//! the previous `start` call has settled, even when the graph would allow
//! independent components to start concurrently. Each component receives a
//! view of the registry projected through its own dependency list, and the
//! value it produces is appended to the registry under its name.
//!
//! A mandatory component failing to start aborts the walk and stops the
//! already-started subset in reverse; an ignorable one is reported and
//! skipped. Stop attempts every started component exactly once regardless of
//! earlier stop failures.
//!
//! # Example
//!
//! ```
//! use chassis::{dep, FnComponent, System};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut system = System::builder()
//!     .add("config", FnComponent::new(|_| async { Ok(json!({ "timeout": 100 })) }))
//!     .add("logger", FnComponent::new(|_| async { Ok(json!({ "level": "info" })) }))
//!     .depends_on(["config"])
//!     .add("app", FnComponent::new(|ctx| {
//!         let timeout = ctx.resource("timeout").cloned();
//!         async move { Ok(json!({ "timeout": timeout })) }
//!     }))
//!     .depends_on([dep("config").aliased("timeout").source("timeout"), dep("logger")])
//!     .build()?;
//!
//! let resources = system.start().await?;
//! assert_eq!(resources["app"]["timeout"], 100);
//! system.stop().await?;
//! # Ok::<(), chassis::ChassisError>(())
//! # }).unwrap();
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::component::{Component, ControlRequest, InterruptHandle, RestartHandle, StartContext};
use crate::dependency::{Dependency, DependencyRef};
use crate::error::{ChassisError, Result};
use crate::events::{EventBus, SystemEvent};
use crate::resources::{project, ResourceMap};
use crate::sort::{dependency_order, GraphNode};

/// Lifecycle state of a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// No component is started; the registry is empty.
    Idle,
    /// The start walk is in progress.
    Starting,
    /// Every component that should run is running.
    Running,
    /// The stop walk is in progress.
    Stopping,
}

/// One managed component with its resolved declaration.
struct ComponentEntry {
    name: String,
    component: Box<dyn Component>,
    dependencies: Vec<Dependency>,
    mandatory: bool,
}

/// Fluent declaration of a [`System`].
///
/// `depends_on` and `ignorable` configure the *open* descriptor — the one
/// most recently passed to [`add`](Self::add). Calling either before any
/// `add` is a declaration error reported by [`build`](Self::build), as is a
/// duplicated name, a reference to an undeclared component, or a dependency
/// cycle. `depends_on` replaces the open descriptor's dependency list; it
/// never merges.
pub struct SystemBuilder {
    slots: Vec<BuilderSlot>,
    event_capacity: Option<usize>,
    error: Option<ChassisError>,
}

struct BuilderSlot {
    name: String,
    component: Box<dyn Component>,
    refs: Vec<DependencyRef>,
    mandatory: bool,
}

impl SystemBuilder {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            event_capacity: None,
            error: None,
        }
    }

    fn fail(&mut self, message: &str) {
        if self.error.is_none() {
            self.error = Some(ChassisError::Validation(message.to_string()));
        }
    }

    /// Declares a component under a unique name and makes it the open
    /// descriptor. Components are mandatory unless
    /// [`ignorable`](Self::ignorable) says otherwise.
    pub fn add(mut self, name: impl Into<String>, component: impl Component + 'static) -> Self {
        self.slots.push(BuilderSlot {
            name: name.into(),
            component: Box::new(component),
            refs: Vec::new(),
            mandatory: true,
        });
        self
    }

    /// Replaces the open descriptor's dependency list.
    pub fn depends_on<I>(mut self, refs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<DependencyRef>,
    {
        match self.slots.last_mut() {
            Some(slot) => slot.refs = refs.into_iter().map(Into::into).collect(),
            None => self.fail("depends_on called before any component was added"),
        }
        self
    }

    /// Marks the open descriptor as ignorable: its startup or runtime
    /// failures are reported but never fatal to the system.
    pub fn ignorable(mut self) -> Self {
        match self.slots.last_mut() {
            Some(slot) => slot.mandatory = false,
            None => self.fail("ignorable called before any component was added"),
        }
        self
    }

    /// Overrides the lifecycle event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Validates the declaration and fixes the start order.
    ///
    /// # Errors
    ///
    /// Any validation error: builder misuse, a malformed dependency
    /// reference, a duplicate name, a dangling reference, or a cycle. A
    /// system that fails to build can never start anything.
    pub fn build(self) -> Result<System> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut entries = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            let dependencies = slot
                .refs
                .into_iter()
                .map(DependencyRef::resolve)
                .collect::<Result<Vec<_>>>()?;
            entries.push(ComponentEntry {
                name: slot.name,
                component: slot.component,
                dependencies,
                mandatory: slot.mandatory,
            });
        }

        let nodes: Vec<GraphNode> = entries
            .iter()
            .map(|entry| GraphNode {
                name: entry.name.clone(),
                depends: entry
                    .dependencies
                    .iter()
                    .map(|dependency| dependency.component.clone())
                    .collect(),
            })
            .collect();
        let order = dependency_order(&nodes)?;

        let mut rank = vec![0usize; entries.len()];
        for (position, &index) in order.iter().enumerate() {
            rank[index] = position;
        }
        let mut ranked: Vec<(usize, ComponentEntry)> = rank.into_iter().zip(entries).collect();
        ranked.sort_by_key(|(position, _)| *position);

        let events = match self.event_capacity {
            Some(capacity) => EventBus::with_capacity(capacity),
            None => EventBus::new(),
        };
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Ok(System {
            components: ranked.into_iter().map(|(_, entry)| entry).collect(),
            resources: ResourceMap::new(),
            started: Vec::new(),
            state: SystemState::Idle,
            events,
            control_tx,
            control_rx,
        })
    }
}

/// A dependency-ordered set of components with a shared lifecycle.
///
/// Built with [`System::builder`]; driven with [`start`](Self::start),
/// [`stop`](Self::stop), [`restart`](Self::restart) and — for systems whose
/// components use their runtime handles — [`run`](Self::run).
pub struct System {
    /// All components, already in start order.
    components: Vec<ComponentEntry>,
    /// The resource registry. Appended during start, discarded on stop.
    resources: ResourceMap,
    /// Indices of started components, in the order they started.
    started: Vec<usize>,
    state: SystemState,
    events: EventBus,
    control_tx: mpsc::UnboundedSender<ControlRequest>,
    control_rx: mpsc::UnboundedReceiver<ControlRequest>,
}

impl System {
    /// Starts declaring a new system.
    pub fn builder() -> SystemBuilder {
        SystemBuilder::new()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Returns `true` while the system is in the `Running` state.
    pub fn is_running(&self) -> bool {
        self.state == SystemState::Running
    }

    /// Component names in the order they start.
    pub fn start_order(&self) -> Vec<&str> {
        self.components
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Subscribes to lifecycle events emitted from this call on.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.events.subscribe()
    }

    /// A restart handle usable from outside the system, e.g. by a
    /// config-file watcher.
    pub fn restart_handle(&self) -> RestartHandle {
        RestartHandle::new(self.control_tx.clone())
    }

    /// Starts every component in dependency order and returns the full
    /// resource registry.
    ///
    /// # Errors
    ///
    /// [`ChassisError::AlreadyRunning`] when the system is not idle, or the
    /// startup error of the first mandatory component that failed — in
    /// which case the already-started subset has been stopped again in
    /// reverse order before this returns.
    pub async fn start(&mut self) -> Result<ResourceMap> {
        if self.state != SystemState::Idle {
            return Err(ChassisError::AlreadyRunning);
        }
        self.state = SystemState::Starting;
        info!(components = self.components.len(), "starting system");
        self.resources = ResourceMap::new();
        self.started.clear();

        for index in 0..self.components.len() {
            let name = self.components[index].name.clone();
            let view = project(&self.resources, &self.components[index].dependencies);
            let ctx = StartContext::new(
                view,
                RestartHandle::new(self.control_tx.clone()),
                InterruptHandle::new(name.clone(), self.control_tx.clone()),
            );
            match self.components[index].component.start(ctx).await {
                Ok(resource) => {
                    self.resources.insert(name.clone(), resource.clone());
                    self.started.push(index);
                    info!(component = %name, "component started");
                    self.events
                        .emit(SystemEvent::ComponentStarted { name, resource });
                }
                Err(cause) => {
                    let failure = ChassisError::Startup {
                        component: name.clone(),
                        cause: Arc::new(cause),
                    };
                    if self.components[index].mandatory {
                        error!(component = %name, %failure, "mandatory component failed to start");
                        self.events.emit(SystemEvent::ComponentStartFailed {
                            name,
                            error: failure.clone(),
                        });
                        self.stop_walk(Some(failure.clone())).await;
                        return Err(failure);
                    }
                    warn!(component = %name, %failure, "ignorable component failed to start");
                    self.events.emit(SystemEvent::ComponentStartFailed {
                        name,
                        error: failure,
                    });
                }
            }
        }

        self.state = SystemState::Running;
        info!("system started");
        self.events.emit(SystemEvent::Started {
            resources: self.resources.clone(),
        });
        Ok(self.resources.clone())
    }

    /// Stops every started component in the exact reverse of the order
    /// they started, then discards the registry.
    ///
    /// Individual stop failures are reported as events and never abort the
    /// walk. Stopping an idle system is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == SystemState::Idle {
            return Ok(());
        }
        self.stop_walk(None).await;
        Ok(())
    }

    /// Stops the system, then starts it again, returning the freshly
    /// produced registry.
    ///
    /// # Errors
    ///
    /// Whatever the inner start returns.
    pub async fn restart(&mut self) -> Result<ResourceMap> {
        info!("restarting system");
        self.stop().await?;
        let resources = self.start().await?;
        info!("system restarted");
        self.events.emit(SystemEvent::Restarted {
            resources: resources.clone(),
        });
        Ok(resources)
    }

    /// Drives restart and interrupt requests from running components.
    ///
    /// Loops while the system is running: a restart request triggers a full
    /// [`restart`](Self::restart); an interrupt from a mandatory component
    /// stops the whole system and ends the loop; an interrupt from an
    /// ignorable component is reported and the loop continues. Returns
    /// immediately when the system is not running.
    ///
    /// # Errors
    ///
    /// The error a mandatory component reported through its interrupt
    /// handle, or a failed restart.
    pub async fn run(&mut self) -> Result<()> {
        while self.state == SystemState::Running {
            let request = match self.control_rx.recv().await {
                Some(request) => request,
                None => break,
            };
            match request {
                ControlRequest::Restart => {
                    self.restart().await?;
                }
                ControlRequest::Interrupt { component, error } => {
                    if let Some(failure) = self.handle_interrupt(component, error).await {
                        return failure;
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies interrupt policy; `Some` means the run loop must end with
    /// the contained result.
    async fn handle_interrupt(
        &mut self,
        component: String,
        error: Option<anyhow::Error>,
    ) -> Option<Result<()>> {
        let currently_started = self
            .started
            .iter()
            .any(|&index| self.components[index].name == component);
        if !currently_started {
            debug!(component = %component, "ignoring interrupt for a component that is not started");
            return None;
        }
        let mandatory = self
            .components
            .iter()
            .find(|entry| entry.name == component)
            .map(|entry| entry.mandatory)
            .unwrap_or(true);
        let failure = error.map(|cause| ChassisError::Runtime {
            component: component.clone(),
            cause: Arc::new(cause),
        });

        if mandatory {
            error!(component = %component, "mandatory component failed at runtime, stopping system");
            self.events.emit(SystemEvent::ComponentRunFailed {
                name: component,
                error: failure.clone(),
            });
            self.stop_walk(failure.clone()).await;
            return Some(match failure {
                Some(error) => Err(error),
                None => Ok(()),
            });
        }

        warn!(component = %component, "ignorable component failed at runtime");
        self.events.emit(SystemEvent::ComponentRunFailed {
            name: component,
            error: failure,
        });
        None
    }

    /// The reverse walk shared by `stop` and the compensating path of
    /// `start`. Every started component gets exactly one stop attempt.
    async fn stop_walk(&mut self, trigger: Option<ChassisError>) {
        self.state = SystemState::Stopping;
        info!(components = self.started.len(), "stopping system");
        while let Some(index) = self.started.pop() {
            let name = self.components[index].name.clone();
            match self.components[index].component.stop().await {
                Ok(()) => {
                    info!(component = %name, "component stopped");
                    self.events.emit(SystemEvent::ComponentStopped { name });
                }
                Err(cause) => {
                    let failure = ChassisError::Shutdown {
                        component: name.clone(),
                        cause: Arc::new(cause),
                    };
                    warn!(component = %name, %failure, "component failed to stop");
                    self.events.emit(SystemEvent::ComponentStopFailed {
                        name,
                        error: failure,
                    });
                }
            }
        }
        self.resources = ResourceMap::new();
        self.state = SystemState::Idle;
        info!("system stopped");
        self.events.emit(SystemEvent::Stopped { error: trigger });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::FnComponent;
    use serde_json::json;

    fn noop(value: serde_json::Value) -> FnComponent {
        FnComponent::new(move |_ctx| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    #[test]
    fn test_depends_on_before_add_fails_build() {
        let result = System::builder().depends_on(["a"]).build();
        assert!(matches!(result, Err(ChassisError::Validation(_))));
    }

    #[test]
    fn test_ignorable_before_add_fails_build() {
        let result = System::builder().ignorable().build();
        assert!(matches!(result, Err(ChassisError::Validation(_))));
    }

    #[test]
    fn test_duplicate_name_fails_build() {
        let result = System::builder()
            .add("a", noop(json!(1)))
            .add("a", noop(json!(2)))
            .build();
        assert!(matches!(result, Err(ChassisError::DuplicateName(_))));
    }

    #[test]
    fn test_empty_dependency_reference_fails_build() {
        let result = System::builder()
            .add("a", noop(json!(1)))
            .depends_on([""])
            .build();
        assert!(matches!(result, Err(ChassisError::Validation(_))));
    }

    #[test]
    fn test_start_order_follows_dependencies() {
        let system = System::builder()
            .add("business", noop(json!(1)))
            .depends_on(["config", "logger"])
            .add("logger", noop(json!(2)))
            .depends_on(["config"])
            .add("config", noop(json!(3)))
            .build()
            .unwrap();
        assert_eq!(system.start_order(), vec!["config", "logger", "business"]);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut system = System::builder().add("a", noop(json!(1))).build().unwrap();
        system.start().await.unwrap();
        assert!(matches!(
            system.start().await,
            Err(ChassisError::AlreadyRunning)
        ));
        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_noop() {
        let mut system = System::builder().add("a", noop(json!(1))).build().unwrap();
        assert!(system.stop().await.is_ok());
        assert_eq!(system.state(), SystemState::Idle);
    }

    #[tokio::test]
    async fn test_empty_system_starts_and_stops() {
        let mut system = System::builder().build().unwrap();
        let resources = system.start().await.unwrap();
        assert!(resources.is_empty());
        assert!(system.is_running());
        system.stop().await.unwrap();
        assert_eq!(system.state(), SystemState::Idle);
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_not_running() {
        let mut system = System::builder().add("a", noop(json!(1))).build().unwrap();
        assert!(system.run().await.is_ok());
    }
}
