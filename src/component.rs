//! The component contract and the handles the engine injects at start.
//!
//! A component is a named unit with an async `start` and an optional async
//! `stop`. At start time it receives a [`StartContext`]: the projected view
//! of its dependencies' resources plus two cloneable handles wired back to
//! the engine — [`RestartHandle`] to request a full system restart and
//! [`InterruptHandle`] to report a fatal runtime condition after its own
//! start already succeeded.
//!
//! # Implementing a Component
//!
//! ```
//! use async_trait::async_trait;
//! use chassis::{Component, Resource, StartContext};
//! use serde_json::json;
//!
//! struct HttpServer {
//!     port: u16,
//! }
//!
//! #[async_trait]
//! impl Component for HttpServer {
//!     async fn start(&mut self, ctx: StartContext) -> anyhow::Result<Resource> {
//!         let timeout = ctx.resource("config").and_then(|c| c.get("timeout")).cloned();
//!         // Bind listeners, spawn tasks...
//!         Ok(json!({ "port": self.port, "timeout": timeout }))
//!     }
//!
//!     async fn stop(&mut self) -> anyhow::Result<()> {
//!         // Drain connections, abort tasks...
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Small or throwaway components can skip the trait impl and be built from
//! closures with [`FnComponent`].

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;

use crate::resources::{Resource, ResourceMap};

/// A request sent from a handle back to the engine's control channel.
#[derive(Debug)]
pub(crate) enum ControlRequest {
    /// Stop the whole system, then start it again.
    Restart,
    /// A started component reports a fatal runtime condition.
    Interrupt {
        component: String,
        error: Option<anyhow::Error>,
    },
}

/// The interface every managed component implements.
///
/// `start` runs with the component's projected resource view and must
/// produce the component's own resource; `stop` releases whatever `start`
/// acquired and defaults to a no-op for components with nothing to release.
/// The engine invokes both strictly sequentially and always awaits their
/// natural completion.
#[async_trait]
pub trait Component: Send + Sync {
    /// Starts the component and produces its resource.
    ///
    /// # Errors
    ///
    /// A returned error fails the start; whether that is fatal to the whole
    /// system depends on the component's `mandatory` flag.
    async fn start(&mut self, ctx: StartContext) -> anyhow::Result<Resource>;

    /// Stops the component, releasing its resources.
    ///
    /// # Errors
    ///
    /// A returned error is reported as an event and never aborts the stop
    /// walk.
    async fn stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a component receives when it is started.
#[derive(Debug)]
pub struct StartContext {
    resources: ResourceMap,
    restart: RestartHandle,
    interrupt: InterruptHandle,
}

impl StartContext {
    pub(crate) fn new(
        resources: ResourceMap,
        restart: RestartHandle,
        interrupt: InterruptHandle,
    ) -> Self {
        Self {
            resources,
            restart,
            interrupt,
        }
    }

    /// The projected resource view: dependencies only, keyed by alias.
    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    /// Looks up a single projected resource by its exposure key.
    pub fn resource(&self, key: &str) -> Option<&Resource> {
        self.resources.get(key)
    }

    /// A handle for requesting a full system restart later on.
    pub fn restart_handle(&self) -> RestartHandle {
        self.restart.clone()
    }

    /// A handle for reporting a fatal runtime condition later on.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Consumes the context, keeping only the resource view.
    pub fn into_resources(self) -> ResourceMap {
        self.resources
    }
}

/// Requests a full stop-then-start of the whole system.
///
/// Fire and forget: the request is queued on the engine's control channel
/// and acted on by [`System::run`](crate::System::run). Safe to invoke from
/// spawned tasks.
#[derive(Debug, Clone)]
pub struct RestartHandle {
    tx: mpsc::UnboundedSender<ControlRequest>,
}

impl RestartHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ControlRequest>) -> Self {
        Self { tx }
    }

    /// Requests the restart. Never blocks.
    pub fn restart(&self) {
        let _ = self.tx.send(ControlRequest::Restart);
    }
}

/// Reports a fatal runtime condition in a started component.
///
/// This is distinct from a startup failure: the component's own `start`
/// already succeeded. Whether the report stops the whole system depends on
/// the component's `mandatory` flag.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    component: String,
    tx: mpsc::UnboundedSender<ControlRequest>,
}

impl InterruptHandle {
    pub(crate) fn new(component: String, tx: mpsc::UnboundedSender<ControlRequest>) -> Self {
        Self { component, tx }
    }

    /// Reports the condition, with an optional underlying error. Never
    /// blocks.
    pub fn interrupt(&self, error: Option<anyhow::Error>) {
        let _ = self.tx.send(ControlRequest::Interrupt {
            component: self.component.clone(),
            error,
        });
    }
}

type StartFn =
    Box<dyn FnMut(StartContext) -> BoxFuture<'static, anyhow::Result<Resource>> + Send + Sync>;
type StopFn = Box<dyn FnMut() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A [`Component`] built from closures.
///
/// Mirrors how ad-hoc components are declared inline at system assembly:
///
/// ```
/// use chassis::FnComponent;
/// use serde_json::json;
///
/// let component = FnComponent::new(|_ctx| async { Ok(json!({ "timeout": 100 })) })
///     .with_stop(|| async { Ok(()) });
/// # let _ = component;
/// ```
pub struct FnComponent {
    start: StartFn,
    stop: Option<StopFn>,
}

impl FnComponent {
    /// Creates a component from a start closure; `stop` defaults to a
    /// no-op.
    pub fn new<F, Fut>(mut start: F) -> Self
    where
        F: FnMut(StartContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resource>> + Send + 'static,
    {
        Self {
            start: Box::new(move |ctx| -> BoxFuture<'static, anyhow::Result<Resource>> {
                Box::pin(start(ctx))
            }),
            stop: None,
        }
    }

    /// Attaches a stop closure.
    pub fn with_stop<F, Fut>(mut self, mut stop: F) -> Self
    where
        F: FnMut() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.stop = Some(Box::new(
            move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(stop()) },
        ));
        self
    }
}

#[async_trait]
impl Component for FnComponent {
    async fn start(&mut self, ctx: StartContext) -> anyhow::Result<Resource> {
        (self.start)(ctx).await
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        match &mut self.stop {
            Some(stop) => stop().await,
            None => Ok(()),
        }
    }
}
