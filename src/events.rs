//! Lifecycle events and their fan-out.
//!
//! The engine reports every lifecycle transition as a [`SystemEvent`] on a
//! broadcast channel. Subscribers are observers only: delivery never blocks
//! the engine, a slow subscriber loses old events instead of stalling a
//! start or stop walk, and having no subscribers at all is fine.

use tokio::sync::broadcast;

use crate::error::ChassisError;
use crate::resources::{Resource, ResourceMap};

/// Default capacity of the event channel.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A lifecycle event emitted by the orchestration engine.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// The whole system reached `Running`; carries the full registry.
    Started {
        /// Snapshot of the resource registry.
        resources: ResourceMap,
    },
    /// The whole system returned to `Idle`; carries the error that
    /// triggered the stop, if any.
    Stopped {
        /// The failure the stop compensates for, when there is one.
        error: Option<ChassisError>,
    },
    /// A restart completed; carries the freshly produced registry.
    Restarted {
        /// Snapshot of the new resource registry.
        resources: ResourceMap,
    },
    /// A component started and contributed a resource.
    ComponentStarted {
        /// Component name.
        name: String,
        /// The resource the component produced.
        resource: Resource,
    },
    /// A component's `start` failed.
    ComponentStartFailed {
        /// Component name.
        name: String,
        /// The wrapped startup error.
        error: ChassisError,
    },
    /// A component was given its stop attempt.
    ComponentStopped {
        /// Component name.
        name: String,
    },
    /// A component's `stop` failed; the stop walk continued regardless.
    ComponentStopFailed {
        /// Component name.
        name: String,
        /// The wrapped shutdown error.
        error: ChassisError,
    },
    /// A started component reported a fatal runtime condition through its
    /// interrupt handle.
    ComponentRunFailed {
        /// Component name.
        name: String,
        /// The reported error, when one was supplied.
        error: Option<ChassisError>,
    },
}

impl SystemEvent {
    /// Stable kind tag, handy for logging and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            SystemEvent::Started { .. } => "started",
            SystemEvent::Stopped { .. } => "stopped",
            SystemEvent::Restarted { .. } => "restarted",
            SystemEvent::ComponentStarted { .. } => "component.started",
            SystemEvent::ComponentStartFailed { .. } => "component.start_failed",
            SystemEvent::ComponentStopped { .. } => "component.stopped",
            SystemEvent::ComponentStopFailed { .. } => "component.stop_failed",
            SystemEvent::ComponentRunFailed { .. } => "component.run_failed",
        }
    }

    /// The component this event is about, if it is component-scoped.
    pub fn component(&self) -> Option<&str> {
        match self {
            SystemEvent::ComponentStarted { name, .. }
            | SystemEvent::ComponentStartFailed { name, .. }
            | SystemEvent::ComponentStopped { name }
            | SystemEvent::ComponentStopFailed { name, .. }
            | SystemEvent::ComponentRunFailed { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Broadcast fan-out for [`SystemEvent`]s.
pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl EventBus {
    /// Creates an event bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates an event bus buffering up to `capacity` events per
    /// subscriber before old ones are dropped.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    /// Emits an event to all current subscribers. Never blocks; emitting
    /// with no subscribers is a no-op.
    pub fn emit(&self, event: SystemEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(SystemEvent::Stopped { error: None });
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(SystemEvent::ComponentStopped {
            name: "db".into(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "component.stopped");
        assert_eq!(event.component(), Some("db"));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_block_emission() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for i in 0..10 {
            bus.emit(SystemEvent::ComponentStopped {
                name: format!("c{i}"),
            });
        }
        // The oldest events are gone; the subscriber lags instead of the
        // emitter blocking.
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_event_kinds_are_distinct() {
        let started = SystemEvent::Started {
            resources: ResourceMap::new(),
        };
        let restarted = SystemEvent::Restarted {
            resources: ResourceMap::new(),
        };
        assert_ne!(started.kind(), restarted.kind());
        assert_eq!(started.component(), None);
    }
}
