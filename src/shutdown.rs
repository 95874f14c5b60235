//! Termination adapter: OS signals to a bounded, graceful stop.
//!
//! [`run_until_shutdown`] is the outermost piece of a chassis-managed
//! process: it drives the system's control loop, listens for termination
//! signals (Ctrl-C everywhere, SIGTERM on Unix), performs a stop bounded by
//! the configured timeout, and hands back the process exit code. Calling
//! `process::exit` — or not — stays with the caller; the orchestration core
//! never touches process lifecycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::system::{System, SystemState};

/// Default bound on how long a graceful stop may take.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;

/// Policy knobs for process termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long a graceful stop may run before the forced path is taken.
    pub stop_timeout_ms: u64,
    /// Whether an unrecovered error maps to a nonzero exit code.
    pub exit_on_error: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            exit_on_error: true,
        }
    }
}

impl ShutdownConfig {
    /// The stop bound as a [`Duration`].
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Drives `system` until it stops or the process is asked to terminate,
/// then returns the exit code.
///
/// Runs [`System::run`] and the signal listener concurrently. When a signal
/// arrives first, a [`bounded_stop`] brings the system down. The exit code
/// is `0` for a clean stop and `1` when an unrecovered error triggered the
/// stop and `config.exit_on_error` is set.
pub async fn run_until_shutdown(system: &mut System, config: &ShutdownConfig) -> i32 {
    let outcome = tokio::select! {
        outcome = system.run() => outcome,
        _ = termination_signal() => {
            info!("received termination signal");
            Ok(())
        }
    };
    let failure = outcome.err();

    if system.state() != SystemState::Idle {
        bounded_stop(system, config).await;
    }

    match failure {
        Some(failure) if config.exit_on_error => {
            error!(%failure, "terminating after unrecovered error");
            1
        }
        Some(failure) => {
            warn!(%failure, "unrecovered error, exiting clean by policy");
            0
        }
        None => 0,
    }
}

/// Stops the system, bounded by the configured timeout.
///
/// Returns `true` when the graceful stop completed in time; `false` when
/// the bound expired and the forced path abandoned the in-flight stop walk.
/// This timeout is the one place the crate gives up on awaiting a
/// component's natural completion.
pub async fn bounded_stop(system: &mut System, config: &ShutdownConfig) -> bool {
    match tokio::time::timeout(config.stop_timeout(), system.stop()).await {
        Ok(_) => true,
        Err(_) => {
            warn!(
                timeout_ms = config.stop_timeout_ms,
                "stop did not complete within timeout, forcing termination"
            );
            false
        }
    }
}

async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let ctrl_c = tokio::signal::ctrl_c();
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
