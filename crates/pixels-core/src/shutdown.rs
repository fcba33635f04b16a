//! Graceful Shutdown Manager
//!
//! Coordinates shutdown between the hub task and the client sessions.
//!
//! ## Usage
//!
//! ```ignore
//! let shutdown = ShutdownController::new();
//!
//! // The hub and every session get a child token
//! let (hub, _task) = spawn_hub(store, config, shutdown.token());
//!
//! // Trigger shutdown and wait for sessions to drain
//! shutdown.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default shutdown timeout in seconds
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Shutdown phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Hub cancelled, waiting for sessions to finish
    Draining,
    /// Shutdown complete
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shutdown controller for coordinating graceful shutdown
#[derive(Debug)]
pub struct ShutdownController {
    /// Cancellation token for all components
    cancel_token: CancellationToken,
    /// Current shutdown phase
    phase: AtomicU32,
    /// Whether shutdown has been initiated
    shutdown_initiated: AtomicBool,
    /// Live client sessions
    active_sessions: AtomicU32,
    /// Drain timeout
    timeout: Duration,
}

impl ShutdownController {
    /// Create a new shutdown controller with default timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
    }

    /// Create a new shutdown controller with custom timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase: AtomicU32::new(ShutdownPhase::Running as u32),
            shutdown_initiated: AtomicBool::new(false),
            active_sessions: AtomicU32::new(0),
            timeout,
        })
    }

    /// Get a cancellation token for a component
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Get current shutdown phase
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Terminated,
        }
    }

    /// Check if shutdown has been initiated
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Track a client session until the guard is dropped
    pub fn session_guard(self: &Arc<Self>) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            controller: Arc::clone(self),
        }
    }

    /// Number of sessions still running
    #[must_use]
    pub fn active_session_count(&self) -> u32 {
        self.active_sessions.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u32, Ordering::SeqCst);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Initiate graceful shutdown
    ///
    /// Cancels every token handed out, then waits up to the timeout for
    /// sessions to finish.
    pub async fn shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }

        info!("Initiating graceful shutdown...");
        self.set_phase(ShutdownPhase::Draining);
        self.cancel_token.cancel();

        let drain_start = tokio::time::Instant::now();
        let check_interval = Duration::from_millis(50);

        loop {
            let active = self.active_session_count();
            if active == 0 {
                info!("All sessions closed");
                break;
            }

            let elapsed = drain_start.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    active_sessions = active,
                    timeout_secs = self.timeout.as_secs(),
                    "Shutdown timeout exceeded, abandoning sessions"
                );
                break;
            }

            debug!(active_sessions = active, "Waiting for sessions to close...");
            tokio::time::sleep(check_interval).await;
        }

        self.set_phase(ShutdownPhase::Terminated);
        info!("Graceful shutdown complete");
    }
}

/// Guard for one live client session
#[derive(Debug)]
pub struct SessionGuard {
    controller: Arc<ShutdownController>,
}

impl SessionGuard {
    /// Get a child cancellation token
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.controller.token()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.controller.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Create a shutdown signal future that integrates with ShutdownController
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    wait_for_shutdown_signal().await;
    controller.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_phases() {
        let controller = ShutdownController::new();
        assert_eq!(controller.phase(), ShutdownPhase::Running);
        assert!(!controller.is_shutting_down());

        controller.shutdown().await;

        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_session_guard() {
        let controller = ShutdownController::new();
        assert_eq!(controller.active_session_count(), 0);

        {
            let _a = controller.session_guard();
            let _b = controller.session_guard();
            assert_eq!(controller.active_session_count(), 2);
        }

        assert_eq!(controller.active_session_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_propagation() {
        let controller = ShutdownController::new();
        let token = controller.token();
        let guard = controller.session_guard();
        let session_token = guard.token();

        assert!(!token.is_cancelled());

        let task = tokio::spawn(async move {
            session_token.cancelled().await;
            drop(guard);
        });

        controller.shutdown().await;

        assert!(token.is_cancelled());
        assert_eq!(controller.active_session_count(), 0);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout_with_stuck_session() {
        let controller = ShutdownController::with_timeout(Duration::from_millis(200));
        let _stuck = controller.session_guard();

        controller.shutdown().await;

        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
        assert_eq!(controller.active_session_count(), 1);
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let controller = ShutdownController::new();
        let c1 = Arc::clone(&controller);
        let c2 = Arc::clone(&controller);

        let _ = tokio::join!(
            tokio::spawn(async move { c1.shutdown().await }),
            tokio::spawn(async move { c2.shutdown().await }),
        );

        assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    }
}
