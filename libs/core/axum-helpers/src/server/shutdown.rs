use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Which process signal started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGQUIT
    Quit,
    /// Triggered programmatically through [`ShutdownCoordinator::shutdown`]
    Requested,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
            Self::Requested => "requested",
        };
        f.write_str(name)
    }
}

/// Shutdown coordinator that manages graceful application shutdown.
///
/// This handles:
/// - Signal reception (SIGINT, SIGTERM, SIGQUIT)
/// - Broadcasting shutdown to all subsystems
/// - Shutdown state tracking, so only the first trigger counts
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: broadcast::Sender<ShutdownSignal>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    ///
    /// Returns the coordinator and a receiver for shutdown notifications.
    pub fn new() -> (Self, broadcast::Receiver<ShutdownSignal>) {
        let (tx, rx) = broadcast::channel(1);
        let coordinator = Self {
            tx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        };
        (coordinator, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    /// Initiate shutdown and notify all subscribers.
    ///
    /// Returns `false` when shutdown was already underway.
    pub fn shutdown(&self, reason: ShutdownSignal) -> bool {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!(signal = %reason, "Initiating graceful shutdown");
            let _ = self.tx.send(reason);
            true
        } else {
            false
        }
    }

    /// Wait for SIGINT, SIGTERM or SIGQUIT (or a programmatic shutdown) and
    /// return which one arrived.
    pub async fn wait_for_signal(&self) -> ShutdownSignal {
        let mut requested = self.subscribe();
        if self.is_shutting_down() {
            return ShutdownSignal::Requested;
        }

        let received = tokio::select! {
            signal = process_signal() => signal,
            Ok(reason) = requested.recv() => return reason,
        };

        self.shutdown(received);
        received
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new().0
    }
}

async fn process_signal() -> ShutdownSignal {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let unix_signal = |kind: signal::unix::SignalKind, name: &'static str| async move {
        match signal::unix::signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install {} handler: {}", name, e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(signal::unix::SignalKind::terminate(), "SIGTERM");
    #[cfg(unix)]
    let quit = unix_signal(signal::unix::SignalKind::quit(), "SIGQUIT");

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            ShutdownSignal::Interrupt
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
            ShutdownSignal::Terminate
        },
        _ = quit => {
            info!("Received SIGQUIT, initiating graceful shutdown");
            ShutdownSignal::Quit
        },
    }
}
