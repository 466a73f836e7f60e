//! Signal handling for graceful shutdown
//!
//! Ctrl+C or SIGTERM is turned into a broadcast that the pipeline listens to.
//! Workers drop their in-flight task when it arrives, which deletes staged
//! copies, frees tier reservations and kills any running scanner.

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Forwards process signals to a shutdown broadcast
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<()>,
}

impl SignalHandler {
    /// Create a new signal handler with the given shutdown broadcaster
    pub fn new(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self { shutdown_tx }
    }

    /// Start listening for Ctrl+C and SIGTERM in a background task
    ///
    /// If a handler cannot be installed that signal is simply not watched.
    pub fn setup(&self) -> JoinHandle<()> {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                match signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C signal received"),
                    Err(e) => {
                        warn!("Failed to install Ctrl+C handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("SIGTERM signal received");
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }

            info!("Stopping after in-flight files are abandoned");
            let _ = shutdown_tx.send(());
        })
    }
}

/// Create a shutdown signal broadcaster
pub fn create_shutdown_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

/// Resolve once shutdown is broadcast
///
/// Never resolves if every sender is dropped without broadcasting.
pub async fn wait_for_shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>) {
    match shutdown_rx.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let (tx, rx) = create_shutdown_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        let result = timeout(Duration::from_millis(500), wait_for_shutdown_signal(rx)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_closed_channel_is_not_a_shutdown() {
        let (tx, rx) = create_shutdown_channel();
        drop(tx);

        let result = timeout(Duration::from_millis(50), wait_for_shutdown_signal(rx)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_signal_handler_setup() {
        let (tx, _rx) = create_shutdown_channel();
        let handle = SignalHandler::new(tx).setup();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
