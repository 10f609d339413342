//! Shutdown signal forwarding

use std::future::Future;
use tokio::sync::watch;
use tracing::{error, info};

/// Wait for `signal` and request shutdown through `shutdown_tx`.
///
/// If the signal cannot be listened for, shutdown is never requested and the
/// sender is held until every receiver is gone, so receivers keep running
/// instead of observing a closed channel.
pub async fn forward_shutdown_signal<F>(signal: F, shutdown_tx: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            shutdown_tx.closed().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_requests_shutdown() {
        let (tx, mut rx) = watch::channel(false);

        forward_shutdown_signal(async { Ok(()) }, tx).await;

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_error_keeps_running() {
        let (tx, rx) = watch::channel(false);

        let forward = tokio::spawn(forward_shutdown_signal(
            async { Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) },
            tx,
        ));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!*rx.borrow());
        assert!(!rx.has_changed().unwrap());
        assert!(!forward.is_finished());

        drop(rx);
        forward.await.unwrap();
    }
}
