//! Shutdown signalling and run deadlines
//!
//! A [`Shutdown`] owns the trigger; any number of [`ShutdownListener`]s observe
//! it. [`CancelGuard`] combines a listener with an optional deadline and wraps
//! every fetch site so that an interrupted request surfaces as a
//! [`FetchError`], the same condition a transport failure produces.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::errors::{FetchError, FetchResult};

/// Owner side of the shutdown signal
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe a new listener; listeners created after a trigger see it too
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Request shutdown
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Trigger this signal on Ctrl+C or SIGTERM
    ///
    /// Returns a handle to the background task that monitors for signals.
    pub fn install_signal_handler(&self) -> JoinHandle<()> {
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
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
                _ = ctrl_c => info!("Received Ctrl+C, cancelling run"),
                _ = terminate => info!("Received terminate signal, cancelling run"),
            }

            tx.send_replace(true);
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of the shutdown signal
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested; never resolves if the owner is
    /// dropped without triggering
    pub async fn cancelled(&mut self) {
        let triggered = self.rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if !triggered {
            std::future::pending::<()>().await;
        }
    }
}

/// Cancellation and deadline applied to a single fetch site
#[derive(Debug, Clone, Default)]
pub struct CancelGuard {
    listener: Option<ShutdownListener>,
    deadline: Option<Instant>,
}

impl CancelGuard {
    /// A guard that never interrupts anything
    pub fn none() -> Self {
        Self::default()
    }

    /// Attach a shutdown listener
    pub fn with_listener(mut self, listener: ShutdownListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Set the deadline to `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fails immediately if the run is already cancelled or out of time
    pub fn check(&self) -> FetchResult<()> {
        if self.listener.as_ref().is_some_and(|l| l.is_cancelled()) {
            return Err(FetchError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(FetchError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drives `fut` unless cancellation or the deadline wins first
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<FetchError>,
    {
        self.check()?;

        let mut listener = self.listener.clone();
        let cancelled = async move {
            match listener.as_mut() {
                Some(listener) => listener.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(FetchError::Cancelled.into()),
            _ = expired => Err(FetchError::DeadlineExceeded.into()),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_listener_sees_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        assert!(!listener.is_cancelled());

        shutdown.trigger();
        let result = timeout(Duration::from_millis(100), listener.cancelled()).await;
        assert!(result.is_ok());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_late_listener_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.listener().is_cancelled());
    }

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let guard = CancelGuard::none();
        let result: FetchResult<u32> = guard.run(async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_guard_cancels_in_flight_future() {
        let shutdown = Shutdown::new();
        let guard = CancelGuard::none().with_listener(shutdown.listener());

        let trigger = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            shutdown.trigger();
        };
        let pending = guard.run(async {
            std::future::pending::<()>().await;
            Ok::<_, FetchError>(())
        });

        let (_, result) = tokio::join!(trigger, pending);
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guard_deadline() {
        let guard = CancelGuard::none().with_timeout(Duration::from_millis(10));
        let result = guard
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, FetchError>(())
            })
            .await;
        assert!(matches!(result, Err(FetchError::DeadlineExceeded)));
        assert!(matches!(guard.check(), Err(FetchError::DeadlineExceeded)));
    }
}
