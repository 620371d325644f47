//! Graceful shutdown with signal handling

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;
use wikigate_core::{Error, Result};

/// Shutdown trigger shared by the server and the signal handler
///
/// Backed by a [`CancellationToken`]: triggering is idempotent and every
/// clone observes it, including ones created after the fact.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create a new shutdown signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown signal triggered");
        }
        self.token.cancel();
    }

    /// Check if shutdown was triggered
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

/// Stream of process signals
#[async_trait]
pub trait SignalSource: Send {
    /// Wait for the next signal and return its name, or `None` once the
    /// source can no longer deliver signals
    async fn recv(&mut self) -> Option<&'static str>;
}

/// SIGINT and SIGTERM (Ctrl+C off unix)
pub struct OsSignals {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register the signal handlers
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let register = |kind: SignalKind, name: &str| {
                signal(kind).map_err(|e| {
                    Error::Runtime(format!("Failed to set up {name} handler: {e}"))
                })
            };

            Ok(Self {
                sigterm: register(SignalKind::terminate(), "SIGTERM")?,
                sigint: register(SignalKind::interrupt(), "SIGINT")?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }
}

impl fmt::Debug for OsSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsSignals").finish_non_exhaustive()
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                received = self.sigterm.recv() => received.map(|()| "SIGTERM"),
                received = self.sigint.recv() => received.map(|()| "SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            match tokio::signal::ctrl_c().await {
                Ok(()) => Some("Ctrl+C"),
                Err(err) => {
                    tracing::error!(error = %err, "Failed to listen for Ctrl+C");
                    None
                }
            }
        }
    }
}

/// Named signals pushed through a channel
#[async_trait]
impl SignalSource for tokio::sync::mpsc::Receiver<&'static str> {
    async fn recv(&mut self) -> Option<&'static str> {
        tokio::sync::mpsc::Receiver::recv(self).await
    }
}

/// How the signal handler finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// A second signal arrived while the server was still draining
    Forced,
    /// The signal source closed
    Closed,
}

/// Signal handler for OS signals
///
/// The first signal triggers a graceful shutdown. A second one means the
/// operator is done waiting; the caller should exit immediately.
#[derive(Debug)]
pub struct SignalHandler<S = OsSignals> {
    source: S,
    signal: ShutdownSignal,
}

impl<S: SignalSource> SignalHandler<S> {
    /// Create a new signal handler
    pub fn new(source: S, signal: ShutdownSignal) -> Self {
        Self { source, signal }
    }

    /// Listen for signals until a second one arrives or the source closes
    pub async fn run(mut self) -> SignalOutcome {
        let Some(first) = self.source.recv().await else {
            return SignalOutcome::Closed;
        };
        tracing::info!(signal = first, "Received signal, shutting down gracefully");
        self.signal.trigger();

        match self.source.recv().await {
            Some(second) => {
                tracing::warn!(signal = second, "Received second signal, forcing exit");
                SignalOutcome::Forced
            }
            None => SignalOutcome::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_shutdown_signal_new() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn test_shutdown_signal_clones_observe_trigger() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();

        let waiter = tokio::spawn(async move { observer.triggered().await });
        signal.trigger();
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_triggered());
        assert!(signal.clone().is_triggered());
    }

    #[tokio::test]
    async fn test_first_signal_triggers_shutdown() {
        let (tx, rx) = mpsc::channel(2);
        let signal = ShutdownSignal::new();
        let handler = tokio::spawn(SignalHandler::new(rx, signal.clone()).run());

        tx.send("SIGTERM").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), signal.triggered())
            .await
            .unwrap();

        drop(tx);
        assert_eq!(handler.await.unwrap(), SignalOutcome::Closed);
    }

    #[tokio::test]
    async fn test_second_signal_forces_exit() {
        let (tx, rx) = mpsc::channel(2);
        let signal = ShutdownSignal::new();

        tx.send("SIGINT").await.unwrap();
        tx.send("SIGINT").await.unwrap();

        let outcome = SignalHandler::new(rx, signal.clone()).run().await;
        assert_eq!(outcome, SignalOutcome::Forced);
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_closed_source_does_not_trigger() {
        let (tx, rx) = mpsc::channel::<&'static str>(1);
        drop(tx);

        let signal = ShutdownSignal::new();
        let outcome = SignalHandler::new(rx, signal.clone()).run().await;
        assert_eq!(outcome, SignalOutcome::Closed);
        assert!(!signal.is_triggered());
    }
}
