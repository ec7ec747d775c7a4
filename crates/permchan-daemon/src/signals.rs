//! Operator signals: SIGHUP for rehash, Ctrl+C for shutdown.

use tracing::error;

/// A SIGHUP listener. Never fires on platforms without Unix signals, or
/// if the handler could not be installed.
pub struct Hangup {
    /// The installed signal stream.
    #[cfg(unix)]
    inner: Option<tokio::signal::unix::Signal>,
}

impl Hangup {
    /// Install the SIGHUP handler.
    pub fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::hangup()) {
                Ok(inner) => Self { inner: Some(inner) },
                Err(err) => {
                    error!(error = %err, "unable to install SIGHUP handler");
                    Self { inner: None }
                }
            }
        }

        #[cfg(not(unix))]
        Self {}
    }

    /// Wait for the next SIGHUP.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(inner) = self.inner.as_mut()
            && inner.recv().await.is_some()
        {
            return;
        }
        std::future::pending::<()>().await;
    }
}

/// Wait for Ctrl+C. Never returns if the handler could not be installed.
pub async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "unable to install Ctrl+C signal handler");
        std::future::pending::<()>().await;
    }
}
