#![forbid(unsafe_code)]

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shutdown signal handlers, installed before any work starts so a failure
/// to install them is reported at startup.
#[cfg(unix)]
pub struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for SIGINT or SIGTERM, then cancel `token`.
    pub async fn cancel_on_signal(mut self, token: CancellationToken) {
        tokio::select! {
            _ = self.interrupt.recv() => info!(signal = "SIGINT", "received shutdown signal"),
            _ = self.terminate.recv() => info!(signal = "SIGTERM", "received shutdown signal"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Wait for Ctrl-C, then cancel `token`.
    pub async fn cancel_on_signal(self, token: CancellationToken) {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    tracing::error!(%err, "failed to listen for Ctrl-C");
                    return;
                }
                info!("received shutdown signal");
            }
            _ = token.cancelled() => return,
        }
        token.cancel();
    }
}
