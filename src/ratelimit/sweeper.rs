//! Background eviction of idle client state.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::registry::ClientRegistry;
use crate::config::RateLimitingConfig;

/// Periodically sweeps idle clients out of a [`ClientRegistry`].
pub struct ExpirySweeper {
    registry: Arc<ClientRegistry>,
    interval: Duration,
    expiration: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper running every `interval` and evicting clients idle
    /// longer than `expiration`.
    pub fn new(registry: Arc<ClientRegistry>, interval: Duration, expiration: Duration) -> Self {
        Self {
            registry,
            interval,
            expiration,
        }
    }

    /// Create a sweeper from the rate limiting configuration.
    pub fn from_config(registry: Arc<ClientRegistry>, config: &RateLimitingConfig) -> Self {
        Self::new(registry, config.sweep_interval(), config.expiration())
    }

    /// Start the sweep loop on the current tokio runtime.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            expiration_secs = self.expiration.as_secs_f64(),
            "Starting expiry sweeper"
        );

        let task = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; sweeping an empty registry is pointless
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// Run a single sweep, returning the number of evicted clients.
    ///
    /// A panicking sweep is logged and reported as `None`; the loop carries
    /// on at the next tick.
    pub fn sweep_once(&self) -> Option<usize> {
        let now = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.sweep(now, self.expiration)
        }));

        match result {
            Ok(removed) => {
                if removed > 0 {
                    info!(
                        removed = removed,
                        remaining = self.registry.len(),
                        "Evicted idle clients"
                    );
                } else {
                    debug!(remaining = self.registry.len(), "No idle clients to evict");
                }
                Some(removed)
            }
            Err(_) => {
                error!("Client sweep failed, retrying at next interval");
                None
            }
        }
    }
}

/// Handle to a running [`ExpirySweeper`].
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep loop and wait for it to finish.
    pub async fn shutdown(self) {
        // The receiver lives in the task; a send error means it already exited.
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.task.await {
            error!(error = %e, "Expiry sweeper task ended abnormally");
        }
    }

    /// Whether the sweep loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
