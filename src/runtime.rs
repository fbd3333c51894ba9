//! Control loop.
//!
//! [`BridgeRuntime::run`] ticks at a fixed interval and hands each tick to
//! [`BridgeOperations::housekeeping`]. The host stops it through a
//! [`ShutdownHandle`]; on the way out the bridge closes every channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::bridge::BridgeOperations;

/// Cloneable stop signal for a [`BridgeRuntime`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives a bridge until shutdown.
pub struct BridgeRuntime<B: BridgeOperations> {
    bridge: Arc<B>,
    tick: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl<B: BridgeOperations> BridgeRuntime<B> {
    /// A zero `tick` is raised to one millisecond.
    pub fn new(bridge: Arc<B>, tick: Duration) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            bridge,
            tick: tick.max(Duration::from_millis(1)),
            shutdown_tx: Arc::new(tx),
        }
    }

    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Tick until shutdown is requested, then shut the bridge down.
    ///
    /// Returns at once if shutdown was requested before the call.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_ms = self.tick.as_millis() as u64, "Bridge runtime started");
        let mut ticks: u64 = 0;

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                _ = ticker.tick() => {
                    ticks += 1;
                    self.bridge.housekeeping().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(ticks, "Bridge runtime stopping");
        self.bridge.shutdown().await;
        info!("Bridge runtime stopped");
    }
}
