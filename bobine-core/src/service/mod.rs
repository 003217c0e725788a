pub mod alerts;
pub mod monitor;
pub mod notify;
pub mod rollup;

pub use alerts::AlertEvaluator;
pub use monitor::{MetricsCollector, TranscodeMonitor};
pub use notify::{NotificationSender, WebhookSender};
pub use rollup::RollupScheduler;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running background loop.
///
/// Dropping the handle leaves the loop running; call [`LoopHandle::stop`]
/// to signal it and wait for the final tick to finish.
pub struct LoopHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LoopHandle {
    #[must_use]
    pub fn new(stop_tx: watch::Sender<bool>, handle: JoinHandle<()>) -> Self {
        Self { stop_tx, handle }
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("background loop panicked during shutdown: {}", e);
        }
    }
}
