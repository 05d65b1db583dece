//! Periodic flush driver.
//!
//! The batcher owns no timer. A [`FlushTicker`] checks it at a fixed period
//! and flushes once the pending batch has waited the configured time.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::batcher::Batcher;

/// Handle to a running ticker task.
#[derive(Debug)]
pub struct FlushTicker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushTicker {
    /// Start ticking on the current tokio runtime.
    pub fn spawn(batcher: Batcher, period: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => match batcher.flush_if_due() {
                        Ok(Some(report)) => tracing::debug!(?report, "Time threshold flush"),
                        Ok(None) => {}
                        Err(e) => tracing::error!(error = %e, "Time threshold flush failed"),
                    },
                    _ = &mut stopped => break,
                }
            }
        });

        Self { stop, handle }
    }

    /// Stop ticking and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Flush ticker task failed");
        }
    }
}
