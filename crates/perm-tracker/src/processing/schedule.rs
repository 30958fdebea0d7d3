use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::refresh::refresh_processing_data;
use super::scrape::ProcessingTimeSource;
use super::store::ProcessingTimeStore;

/// Owned handle for the periodic refresh task.
///
/// Held by the composition root for the lifetime of the process. Each tick
/// runs one refresh; a failed tick is logged and retried only at the next
/// one. Manual refreshes share the same coordinator and store, so a manual
/// and a scheduled run may race; each commit is atomic and the last writer
/// wins.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    pub fn spawn(
        source: Arc<dyn ProcessingTimeSource>,
        store: Arc<dyn ProcessingTimeStore>,
        source_url: String,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick resolves immediately; consume it so the initial
            // refresh lands one full interval after startup
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        info!("starting scheduled processing time refresh");
                        match refresh_processing_data(source.as_ref(), store.as_ref(), &source_url).await {
                            Ok(record) => info!(
                                average_days = record.average_days,
                                data_source = record.data_source.as_str(),
                                "scheduled refresh completed"
                            ),
                            Err(err) => error!(error = %err, "scheduled refresh failed"),
                        }
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Stop the periodic task and wait for it to wind down. An in-flight
    /// refresh runs to completion before the task exits.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            error!(error = %err, "refresh scheduler task panicked");
        }
    }
}
