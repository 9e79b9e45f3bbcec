//! Long-running updater.
//!
//! Watches a configuration channel and queues one reconciliation run at
//! startup and another after every change. The runs themselves execute on
//! the queue consumer, one at a time.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::options::InstallerOptions;
use crate::queue::{QueueError, WorkQueue};
use crate::reconcile::Reconciler;

#[derive(Debug)]
pub struct UpdaterService {
    queue: WorkQueue,
    reconciler: Arc<Reconciler>,
    listener: Option<JoinHandle<()>>,
}

impl UpdaterService {
    pub fn new(queue: WorkQueue, reconciler: Arc<Reconciler>) -> Self {
        Self {
            queue,
            reconciler,
            listener: None,
        }
    }

    async fn submit(
        queue: &WorkQueue,
        reconciler: &Arc<Reconciler>,
        options: InstallerOptions,
    ) -> Result<(), QueueError> {
        let reconciler = Arc::clone(reconciler);
        queue
            .enqueue(move |cancel| async move {
                reconciler.reconcile(&options, &cancel).await?;
                Ok(())
            })
            .await
    }

    /// Queue the startup run and begin listening for changes.
    pub async fn start(
        &mut self,
        mut options: watch::Receiver<InstallerOptions>,
    ) -> Result<(), QueueError> {
        tracing::info!("Package updater service running.");
        let current = options.borrow_and_update().clone();
        Self::submit(&self.queue, &self.reconciler, current).await?;

        let queue = self.queue.clone();
        let reconciler = Arc::clone(&self.reconciler);
        self.listener = Some(tokio::spawn(async move {
            while options.changed().await.is_ok() {
                let current = options.borrow_and_update().clone();
                tracing::info!("Configuration changed, queueing reconciliation.");
                if let Err(e) = Self::submit(&queue, &reconciler, current).await {
                    tracing::warn!("Cannot queue reconciliation: {e}");
                    break;
                }
            }
        }));
        Ok(())
    }

    /// Stop listening for changes. Runs already queued are left to the consumer.
    pub fn stop(&mut self) {
        tracing::info!("Package updater service is stopping.");
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for UpdaterService {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
