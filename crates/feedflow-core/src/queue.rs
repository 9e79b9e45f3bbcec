//! Serialized background work.
//!
//! Reconciliation runs are queued rather than run directly so that at most
//! one of them touches a target directory at a time. Producers enqueue and
//! return; a single consumer task drains the queue in order.

use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default bound on queued work items.
pub const DEFAULT_QUEUE_CAPACITY: usize = 15;

/// A unit of queued work. It receives the consumer's cancellation token.
pub struct WorkItem(Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send>);

impl WorkItem {
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Box::new(move |cancel| work(cancel).boxed()))
    }

    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        (self.0)(cancel).await
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem").finish_non_exhaustive()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("Work queue is full")]
    Full,

    #[error("Work queue is closed")]
    Closed,

    #[error("Operation cancelled")]
    Cancelled,
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct WorkQueue {
    sender: mpsc::Sender<WorkItem>,
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("capacity", &self.sender.max_capacity())
            .finish_non_exhaustive()
    }
}

/// Consumer half of a [`WorkQueue`].
#[derive(Debug)]
pub struct WorkReceiver {
    receiver: mpsc::Receiver<WorkItem>,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` pending items.
    pub fn new(capacity: usize) -> (Self, WorkReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, WorkReceiver { receiver })
    }

    pub fn with_default_capacity() -> (Self, WorkReceiver) {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }

    /// Queue `work`, waiting for space if the queue is full.
    pub async fn enqueue<F, Fut>(&self, work: F) -> Result<(), QueueError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.sender
            .send(WorkItem::new(work))
            .await
            .map_err(|_| QueueError::Closed)
    }

    /// Queue `work` without waiting; fails with [`QueueError::Full`] instead.
    pub fn try_enqueue<F, Fut>(&self, work: F) -> Result<(), QueueError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.sender
            .try_send(WorkItem::new(work))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })
    }
}

impl WorkReceiver {
    /// Wait for the next item, in enqueue order.
    pub async fn dequeue(&mut self, cancel: &CancellationToken) -> Result<WorkItem, QueueError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(QueueError::Cancelled),
            item = self.receiver.recv() => item.ok_or(QueueError::Closed),
        }
    }
}

/// Drain `receiver` on a background task until `cancel` fires or every
/// producer is gone. Failed items are logged and do not stop the loop.
pub fn spawn_consumer(mut receiver: WorkReceiver, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Work queue consumer started");
        loop {
            let item = match receiver.dequeue(&cancel).await {
                Ok(item) => item,
                Err(QueueError::Cancelled) => break,
                Err(e) => {
                    tracing::debug!("Work queue consumer stopping: {e}");
                    break;
                }
            };

            if let Err(e) = item.run(cancel.clone()).await {
                tracing::error!("Error occurred executing work item: {e:#}");
            }
        }
        tracing::debug!("Work queue consumer stopped");
    })
}
