use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use feedflow_core::queue::{WorkQueue, spawn_consumer};
use feedflow_core::service::UpdaterService;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::Context;

/// Reconcile at startup, then after every configuration change, until Ctrl-C.
pub async fn watch(ctx: &Context, interval: u64) -> Result<()> {
    let cancel = CancellationToken::new();
    let (queue, receiver) = WorkQueue::with_default_capacity();
    let consumer = spawn_consumer(receiver, cancel.clone());

    let (tx, rx) = watch::channel(ctx.options.clone());
    let mut service = UpdaterService::new(queue, Arc::new(ctx.reconciler()));
    service.start(rx).await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                match ctx.reload().await {
                    Ok(options) => {
                        tx.send_if_modified(|current| {
                            if *current == options {
                                false
                            } else {
                                *current = options;
                                true
                            }
                        });
                    }
                    Err(e) => tracing::warn!("Ignoring unreadable configuration: {e:#}"),
                }
            }
        }
    }

    service.stop();
    cancel.cancel();
    consumer.await?;
    Ok(())
}
