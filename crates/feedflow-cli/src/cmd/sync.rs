use anyhow::Result;
use feedflow_core::queue::{WorkQueue, spawn_consumer};
use feedflow_core::reconcile::ReconcileOutcome;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::Context;

/// Run one reconciliation through the work queue and wait for it.
pub async fn sync(ctx: &Context) -> Result<()> {
    let reconciler = Arc::new(ctx.reconciler());
    let options = ctx.options.clone();
    let cancel = CancellationToken::new();

    let (queue, receiver) = WorkQueue::with_default_capacity();
    let consumer = spawn_consumer(receiver, cancel.clone());

    let (tx, rx) = oneshot::channel();
    queue
        .enqueue(move |cancel| async move {
            let result = reconciler.reconcile(&options, &cancel).await;
            let _ = tx.send(result);
            Ok(())
        })
        .await?;
    drop(queue);

    let outcome = tokio::select! {
        res = rx => Some(res?),
        _ = tokio::signal::ctrl_c() => None,
    };
    if outcome.is_none() {
        cancel.cancel();
    }
    consumer.await?;
    let Some(outcome) = outcome else {
        anyhow::bail!("interrupted");
    };

    match outcome? {
        ReconcileOutcome::Unchanged => println!("Up to date."),
        ReconcileOutcome::Installed(report) => {
            println!(
                "Installed {} package(s), {} already present.",
                report.installed.len(),
                report.skipped.len()
            );
            for identity in &report.installed {
                println!("  + {identity}");
            }
        }
    }
    Ok(())
}
