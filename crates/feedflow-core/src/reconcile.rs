//! Fingerprint-gated reconciliation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::FlowError;
use crate::fingerprint::{Fingerprint, FingerprintStore};
use crate::install::InstallReport;
use crate::installer::PackageInstaller;
use crate::options::InstallerOptions;

/// Invoked after a run that wrote new files.
pub type CompletionCallback =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    Reconciling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The stored fingerprint matched; nothing was touched.
    Unchanged,
    Installed(InstallReport),
}

impl ReconcileOutcome {
    pub fn new_content(&self) -> bool {
        matches!(self, Self::Installed(report) if report.new_content)
    }
}

/// Resets the published state when a run ends, however it ends.
struct StateGuard<'a>(&'a watch::Sender<ReconcileState>);

impl<'a> StateGuard<'a> {
    fn enter(state: &'a watch::Sender<ReconcileState>) -> Self {
        state.send_replace(ReconcileState::Reconciling);
        Self(state)
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(ReconcileState::Idle);
    }
}

/// Brings a target directory in line with a set of options.
pub struct Reconciler {
    installer: PackageInstaller,
    store: Arc<dyn FingerprintStore>,
    on_installed: Option<CompletionCallback>,
    state: watch::Sender<ReconcileState>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("installer", &self.installer)
            .field("state", &*self.state.borrow())
            .field("has_callback", &self.on_installed.is_some())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(installer: PackageInstaller, store: Arc<dyn FingerprintStore>) -> Self {
        let (state, _) = watch::channel(ReconcileState::Idle);
        Self {
            installer,
            store,
            on_installed: None,
            state,
        }
    }

    /// Run `callback` whenever a reconciliation writes new files.
    pub fn on_installed<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_installed = Some(Arc::new(move |cancel| callback(cancel).boxed()));
        self
    }

    pub fn state(&self) -> ReconcileState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReconcileState> {
        self.state.subscribe()
    }

    /// Returns `true` if the target already reflects `options`.
    pub async fn is_current(&self, options: &InstallerOptions) -> Result<bool, FlowError> {
        let fingerprint = Fingerprint::compute(options)?;
        let stored = self.store.load(&options.package_directory).await?;
        Ok(fingerprint.matches(&stored))
    }

    /// Install whatever `options` require, unless the target already
    /// reflects them.
    ///
    /// The fingerprint is saved as soon as the install succeeds, so a failed
    /// or cancelled install is retried in full next time. The completion
    /// callback runs after the save; its failure fails the run but does not
    /// undo the install.
    pub async fn reconcile(
        &self,
        options: &InstallerOptions,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, FlowError> {
        let _guard = StateGuard::enter(&self.state);
        let target = &options.package_directory;

        let fingerprint = Fingerprint::compute(options)?;
        let stored = self.store.load(target).await?;
        if fingerprint.matches(&stored) {
            tracing::info!("Packages in {} are up to date.", target.display());
            return Ok(ReconcileOutcome::Unchanged);
        }

        let report = self.installer.install(options, cancel).await?;
        self.store.save(target, &fingerprint).await?;
        tracing::info!(
            "Installed {} packages into {} ({} already present).",
            report.installed.len(),
            target.display(),
            report.skipped.len()
        );

        if report.new_content {
            if let Some(callback) = &self.on_installed {
                callback(cancel.clone()).await.map_err(FlowError::Callback)?;
            }
        }

        Ok(ReconcileOutcome::Installed(report))
    }
}
