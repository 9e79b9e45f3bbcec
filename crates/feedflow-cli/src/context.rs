//! Shared command context.
//!
//! Groups the loaded configuration and the pieces every command builds from
//! it, so each command does not re-derive paths and clients.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use feedflow_core::fingerprint::FileFingerprintStore;
use feedflow_core::reconcile::Reconciler;
use feedflow_core::{InstallerOptions, PackageInstaller, TracingReporter};
use tokio_util::sync::CancellationToken;

use crate::Cli;

#[derive(Clone)]
pub struct Context {
    pub config_path: PathBuf,
    /// Directory relative paths in the configuration resolve against.
    pub base_path: PathBuf,
    pub options: InstallerOptions,
    pub cache_dir: PathBuf,
    pub on_installed: Option<String>,
    pub client: reqwest::Client,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config_path", &self.config_path)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub async fn load(cli: &Cli) -> Result<Self> {
        let config_path = std::path::absolute(&cli.config)
            .with_context(|| format!("invalid config path {}", cli.config.display()))?;
        let base_path = config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let options = load_options(&config_path, &base_path).await?;

        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => feedflow_core::cache_path()
                .context("Could not determine home directory. Set FEEDFLOW_HOME or --cache-dir.")?,
        };

        let client = reqwest::Client::builder()
            .user_agent(feedflow_core::USER_AGENT)
            .build()?;

        Ok(Self {
            config_path,
            base_path,
            options,
            cache_dir,
            on_installed: cli.on_installed.clone(),
            client,
        })
    }

    pub fn installer(&self) -> PackageInstaller {
        PackageInstaller::new(self.client.clone(), &self.base_path, &self.cache_dir)
            .with_reporter(Arc::new(TracingReporter))
    }

    pub fn reconciler(&self) -> Reconciler {
        let reconciler = Reconciler::new(self.installer(), Arc::new(FileFingerprintStore));
        match self.on_installed.clone() {
            Some(command) => reconciler.on_installed(move |cancel| run_hook(command.clone(), cancel)),
            None => reconciler,
        }
    }

    /// Re-read the configuration file.
    pub async fn reload(&self) -> Result<InstallerOptions> {
        load_options(&self.config_path, &self.base_path).await
    }
}

async fn load_options(config_path: &Path, base_path: &Path) -> Result<InstallerOptions> {
    let options = InstallerOptions::load(config_path).await?;
    Ok(options.with_env_overrides().resolve_paths(base_path))
}

/// Run `command` through the platform shell, killing it on cancellation.
async fn run_hook(command: String, cancel: CancellationToken) -> Result<()> {
    tracing::info!("Running post-install command: {command}");

    #[cfg(unix)]
    let mut child = tokio::process::Command::new("sh").arg("-c").arg(&command).spawn()?;
    #[cfg(windows)]
    let mut child = tokio::process::Command::new("cmd").arg("/C").arg(&command).spawn()?;

    let status = tokio::select! {
        () = cancel.cancelled() => {
            child.kill().await?;
            anyhow::bail!("post-install command cancelled");
        }
        status = child.wait() => status?,
    };

    if !status.success() {
        anyhow::bail!("post-install command exited with {status}");
    }
    Ok(())
}
