//! Materializing an install set on disk.

use std::path::Path;
use std::sync::Arc;

use feedflow_schema::PackageIdentity;
use tokio_util::sync::CancellationToken;

use crate::Reporter;
use crate::error::FlowError;
use crate::feed::FeedSet;
use crate::io::download::fetch_to_cache;
use crate::io::extract::{ExtractedFile, extract_zip};
use crate::layout::PackageDirectory;
use crate::paths::STAGING_PREFIX;
use crate::pubgrub_adapter::InstallSet;

/// What an install pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<PackageIdentity>,
    pub skipped: Vec<PackageIdentity>,
    /// At least one file was written.
    pub new_content: bool,
    /// Layout of each requested package, in request order.
    pub directories: Vec<PackageDirectory>,
}

/// Downloads and extracts the packages of an [`InstallSet`].
#[derive(Clone)]
pub struct InstallPipeline {
    feeds: FeedSet,
    cache_dir: std::path::PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for InstallPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallPipeline")
            .field("feeds", &self.feeds)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl InstallPipeline {
    pub fn new(feeds: FeedSet, cache_dir: impl Into<std::path::PathBuf>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            feeds,
            cache_dir: cache_dir.into(),
            reporter,
        }
    }

    /// Install every package in `set` into `target`.
    ///
    /// A package whose directory already exists is skipped. Otherwise its
    /// archive is extracted into a hidden staging directory and renamed into
    /// place, so an interrupted install never leaves a directory that a
    /// later run would mistake for a finished one. Stops at the first error.
    pub async fn install(
        &self,
        set: &InstallSet,
        target: &Path,
        platform: &str,
        cancel: &CancellationToken,
    ) -> Result<InstallReport, FlowError> {
        tokio::fs::create_dir_all(target).await?;
        sweep_staging(target).await?;
        let mut report = InstallReport::default();

        for package in set.packages() {
            if cancel.is_cancelled() {
                return Err(FlowError::Cancelled);
            }
            let identity = &package.identity;
            let layout = PackageDirectory::new(target, identity, platform)?;

            if tokio::fs::try_exists(&layout.path).await? {
                tracing::info!("Skipping install of package {identity}.");
                self.reporter.skipped(identity, "already installed");
                report.skipped.push(identity.clone());
                continue;
            }

            tracing::info!("Installing package {identity}");
            let files = self
                .install_one(package.source, identity, target, &layout, cancel)
                .await
                .inspect_err(|e| self.reporter.failed(identity, &e.to_string()))?;

            for file in &files {
                tracing::debug!("Extracted - {}", file.relative_path.display());
            }
            report.new_content |= !files.is_empty();
            self.reporter.done(identity, files.len());
            report.installed.push(identity.clone());
        }

        Ok(report)
    }

    async fn install_one(
        &self,
        source: crate::feed::FeedId,
        identity: &PackageIdentity,
        target: &Path,
        layout: &PackageDirectory,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExtractedFile>, FlowError> {
        let feed = self.feeds.get(source).ok_or_else(|| {
            FlowError::InvalidInput(format!("{identity} came from a feed that is no longer configured"))
        })?;

        let archive =
            fetch_to_cache(feed.as_ref(), identity, &self.cache_dir, self.reporter.as_ref(), cancel)
                .await?;

        self.reporter.extracting(identity);
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(target)?;
        let staging_path = staging.path().to_path_buf();

        let extracted = tokio::task::spawn_blocking(move || extract_zip(&archive, &staging_path))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .map_err(|source| FlowError::Extract {
                package: identity.to_string(),
                source,
            })?;

        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }

        tokio::fs::rename(staging.path(), &layout.path).await?;
        // The staging path no longer exists; dropping the guard is a no-op.
        drop(staging);

        let files = extracted
            .into_iter()
            .map(|f| ExtractedFile {
                absolute_path: layout.path.join(&f.relative_path),
                relative_path: f.relative_path,
            })
            .collect();
        Ok(files)
    }
}

/// Remove staging directories left behind by a run that died mid-extraction.
///
/// Only the queue consumer writes to `target`, so nothing else can own them.
async fn sweep_staging(target: &Path) -> Result<(), FlowError> {
    let mut entries = tokio::fs::read_dir(target).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            tracing::debug!("Removing stale staging directory {}", entry.path().display());
            tokio::fs::remove_dir_all(entry.path()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::closure::{DependencyClosure, ResolvedPackageInfo};
    use crate::feed::{FeedId, MemoryFeed};
    use crate::pubgrub_adapter::resolve_install_set;
    use crate::test_support::{feed_set, id, publish};
    use feedflow_schema::PackageRequirement;
    use tempfile::tempdir;

    fn single_set(name: &str, version: &str) -> InstallSet {
        let mut closure = DependencyClosure::new();
        closure.insert(ResolvedPackageInfo {
            identity: id(name, version),
            dependencies: vec![],
            source: FeedId(0),
            listed: true,
        });
        resolve_install_set(&[PackageRequirement::new(name)], &closure).unwrap()
    }

    #[tokio::test]
    async fn test_installs_side_by_side() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "lib-a", "1.0.0", vec![]);

        let pipeline = InstallPipeline::new(feed_set(&[&feed]), cache.path(), Arc::new(NullReporter));
        let report = pipeline
            .install(&single_set("lib-a", "1.0.0"), target.path(), "any", &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.new_content);
        assert_eq!(report.installed, vec![id("lib-a", "1.0.0")]);
        assert!(target.path().join("lib-a.1.0.0/lib/any/lib-a.dll").exists());

        let leftovers: Vec<_> = std::fs::read_dir(target.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_existing_directory_is_skipped_without_feed_calls() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "lib-a", "1.0.0", vec![]);
        std::fs::create_dir_all(target.path().join("lib-a.1.0.0")).unwrap();

        let pipeline = InstallPipeline::new(feed_set(&[&feed]), cache.path(), Arc::new(NullReporter));
        let report = pipeline
            .install(&single_set("lib-a", "1.0.0"), target.path(), "any", &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.new_content);
        assert_eq!(report.skipped, vec![id("lib-a", "1.0.0")]);
        assert_eq!(feed.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_staging_directories_are_swept() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "lib-a", "1.0.0", vec![]);
        let stale = target.path().join(format!("{STAGING_PREFIX}crashed"));
        std::fs::create_dir_all(stale.join("lib/any")).unwrap();
        std::fs::write(stale.join("lib/any/half.dll"), b"half").unwrap();

        let pipeline = InstallPipeline::new(feed_set(&[&feed]), cache.path(), Arc::new(NullReporter));
        pipeline
            .install(&single_set("lib-a", "1.0.0"), target.path(), "any", &CancellationToken::new())
            .await
            .unwrap();

        assert!(!stale.exists());
        assert!(target.path().join("lib-a.1.0.0").is_dir());
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_no_package_directory() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        feed.publish(id("lib-a", "1.0.0"), vec![], b"not a zip".to_vec());

        let pipeline = InstallPipeline::new(feed_set(&[&feed]), cache.path(), Arc::new(NullReporter));
        let err = pipeline
            .install(&single_set("lib-a", "1.0.0"), target.path(), "any", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Extract { .. }));
        assert!(!target.path().join("lib-a.1.0.0").exists());
        assert_eq!(std::fs::read_dir(target.path()).unwrap().count(), 0);
    }
}
