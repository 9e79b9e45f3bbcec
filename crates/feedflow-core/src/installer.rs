//! One full resolve-and-install pass.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::closure::{ClosureWalker, DependencyClosure};
use crate::error::FlowError;
use crate::feed::FeedSet;
use crate::host::HostExclusions;
use crate::install::{InstallPipeline, InstallReport};
use crate::layout::requested_directories;
use crate::options::InstallerOptions;
use crate::pubgrub_adapter::{InstallSet, resolve_install_set};
use crate::reporter::{NullReporter, Reporter};
use crate::resolver::resolve_identity;

#[derive(Clone)]
enum FeedBinding {
    /// Open `options.sources` on every run.
    Configured {
        client: reqwest::Client,
        base_path: PathBuf,
    },
    /// Always use these feeds, whatever the options say.
    Fixed(FeedSet),
}

/// Resolves the configured requests and installs the result.
#[derive(Clone)]
pub struct PackageInstaller {
    feeds: FeedBinding,
    cache_dir: PathBuf,
    reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl PackageInstaller {
    /// An installer that opens the feeds named in the options, resolving
    /// relative directory sources against `base_path`.
    pub fn new(
        client: reqwest::Client,
        base_path: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            feeds: FeedBinding::Configured {
                client,
                base_path: base_path.into(),
            },
            cache_dir: cache_dir.into(),
            reporter: Arc::new(NullReporter),
        }
    }

    /// An installer bound to a fixed feed set.
    pub fn with_feeds(feeds: FeedSet, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            feeds: FeedBinding::Fixed(feeds),
            cache_dir: cache_dir.into(),
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    fn feeds_for(&self, options: &InstallerOptions) -> Result<FeedSet, FlowError> {
        match &self.feeds {
            FeedBinding::Configured { client, base_path } => {
                Ok(FeedSet::open(&options.sources, base_path, client)?)
            }
            FeedBinding::Fixed(feeds) => Ok(feeds.clone()),
        }
    }

    /// Resolve without installing. `None` means there is nothing to do.
    pub async fn plan(
        &self,
        options: &InstallerOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<InstallSet>, FlowError> {
        let feeds = self.feeds_for(options)?;
        self.plan_with(&feeds, options, cancel).await
    }

    async fn plan_with(
        &self,
        feeds: &FeedSet,
        options: &InstallerOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<InstallSet>, FlowError> {
        if feeds.is_empty() {
            tracing::warn!("No sources configured, packages will not be installed.");
            return Ok(None);
        }
        if options.packages.is_empty() {
            tracing::info!("No packages configured.");
            return Ok(None);
        }

        let host = HostExclusions::from_options(&options.host)?;
        let walker = ClosureWalker::new(feeds, &host, &options.platform, cancel);
        let mut closure = DependencyClosure::new();

        self.reporter.section("Resolving");
        for requirement in &options.packages {
            let identity = resolve_identity(requirement, feeds, cancel)
                .await?
                .ok_or_else(|| FlowError::NotFound(requirement.name.to_string()))?;
            self.reporter.resolved(&identity);
            walker.walk(identity, &mut closure).await?;
        }
        tracing::debug!("Dependency closure has {} packages", closure.len());

        let set = resolve_install_set(&options.packages, &closure)?;
        Ok(Some(set))
    }

    /// Resolve and install into `options.package_directory`.
    pub async fn install(
        &self,
        options: &InstallerOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport, FlowError> {
        let feeds = self.feeds_for(options)?;
        let Some(set) = self.plan_with(&feeds, options, cancel).await? else {
            return Ok(InstallReport::default());
        };

        self.reporter.section("Installing");
        let mut report = InstallPipeline::new(feeds, self.cache_dir.clone(), Arc::clone(&self.reporter))
            .install(&set, &options.package_directory, &options.platform, cancel)
            .await?;
        report.directories = requested_directories(&set, options)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MemoryFeed;
    use crate::options::{FeedOptions, HostLibrary};
    use crate::test_support::{dep, feed_set, id, publish};
    use feedflow_schema::{DependencySpec, PackageRequirement, VersionRange};
    use tempfile::tempdir;

    fn options(target: &std::path::Path, packages: Vec<PackageRequirement>) -> InstallerOptions {
        InstallerOptions {
            package_directory: target.to_path_buf(),
            packages,
            ..InstallerOptions::default()
        }
    }

    #[tokio::test]
    async fn test_installs_minimum_dependency() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "app", "1.0.0", vec![dep("lib-c", ">=1.2.0")]);
        publish(&feed, "lib-c", "1.2.0", vec![]);
        publish(&feed, "lib-c", "1.9.0", vec![]);

        let installer = PackageInstaller::with_feeds(feed_set(&[&feed]), cache.path());
        let opts = options(target.path(), vec![PackageRequirement::new("app")]);
        let report = installer.install(&opts, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.installed, vec![id("app", "1.0.0"), id("lib-c", "1.2.0")]);
        assert!(target.path().join("lib-c.1.2.0").is_dir());
        assert!(!target.path().join("lib-c.1.9.0").exists());

        assert_eq!(report.directories.len(), 1);
        let app = &report.directories[0];
        assert_eq!(app.name, "app.1.0.0");
        assert_eq!(app.lib_path, target.path().join("app.1.0.0/lib/any"));
        assert!(app.lib_path.join("app.dll").exists());
        assert_eq!(
            app.content_path,
            target.path().join("app.1.0.0/contentFiles/any/any")
        );
    }

    #[tokio::test]
    async fn test_dependency_name_cannot_escape_target() {
        let root = tempdir().unwrap();
        let target = root.path().join("plugins");
        let cache = root.path().join("cache");
        let feed = Arc::new(MemoryFeed::new("feed"));
        let escaping = DependencySpec::new("../escaped", VersionRange::parse(">=1.0.0").unwrap());
        publish(&feed, "app", "1.0.0", vec![escaping]);
        publish(&feed, "../escaped", "1.0.0", vec![]);

        let installer = PackageInstaller::with_feeds(feed_set(&[&feed]), &cache);
        let opts = options(&target, vec![PackageRequirement::new("app")]);
        let err = installer.install(&opts, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, FlowError::Feed(_)));
        assert!(!root.path().join("escaped.1.0.0").exists());
        assert!(!root.path().join("escaped").exists());
        assert!(!target.join("app.1.0.0").exists());
    }

    #[tokio::test]
    async fn test_two_requests_share_lowest_common_dependency() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "lib-a", "1.0.0", vec![dep("lib-c", ">=1.0.0")]);
        publish(&feed, "lib-b", "1.0.0", vec![dep("lib-c", ">=1.2.0 <1.5.0")]);
        publish(&feed, "lib-c", "1.0.0", vec![]);
        publish(&feed, "lib-c", "1.2.0", vec![]);
        publish(&feed, "lib-c", "1.4.0", vec![]);
        publish(&feed, "lib-c", "1.9.0", vec![]);

        let installer = PackageInstaller::with_feeds(feed_set(&[&feed]), cache.path());
        let opts = options(
            target.path(),
            vec![PackageRequirement::new("lib-a"), PackageRequirement::new("lib-b")],
        );
        let set = installer
            .plan(&opts, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        let lib_c = set.get(&"lib-c".into()).unwrap();
        assert_eq!(lib_c.identity, id("lib-c", "1.2.0"));
        assert_eq!(set.len(), 3);
    }

    #[tokio::test]
    async fn test_host_library_is_not_installed() {
        let target = tempdir().unwrap();
        let cache = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "app", "1.0.0", vec![dep("lib-log", ">=2.0.0")]);
        publish(&feed, "lib-log", "2.0.0", vec![]);

        let installer = PackageInstaller::with_feeds(feed_set(&[&feed]), cache.path());
        let mut opts = options(target.path(), vec![PackageRequirement::new("app")]);
        opts.host.libraries.push(HostLibrary {
            name: "Lib-Log".into(),
            version: "2.1.0".into(),
        });
        let report = installer.install(&opts, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.installed, vec![id("app", "1.0.0")]);
        assert!(!target.path().join("lib-log.2.0.0").exists());
    }

    #[tokio::test]
    async fn test_unknown_package_is_not_found() {
        let target = tempdir().unwrap();
        let feed = Arc::new(MemoryFeed::new("feed"));
        publish(&feed, "lib-a", "1.0.0", vec![]);

        let installer = PackageInstaller::with_feeds(feed_set(&[&feed]), target.path());
        let opts = options(target.path(), vec![PackageRequirement::new("lib-z")]);
        let err = installer.install(&opts, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::NotFound(name) if name == "lib-z"));
    }

    #[tokio::test]
    async fn test_no_sources_is_a_no_op() {
        let target = tempdir().unwrap();
        let installer = PackageInstaller::new(reqwest::Client::new(), target.path(), target.path());
        let opts = options(target.path(), vec![PackageRequirement::new("lib-a")]);
        let report = installer.install(&opts, &CancellationToken::new()).await.unwrap();
        assert_eq!(report, InstallReport::default());
    }

    #[tokio::test]
    async fn test_configured_directory_feed() {
        let root = tempdir().unwrap();
        let feed_dir = root.path().join("feed").join("lib-a").join("1.0.0");
        std::fs::create_dir_all(&feed_dir).unwrap();
        std::fs::write(
            feed_dir.join("package.json"),
            r#"{"name":"lib-a","version":"1.0.0"}"#,
        )
        .unwrap();
        std::fs::write(
            feed_dir.join("lib-a.1.0.0.zip"),
            crate::io::extract::tests::zip_bytes(&[("lib/any/a.dll", "a")]),
        )
        .unwrap();

        let installer = PackageInstaller::new(
            reqwest::Client::new(),
            root.path(),
            root.path().join("cache"),
        );
        let mut opts = options(&root.path().join("out"), vec![PackageRequirement::new("lib-a")]);
        opts.sources.push(FeedOptions::new("./feed"));

        let report = installer.install(&opts, &CancellationToken::new()).await.unwrap();
        assert!(report.new_content);
        assert!(root.path().join("out/lib-a.1.0.0/lib/any/a.dll").exists());
    }
}
