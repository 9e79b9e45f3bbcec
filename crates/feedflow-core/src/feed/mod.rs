//! Package feeds.
//!
//! A feed answers three questions about a package: which versions exist,
//! what a given version depends on, and what its content bytes are. Feeds
//! are consulted in configuration order and the first one with an answer
//! wins.

pub mod http;
pub mod local;
pub mod memory;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use feedflow_schema::{DependencySpec, PackageIdentity, PackageName, Version, VersionError};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::options::FeedOptions;

pub use http::HttpFeed;
pub use local::LocalFeed;
pub use memory::MemoryFeed;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest at {location}: {source}")]
    Manifest {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid dependency metadata for {package}: {source}")]
    Metadata {
        package: String,
        #[source]
        source: VersionError,
    },

    #[error("Feed has no content for {0}")]
    MissingContent(String),

    #[error("Invalid feed source '{0}'")]
    InvalidSource(String),
}

/// Streamed package content.
pub type PackageStream = BoxStream<'static, Result<Bytes, FeedError>>;

/// Dependency metadata for one package version, already narrowed to the
/// caller's platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub dependencies: Vec<DependencySpec>,
    pub listed: bool,
}

impl PackageMetadata {
    pub fn new(dependencies: Vec<DependencySpec>) -> Self {
        Self {
            dependencies,
            listed: true,
        }
    }
}

#[async_trait]
pub trait FeedClient: Send + Sync + fmt::Debug {
    /// Human-readable location of the feed, used in logs.
    fn source(&self) -> &str;

    /// All published versions of `name`. Unknown packages yield an empty list.
    async fn list_versions(&self, name: &PackageName) -> Result<Vec<Version>, FeedError>;

    /// Dependency metadata for `identity` on `platform`, or `None` if this
    /// feed does not have that version.
    async fn metadata(
        &self,
        identity: &PackageIdentity,
        platform: &str,
    ) -> Result<Option<PackageMetadata>, FeedError>;

    /// Stream the package archive for `identity`.
    async fn download(&self, identity: &PackageIdentity) -> Result<PackageStream, FeedError>;
}

/// Position of a feed in the configured order. Lower is consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedId(pub usize);

/// The ordered list of feeds for one run.
#[derive(Debug, Clone, Default)]
pub struct FeedSet {
    feeds: Vec<Arc<dyn FeedClient>>,
}

impl FeedSet {
    pub fn new(feeds: Vec<Arc<dyn FeedClient>>) -> Self {
        Self { feeds }
    }

    /// Open every configured source.
    ///
    /// `http://` and `https://` sources become [`HttpFeed`]s; anything else
    /// is treated as a directory, with relative paths joined to `base_path`.
    pub fn open(
        sources: &[FeedOptions],
        base_path: &Path,
        client: &reqwest::Client,
    ) -> Result<Self, FeedError> {
        let mut feeds: Vec<Arc<dyn FeedClient>> = Vec::with_capacity(sources.len());
        for options in sources {
            let source = options.source.trim();
            if source.is_empty() {
                return Err(FeedError::InvalidSource(options.source.clone()));
            }

            if source.starts_with("http://") || source.starts_with("https://") {
                let mut feed = HttpFeed::new(client.clone(), source);
                if let Some(username) = &options.username {
                    feed = feed.with_credentials(username, options.password.as_deref());
                }
                feeds.push(Arc::new(feed));
            } else {
                let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
                let root = if path.is_relative() {
                    base_path.join(path)
                } else {
                    path.to_path_buf()
                };
                feeds.push(Arc::new(LocalFeed::new(root)));
            }
        }
        Ok(Self { feeds })
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn get(&self, id: FeedId) -> Option<&Arc<dyn FeedClient>> {
        self.feeds.get(id.0)
    }

    /// Feeds in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (FeedId, &Arc<dyn FeedClient>)> {
        self.feeds.iter().enumerate().map(|(i, f)| (FeedId(i), f))
    }
}

/// Parse a feed listing, dropping entries that are not versions.
pub(crate) fn parse_versions<'a>(
    source: &str,
    raw: impl IntoIterator<Item = &'a str>,
) -> Vec<Version> {
    raw.into_iter()
        .filter_map(|s| match Version::parse(s) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!("{source}: ignoring listing entry: {e}");
                None
            }
        })
        .collect()
}
