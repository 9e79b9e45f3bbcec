//! In-process feed, for embedding and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use feedflow_schema::{DependencySpec, PackageIdentity, PackageName, Version};

use super::{FeedClient, FeedError, PackageMetadata, PackageStream};

#[derive(Debug, Clone)]
struct Entry {
    metadata: Option<PackageMetadata>,
    content: Bytes,
}

/// A feed held entirely in memory.
///
/// Every trait call is counted, which lets callers assert that a run did no
/// feed work at all. Dependency metadata is the same for every platform.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    name: String,
    packages: RwLock<BTreeMap<PackageIdentity, Entry>>,
    calls: AtomicUsize,
}

impl MemoryFeed {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Publish a package version with its dependencies and archive bytes.
    pub fn publish(
        &self,
        identity: PackageIdentity,
        dependencies: Vec<DependencySpec>,
        content: impl Into<Bytes>,
    ) {
        self.insert(
            identity,
            Entry {
                metadata: Some(PackageMetadata::new(dependencies)),
                content: content.into(),
            },
        );
    }

    /// Publish a version that shows up in listings but has no metadata.
    pub fn publish_listing(&self, identity: PackageIdentity) {
        self.insert(
            identity,
            Entry {
                metadata: None,
                content: Bytes::new(),
            },
        );
    }

    /// Number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn insert(&self, identity: PackageIdentity, entry: Entry) {
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity, entry);
    }

    fn lookup(&self, identity: &PackageIdentity) -> Option<Entry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }
}

#[async_trait]
impl FeedClient for MemoryFeed {
    fn source(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, name: &PackageName) -> Result<Vec<Version>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        Ok(packages
            .keys()
            .filter(|id| &id.name == name)
            .map(|id| id.version.clone())
            .collect())
    }

    async fn metadata(
        &self,
        identity: &PackageIdentity,
        _platform: &str,
    ) -> Result<Option<PackageMetadata>, FeedError> {
        Ok(self.lookup(identity).and_then(|e| e.metadata))
    }

    async fn download(&self, identity: &PackageIdentity) -> Result<PackageStream, FeedError> {
        let entry = self
            .lookup(identity)
            .filter(|e| e.metadata.is_some())
            .ok_or_else(|| FeedError::MissingContent(identity.to_string()))?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(entry.content)
        })))
    }
}
