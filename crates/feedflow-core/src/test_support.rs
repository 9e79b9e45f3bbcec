//! Fixtures shared by unit tests.

use std::sync::Arc;

use feedflow_schema::{DependencySpec, PackageIdentity, Version};

use crate::feed::{FeedClient, FeedSet, MemoryFeed};
use crate::io::extract::tests::zip_bytes;

pub(crate) fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

pub(crate) fn id(name: &str, version: &str) -> PackageIdentity {
    PackageIdentity::new(name, v(version))
}

pub(crate) fn dep(name: &str, range: &str) -> DependencySpec {
    DependencySpec::parse(name, Some(range)).unwrap()
}

/// Publish `name@version` with one content file named after the package.
pub(crate) fn publish(feed: &MemoryFeed, name: &str, version: &str, deps: Vec<DependencySpec>) {
    let path = format!("lib/any/{name}.dll");
    let body = format!("{name} {version}");
    let content = zip_bytes(&[(path.as_str(), body.as_str())]);
    feed.publish(id(name, version), deps, content);
}

pub(crate) fn feed_set(feeds: &[&Arc<MemoryFeed>]) -> FeedSet {
    FeedSet::new(
        feeds
            .iter()
            .map(|f| Arc::clone(*f) as Arc<dyn FeedClient>)
            .collect(),
    )
}
