//! Dependency closure discovery.
//!
//! Starting from a resolved identity, the walker follows every dependency
//! edge to its minimum acceptable version and records each identity it
//! visits exactly once. The closure is the candidate pool the solver picks
//! from.

use std::collections::{BTreeSet, HashMap};

use feedflow_schema::{DependencySpec, PackageIdentity, PackageName, Version, VersionError};
use tokio_util::sync::CancellationToken;

use crate::error::{FlowError, cancellable};
use crate::feed::{FeedError, FeedId, FeedSet, PackageMetadata};
use crate::host::HostExclusions;

/// A visited package version and what it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackageInfo {
    pub identity: PackageIdentity,
    /// Dependency edges, host-supplied ones already removed.
    pub dependencies: Vec<DependencySpec>,
    /// The feed whose metadata was used.
    pub source: FeedId,
    pub listed: bool,
}

/// Every identity reachable from the top-level requests.
#[derive(Debug, Clone, Default)]
pub struct DependencyClosure {
    packages: Vec<ResolvedPackageInfo>,
    index: HashMap<PackageIdentity, usize>,
    unavailable: BTreeSet<PackageIdentity>,
    missing: Vec<DependencySpec>,
}

impl DependencyClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a visited package. Returns `false` if it was already present.
    pub fn insert(&mut self, info: ResolvedPackageInfo) -> bool {
        if self.index.contains_key(&info.identity) {
            return false;
        }
        self.index.insert(info.identity.clone(), self.packages.len());
        self.packages.push(info);
        true
    }

    /// Record an identity no feed has metadata for.
    pub fn mark_unavailable(&mut self, identity: PackageIdentity) {
        self.unavailable.insert(identity);
    }

    /// Record an edge for which no feed lists any version in range.
    pub fn mark_missing(&mut self, dependency: DependencySpec) {
        if !self.missing.contains(&dependency) {
            self.missing.push(dependency);
        }
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.index.contains_key(identity)
    }

    /// Visited in either sense: present, or known to be unavailable.
    pub fn is_visited(&self, identity: &PackageIdentity) -> bool {
        self.contains(identity) || self.unavailable.contains(identity)
    }

    pub fn get(&self, identity: &PackageIdentity) -> Option<&ResolvedPackageInfo> {
        self.index.get(identity).map(|&i| &self.packages[i])
    }

    /// Packages in visit order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPackageInfo> {
        self.packages.iter()
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.unavailable.iter()
    }

    /// Edges that could not be pointed at any version, in discovery order.
    pub fn missing(&self) -> impl Iterator<Item = &DependencySpec> {
        self.missing.iter()
    }

    /// All visited versions of `name`, ascending.
    pub fn versions_of(&self, name: &PackageName) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .packages
            .iter()
            .filter(|p| &p.identity.name == name)
            .map(|p| p.identity.version.clone())
            .collect();
        versions.sort();
        versions
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Walks dependency edges through the feeds.
#[derive(Debug)]
pub struct ClosureWalker<'a> {
    feeds: &'a FeedSet,
    host: &'a HostExclusions,
    platform: &'a str,
    cancel: &'a CancellationToken,
}

impl<'a> ClosureWalker<'a> {
    pub fn new(
        feeds: &'a FeedSet,
        host: &'a HostExclusions,
        platform: &'a str,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            feeds,
            host,
            platform,
            cancel,
        }
    }

    /// Add `root` and everything reachable from it to `closure`.
    ///
    /// Identities already in `closure` are not revisited, which is what
    /// terminates dependency cycles.
    pub async fn walk(
        &self,
        root: PackageIdentity,
        closure: &mut DependencyClosure,
    ) -> Result<(), FlowError> {
        let mut stack = vec![root];

        while let Some(identity) = stack.pop() {
            if closure.is_visited(&identity) {
                continue;
            }

            let Some((source, metadata)) = self.fetch_metadata(&identity).await? else {
                tracing::warn!("No feed has metadata for {identity}");
                closure.mark_unavailable(identity);
                continue;
            };

            if let Some(bad) = metadata.dependencies.iter().find(|d| !d.name.is_path_safe()) {
                return Err(FeedError::Metadata {
                    package: identity.to_string(),
                    source: VersionError::InvalidName(bad.name.to_string()),
                }
                .into());
            }

            let dependencies: Vec<DependencySpec> = metadata
                .dependencies
                .into_iter()
                .filter(|dep| {
                    let supplied = self.host.supplies(dep);
                    if supplied {
                        tracing::debug!("{dep} is supplied by the host, skipping");
                    }
                    !supplied
                })
                .collect();

            let mut next = Vec::with_capacity(dependencies.len());
            for dep in &dependencies {
                match self.minimum_identity(dep).await? {
                    Some(found) => next.push(found),
                    None => {
                        tracing::warn!("No feed has a version of {dep} (needed by {identity})");
                        closure.mark_missing(dep.clone());
                    }
                }
            }

            closure.insert(ResolvedPackageInfo {
                identity,
                dependencies,
                source,
                listed: metadata.listed,
            });

            // Depth-first, in declaration order.
            stack.extend(next.into_iter().rev());
        }

        Ok(())
    }

    async fn fetch_metadata(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Option<(FeedId, PackageMetadata)>, FlowError> {
        for (id, feed) in self.feeds.iter() {
            let found = cancellable(self.cancel, feed.metadata(identity, self.platform)).await?;
            if let Some(metadata) = found {
                return Ok(Some((id, metadata)));
            }
        }
        Ok(None)
    }

    /// The identity a dependency edge points at.
    ///
    /// An inclusive lower bound names it directly. Otherwise the lowest
    /// listed in-range version from the first feed that has one is used.
    async fn minimum_identity(
        &self,
        dep: &DependencySpec,
    ) -> Result<Option<PackageIdentity>, FlowError> {
        if let Some(bound) = dep.range.lower().filter(|b| b.inclusive) {
            return Ok(Some(PackageIdentity::new(
                dep.name.clone(),
                bound.version.clone(),
            )));
        }

        for (_, feed) in self.feeds.iter() {
            let versions = cancellable(self.cancel, feed.list_versions(&dep.name)).await?;
            if let Some(version) = dep.range.lowest_match(&versions) {
                return Ok(Some(PackageIdentity::new(dep.name.clone(), version.clone())));
            }
        }
        Ok(None)
    }
}
