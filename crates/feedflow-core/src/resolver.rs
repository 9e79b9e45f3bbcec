//! Turning a top-level request into a concrete package identity.

use feedflow_schema::{PackageIdentity, PackageRequirement, Version, VersionRange};
use tokio_util::sync::CancellationToken;

use crate::error::{FlowError, cancellable};
use crate::feed::FeedSet;

/// Resolve `requirement` against the feeds in priority order.
///
/// The first feed with a matching version decides; later feeds are not
/// consulted. Returns `Ok(None)` when no feed has a match.
pub async fn resolve_identity(
    requirement: &PackageRequirement,
    feeds: &FeedSet,
    cancel: &CancellationToken,
) -> Result<Option<PackageIdentity>, FlowError> {
    let range = requirement.range()?;
    for (_, feed) in feeds.iter() {
        let versions = cancellable(cancel, feed.list_versions(&requirement.name)).await?;
        if let Some(version) = select_version(requirement, range.as_ref(), &versions) {
            return Ok(Some(PackageIdentity::new(
                requirement.name.clone(),
                version.clone(),
            )));
        }
        tracing::debug!(
            "{} has no version of {} matching the request",
            feed.source(),
            requirement.name
        );
    }
    Ok(None)
}

/// Pick a version from one feed's listing.
///
/// With a range: the highest in-range version that passes the prerelease
/// policy. Without one: the highest version whose prerelease status equals
/// the `prerelease` flag, so `prerelease = true` asks for the newest
/// prerelease specifically.
pub fn select_version<'a>(
    requirement: &PackageRequirement,
    range: Option<&VersionRange>,
    versions: &'a [Version],
) -> Option<&'a Version> {
    match range {
        Some(range) => range.best_match(versions.iter().filter(|v| requirement.allows(v))),
        None => versions
            .iter()
            .filter(|v| v.is_prerelease() == requirement.prerelease)
            .max(),
    }
}
