//! Shared types and wire format for feedflow.
//!
//! Everything a feed, the resolver and the installer agree on lives here:
//! package names, versions and range expressions, package identities, and
//! the JSON manifest a feed serves for each published version.

pub mod identity;
pub mod manifest;
pub mod types;
pub mod version;

// Re-exports
pub use identity::{DependencySpec, PackageIdentity, PackageRequirement};
pub use manifest::{DependencyGroup, ManifestDependency, PackageManifest, VersionIndex};
pub use types::PackageName;
pub use version::{Bound, Version, VersionError, VersionRange};
