//! Package identities, requirements and dependency specs.

use crate::types::PackageName;
use crate::version::{Version, VersionError, VersionRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A package requested by the caller: a name, an optional range expression
/// and whether prerelease versions may be chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequirement {
    /// Package name.
    pub name: PackageName,
    /// Optional range expression; `None` selects the latest version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether prerelease versions are acceptable.
    #[serde(default)]
    pub prerelease: bool,
}

impl PackageRequirement {
    /// Create a requirement with no range and prereleases disallowed.
    pub fn new(name: impl Into<PackageName>) -> Self {
        Self {
            name: name.into(),
            version: None,
            prerelease: false,
        }
    }

    /// Set the range expression.
    pub fn with_version(mut self, range: impl Into<String>) -> Self {
        self.version = Some(range.into());
        self
    }

    /// Allow or forbid prerelease versions.
    pub fn with_prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = prerelease;
        self
    }

    /// Parse the range expression, if one was given.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRange`] if the expression is malformed.
    pub fn range(&self) -> Result<Option<VersionRange>, VersionError> {
        self.version.as_deref().map(VersionRange::parse).transpose()
    }

    /// Returns `true` if `version` passes this requirement's prerelease policy.
    pub fn allows(&self, version: &Version) -> bool {
        self.prerelease || !version.is_prerelease()
    }
}

/// A concrete `(name, version)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// Package name.
    pub name: PackageName,
    /// Exact version.
    pub version: Version,
}

impl PackageIdentity {
    /// Create an identity.
    pub fn new(name: impl Into<PackageName>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// The side-by-side directory name: `{name}.{normalized version}`.
    pub fn directory_name(&self) -> String {
        format!("{}.{}", self.name, self.version.normalized())
    }

    /// The archive file name used by feeds and the download cache.
    pub fn archive_name(&self) -> String {
        format!("{}.{}.zip", self.name.key(), self.version.normalized())
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// A dependency edge declared by a package: a name plus the range it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Dependency name.
    pub name: PackageName,
    /// Versions the declaring package accepts.
    pub range: VersionRange,
}

impl DependencySpec {
    /// Create a dependency edge.
    pub fn new(name: impl Into<PackageName>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    /// Build an edge from a name and an optional range expression.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidName`] if the name is not a safe path
    /// component, or [`VersionError::InvalidRange`] if the expression is
    /// malformed.
    pub fn parse(name: &str, range: Option<&str>) -> Result<Self, VersionError> {
        if !PackageName::new(name).is_path_safe() {
            return Err(VersionError::InvalidName(name.to_string()));
        }
        let range = range.map_or_else(|| Ok(VersionRange::any()), VersionRange::parse)?;
        Ok(Self::new(name, range))
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.range)
    }
}
