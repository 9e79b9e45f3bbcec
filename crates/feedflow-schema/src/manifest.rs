//! Wire format served by feeds.
//!
//! Both the local-directory feed and the HTTP feed use the same layout:
//!
//! ```text
//! <feed>/<lowercase name>/index.json                       # VersionIndex (HTTP only)
//! <feed>/<lowercase name>/<version>/package.json           # PackageManifest
//! <feed>/<lowercase name>/<version>/<name>.<version>.zip   # content
//! ```

use serde::{Deserialize, Serialize};

use crate::identity::DependencySpec;
use crate::version::VersionError;

/// The list of published versions for one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionIndex {
    /// Version strings, in whatever order the feed publishes them.
    pub versions: Vec<String>,
}

/// Metadata for one published package version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Package name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Whether the version is visible in listings.
    #[serde(default = "default_listed")]
    pub listed: bool,
    /// Dependencies, grouped by target platform.
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
}

fn default_listed() -> bool {
    true
}

/// Dependencies that apply to one target platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGroup {
    /// Platform identifier; `None` or `"any"` applies to every platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
}

impl DependencyGroup {
    fn is_fallback(&self) -> bool {
        self.target
            .as_deref()
            .is_none_or(|t| t.is_empty() || t.eq_ignore_ascii_case("any"))
    }
}

/// A dependency as written in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDependency {
    /// Dependency name.
    pub id: String,
    /// Range expression; absent means any version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

impl PackageManifest {
    /// Select and parse the dependency group for `platform`.
    ///
    /// An exact platform match wins; otherwise the first untargeted (or
    /// `any`) group applies; otherwise the package has no dependencies.
    ///
    /// # Errors
    ///
    /// Returns a [`VersionError`] if a dependency range in the chosen group
    /// is malformed.
    pub fn dependencies_for(&self, platform: &str) -> Result<Vec<DependencySpec>, VersionError> {
        let group = self
            .dependency_groups
            .iter()
            .find(|g| {
                g.target
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(platform))
            })
            .or_else(|| self.dependency_groups.iter().find(|g| g.is_fallback()));

        group.map_or_else(
            || Ok(Vec::new()),
            |g| {
                g.dependencies
                    .iter()
                    .map(|d| DependencySpec::parse(&d.id, d.range.as_deref()))
                    .collect()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "Acme.Core",
        "version": "2.0.0",
        "dependency_groups": [
            { "target": "net6.0", "dependencies": [ { "id": "Acme.Logging", "range": "[1.0,2.0)" } ] },
            { "dependencies": [ { "id": "Acme.Compat" } ] }
        ]
    }"#;

    #[test]
    fn test_exact_platform_group_wins() {
        let manifest: PackageManifest = serde_json::from_str(MANIFEST).unwrap();
        assert!(manifest.listed);

        let deps = manifest.dependencies_for("net6.0").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "acme.logging");
    }

    #[test]
    fn test_fallback_group_for_unknown_platform() {
        let manifest: PackageManifest = serde_json::from_str(MANIFEST).unwrap();
        let deps = manifest.dependencies_for("net8.0").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "Acme.Compat");
        assert!(deps[0].range.is_any());
    }

    #[test]
    fn test_no_groups_means_no_dependencies() {
        let manifest: PackageManifest =
            serde_json::from_str(r#"{ "name": "leaf", "version": "1.0.0", "listed": false }"#)
                .unwrap();
        assert!(!manifest.listed);
        assert!(manifest.dependencies_for("any").unwrap().is_empty());
    }
}
