//! Host-supplied package exclusion.

use std::collections::{BTreeMap, BTreeSet};

use feedflow_schema::{DependencySpec, PackageName, Version};

use crate::error::FlowError;
use crate::options::HostOptions;

/// Decides which dependency edges the host application already satisfies.
///
/// An edge is supplied when its name is provided outright, or when the host
/// ships a library of that name whose version is a prerelease or falls in
/// the edge's range. Supplied edges are never fetched or installed.
#[derive(Debug, Clone, Default)]
pub struct HostExclusions {
    provided: BTreeSet<PackageName>,
    libraries: BTreeMap<PackageName, Version>,
}

impl HostExclusions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &HostOptions) -> Result<Self, FlowError> {
        let mut host = Self::new();
        for name in &options.provided {
            host = host.with_provided(name.as_str());
        }
        for lib in &options.libraries {
            host = host.with_library(lib.name.as_str(), Version::parse(&lib.version)?);
        }
        Ok(host)
    }

    pub fn with_provided(mut self, name: impl Into<PackageName>) -> Self {
        self.provided.insert(name.into());
        self
    }

    pub fn with_library(mut self, name: impl Into<PackageName>, version: Version) -> Self {
        self.libraries.insert(name.into(), version);
        self
    }

    pub fn supplies(&self, dependency: &DependencySpec) -> bool {
        if self.provided.contains(&dependency.name) {
            return true;
        }
        self.libraries
            .get(&dependency.name)
            .is_some_and(|v| v.is_prerelease() || dependency.range.contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::HostLibrary;

    fn dep(name: &str, range: &str) -> DependencySpec {
        DependencySpec::parse(name, Some(range)).unwrap()
    }

    #[test]
    fn test_provided_names_ignore_case_and_range() {
        let host = HostExclusions::new().with_provided("Acme.Runtime");
        assert!(host.supplies(&dep("acme.runtime", ">=99.0.0")));
        assert!(!host.supplies(&dep("other", "*")));
    }

    #[test]
    fn test_library_version_must_satisfy_range() {
        let host = HostExclusions::new().with_library("lib-log", Version::new(2, 1, 0));
        assert!(host.supplies(&dep("lib-log", ">=2.0.0, <3.0.0")));
        assert!(!host.supplies(&dep("lib-log", ">=3.0.0")));
    }

    #[test]
    fn test_prerelease_library_always_supplies() {
        let host = HostExclusions::new().with_library("lib-log", Version::parse("0.9.0-dev").unwrap());
        assert!(host.supplies(&dep("lib-log", ">=5.0.0")));
    }

    #[test]
    fn test_from_options_rejects_bad_version() {
        let options = HostOptions {
            provided: vec![],
            libraries: vec![HostLibrary {
                name: "x".into(),
                version: "not-a-version".into(),
            }],
        };
        assert!(matches!(
            HostExclusions::from_options(&options),
            Err(FlowError::InvalidInput(_))
        ));
    }
}
