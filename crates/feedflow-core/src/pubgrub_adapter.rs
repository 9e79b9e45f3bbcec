//! PubGrub adapter for install-set selection.
//!
//! Implements the `DependencyProvider` trait over a [`DependencyClosure`],
//! so the solver only ever chooses among identities the walker visited.
//! Dependencies take the lowest version that satisfies every constraint;
//! top-level requests take the highest.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;

use feedflow_schema::{
    PackageIdentity, PackageName, PackageRequirement, Version, VersionRange,
};
use pubgrub::error::PubGrubError;
use pubgrub::range::Range;
use pubgrub::report::{DefaultStringReporter, Reporter as _};
use pubgrub::solver::{Dependencies, DependencyConstraints, DependencyProvider};

use crate::closure::{DependencyClosure, ResolvedPackageInfo};
use crate::error::FlowError;

/// A solver package: the synthetic root, or a real package name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PkgId {
    Root,
    Package(PackageName),
}

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "<requested packages>"),
            Self::Package(name) => write!(f, "{name}"),
        }
    }
}

/// [`Version`] with the ordering helpers the solver needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolverVersion(pub Version);

impl fmt::Display for SolverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl pubgrub::version::Version for SolverVersion {
    fn lowest() -> Self {
        Self(Version::lowest())
    }

    fn bump(&self) -> Self {
        Self(self.0.successor())
    }
}

fn solver_range(range: &VersionRange) -> Range<SolverVersion> {
    let lower = match range.lower() {
        None => Range::any(),
        Some(b) if b.inclusive => Range::higher_than(SolverVersion(b.version.clone())),
        Some(b) => Range::higher_than(SolverVersion(b.version.successor())),
    };
    let upper = match range.upper() {
        None => Range::any(),
        Some(b) if b.inclusive => Range::strictly_lower_than(SolverVersion(b.version.successor())),
        Some(b) => Range::strictly_lower_than(SolverVersion(b.version.clone())),
    };
    lower.intersection(&upper)
}

/// Adapter that exposes a [`DependencyClosure`] to the `PubGrub` solver.
#[derive(Debug)]
pub struct ClosureDependencyProvider<'a> {
    closure: &'a DependencyClosure,
    candidates: BTreeMap<PackageName, Vec<Version>>,
    roots: BTreeMap<PackageName, Range<SolverVersion>>,
    top_level: BTreeSet<PackageName>,
}

impl<'a> ClosureDependencyProvider<'a> {
    pub fn new(
        requirements: &[PackageRequirement],
        closure: &'a DependencyClosure,
    ) -> Result<Self, FlowError> {
        let mut roots: BTreeMap<PackageName, Range<SolverVersion>> = BTreeMap::new();
        for req in requirements {
            let range = req
                .range()?
                .map_or_else(Range::any, |r| solver_range(&r));
            let merged = match roots.remove(&req.name) {
                Some(existing) => existing.intersection(&range),
                None => range,
            };
            roots.insert(req.name.clone(), merged);
        }

        let mut candidates = BTreeMap::new();
        for info in closure.iter() {
            let name = &info.identity.name;
            if !candidates.contains_key(name) {
                candidates.insert(name.clone(), closure.versions_of(name));
            }
        }

        Ok(Self {
            closure,
            candidates,
            top_level: roots.keys().cloned().collect(),
            roots,
        })
    }

    fn in_range<'v>(
        &'v self,
        name: &PackageName,
        range: &'v Range<SolverVersion>,
    ) -> impl Iterator<Item = &'v Version> + 'v {
        self.candidates
            .get(name)
            .into_iter()
            .flatten()
            .filter(move |v| range.contains(&SolverVersion((*v).clone())))
    }

    /// Fewest remaining candidates first, ties broken by name.
    fn priority(&self, pkg: &PkgId, range: &Range<SolverVersion>) -> (usize, String) {
        match pkg {
            PkgId::Root => (0, String::new()),
            PkgId::Package(name) => (self.in_range(name, range).count(), name.key().to_string()),
        }
    }
}

impl DependencyProvider<PkgId, SolverVersion> for ClosureDependencyProvider<'_> {
    fn choose_package_version<T: Borrow<PkgId>, U: Borrow<Range<SolverVersion>>>(
        &self,
        potential_packages: impl Iterator<Item = (T, U)>,
    ) -> Result<(T, Option<SolverVersion>), Box<dyn Error>> {
        let mut potential: Vec<(T, U)> = potential_packages.collect();
        let pick = potential
            .iter()
            .enumerate()
            .min_by_key(|(_, (pkg, range))| self.priority(pkg.borrow(), range.borrow()))
            .map(|(i, _)| i)
            .ok_or("solver offered no packages")?;
        let (pkg, range) = potential.swap_remove(pick);

        let version = match pkg.borrow() {
            PkgId::Root => Some(SolverVersion(Version::new(0, 0, 0))),
            PkgId::Package(name) => {
                let mut matching = self.in_range(name, range.borrow());
                let chosen = if self.top_level.contains(name) {
                    matching.max()
                } else {
                    matching.next()
                };
                chosen.cloned().map(SolverVersion)
            }
        };

        Ok((pkg, version))
    }

    fn get_dependencies(
        &self,
        pkg: &PkgId,
        version: &SolverVersion,
    ) -> Result<Dependencies<PkgId, SolverVersion>, Box<dyn Error>> {
        let mut deps: DependencyConstraints<PkgId, SolverVersion> =
            DependencyConstraints::default();

        match pkg {
            PkgId::Root => {
                for (name, range) in &self.roots {
                    deps.insert(PkgId::Package(name.clone()), range.clone());
                }
            }
            PkgId::Package(name) => {
                let identity = PackageIdentity::new(name.clone(), version.0.clone());
                let Some(info) = self.closure.get(&identity) else {
                    return Ok(Dependencies::Unknown);
                };
                for dep in &info.dependencies {
                    let range = solver_range(&dep.range);
                    let key = PkgId::Package(dep.name.clone());
                    let merged = match deps.remove(&key) {
                        Some(existing) => existing.intersection(&range),
                        None => range,
                    };
                    deps.insert(key, merged);
                }
            }
        }

        Ok(Dependencies::Known(deps))
    }
}

/// The chosen identities, at most one per package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSet {
    packages: BTreeMap<PackageName, ResolvedPackageInfo>,
}

impl InstallSet {
    pub fn get(&self, name: &PackageName) -> Option<&ResolvedPackageInfo> {
        self.packages.get(name)
    }

    /// Chosen packages, ordered by name.
    pub fn packages(&self) -> impl Iterator<Item = &ResolvedPackageInfo> {
        self.packages.values()
    }

    pub fn identities(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.packages.values().map(|p| &p.identity)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Choose one version per package from `closure` satisfying every edge.
///
/// # Errors
///
/// Returns [`FlowError::Conflict`] with the solver's derivation report when
/// no consistent assignment exists.
pub fn resolve_install_set(
    requirements: &[PackageRequirement],
    closure: &DependencyClosure,
) -> Result<InstallSet, FlowError> {
    let provider = ClosureDependencyProvider::new(requirements, closure)?;

    let solution = match pubgrub::solver::resolve(
        &provider,
        PkgId::Root,
        SolverVersion(Version::new(0, 0, 0)),
    ) {
        Ok(solution) => solution,
        Err(PubGrubError::NoSolution(mut tree)) => {
            tree.collapse_no_versions();
            return Err(FlowError::Conflict(DefaultStringReporter::report(&tree)));
        }
        Err(e) => return Err(FlowError::Conflict(e.to_string())),
    };

    let mut packages = BTreeMap::new();
    for (pkg, version) in solution {
        let PkgId::Package(name) = pkg else {
            continue;
        };
        let identity = PackageIdentity::new(name.clone(), version.0);
        let info = closure.get(&identity).cloned().ok_or_else(|| {
            FlowError::Conflict(format!("{identity} was selected but never visited"))
        })?;
        packages.insert(name, info);
    }

    Ok(InstallSet { packages })
}
